use itertools::Itertools;

use crate::error::MpcError;
use crate::fields::{decode_elements, encode_elements, MpcField};
use crate::network::Network;
use crate::spdz::{AuthShare, BeaverTriple, ResourcePool};
use crate::MpcContext;

use super::{EvaluationStatus, NativeProtocol};

/// Beaver-triple multiplication of a batch of share pairs.
///
/// Round 0 consumes one triple per pair and sends the shares of `epsilon = x - a` and
/// `delta = y - b` for the whole batch as a single payload. Round 1 opens them, records
/// the openings for the next MAC check and derives
/// `xy = c + b * epsilon + a * delta + epsilon * delta`.
pub struct BatchMultiplyProtocol<T> {
    pairs: Vec<(AuthShare<T>, AuthShare<T>)>,
    triples: Vec<BeaverTriple<T>>,
    output: Option<Vec<AuthShare<T>>>,
}

impl<T: MpcField> BatchMultiplyProtocol<T> {
    pub fn new(pairs: Vec<(AuthShare<T>, AuthShare<T>)>) -> Self {
        Self {
            pairs,
            triples: Vec::new(),
            output: None,
        }
    }

    /// Masked operands in pair order: epsilon and delta of the first pair, then the second.
    fn masked_operands(&self) -> Vec<AuthShare<T>> {
        self.pairs
            .iter()
            .zip(&self.triples)
            .flat_map(|(&(x, y), triple)| [x - triple.a, y - triple.b])
            .collect()
    }
}

impl<T: MpcField> NativeProtocol<T> for BatchMultiplyProtocol<T> {
    type Output = Vec<AuthShare<T>>;

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        if self.pairs.is_empty() {
            self.output = Some(Vec::new());
            return Ok(EvaluationStatus::IsDone);
        }
        match round {
            0 => {
                self.triples = pool.data_supplier().next_triple_shares(self.pairs.len())?;
                let shares: Vec<_> = self
                    .masked_operands()
                    .iter()
                    .map(AuthShare::share)
                    .collect();
                network.send_to_all(encode_elements(&shares))?;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            _ => {
                let count = 2 * self.pairs.len();
                let mut opened = vec![T::zero(); count];
                for payload in network.receive_from_all()? {
                    let elements = decode_elements::<T>(&payload, count)?;
                    for (sum, element) in opened.iter_mut().zip(elements) {
                        *sum = *sum + element;
                    }
                }
                pool.opened_values_mut()
                    .push_opened_values(self.masked_operands(), opened.iter().copied())?;

                let key = pool.mac_key_share();
                let party_id = pool.party_id();
                let products = self
                    .triples
                    .iter()
                    .zip(opened.into_iter().tuples())
                    .map(|(triple, (epsilon, delta))| {
                        (triple.c + triple.b * epsilon + triple.a * delta)
                            .add_public(epsilon * delta, key, party_id)
                    })
                    .collect();
                self.output = Some(products);
                Ok(EvaluationStatus::IsDone)
            }
        }
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.output.take()
    }
}

/// Multiplication of a single pair of shares.
pub struct MultiplyProtocol<T> {
    batch: BatchMultiplyProtocol<T>,
}

impl<T: MpcField> MultiplyProtocol<T> {
    pub fn new(x: AuthShare<T>, y: AuthShare<T>) -> Self {
        Self {
            batch: BatchMultiplyProtocol::new(vec![(x, y)]),
        }
    }
}

impl<T: MpcField> NativeProtocol<T> for MultiplyProtocol<T> {
    type Output = AuthShare<T>;

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        self.batch.evaluate(round, pool, network)
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.batch.out().and_then(|products| products.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use crate::fields::{Mersenne127, Mersenne61, Ring128};
    use crate::protocols::InputProtocol;
    use crate::testing::{open_outputs, run_parties};

    use super::*;

    async fn multiply<T: MpcField>(num_parties: usize, x: T, y: T) -> T {
        let shares = run_parties::<T, _, _, _>(num_parties, move |mut evaluator| async move {
            let party_id = evaluator.party_id();
            let x = evaluator
                .run_native(InputProtocol::new(1, (party_id == 1).then(|| x)))
                .await?;
            let y = evaluator
                .run_native(InputProtocol::new(2, (party_id == 2).then(|| y)))
                .await?;
            let product = evaluator.run_native(MultiplyProtocol::new(x, y)).await?;
            assert_eq!(evaluator.pool().opened_values().len(), 2);
            Ok::<_, MpcError>((product, evaluator.pool().mac_key_share()))
        })
        .await;
        open_outputs(shares)
    }

    #[tokio::test]
    async fn test_multiply_prime_fields() {
        assert_eq!(
            multiply(2, Mersenne127::from_u64(1234567), Mersenne127::from_u64(1110)).await,
            Mersenne127::from_u64(1234567 * 1110)
        );
        assert_eq!(
            multiply(3, Mersenne61::from_u64(1 << 40), Mersenne61::from_u64(1 << 30)).await,
            Mersenne61::from_u64(1 << 40) * Mersenne61::from_u64(1 << 30)
        );
    }

    #[tokio::test]
    async fn test_multiply_ring() {
        let x = Ring128::new(u128::MAX);
        let y = Ring128::new(3);
        assert_eq!(multiply(2, x, y).await, Ring128::new(u128::MAX - 2));
    }

    #[tokio::test]
    async fn test_batch_multiply() {
        let shares = run_parties::<Mersenne127, _, _, _>(3, |mut evaluator| async move {
            let key = evaluator.pool().mac_key_share();
            let party_id = evaluator.party_id();
            let pairs = (1..=4)
                .map(|i| {
                    let x = AuthShare::from_public(Mersenne127::from_u64(i), key, party_id);
                    let y = AuthShare::from_public(Mersenne127::from_u64(i + 10), key, party_id);
                    (x, y)
                })
                .collect();
            let products = evaluator
                .run_native(BatchMultiplyProtocol::new(pairs))
                .await?;
            assert_eq!(evaluator.pool().opened_values().len(), 8);
            Ok::<_, MpcError>((products, key))
        })
        .await;

        let per_party: Vec<_> = shares
            .into_iter()
            .map(|result| result.unwrap())
            .collect();
        for i in 0..4 {
            let column = per_party
                .iter()
                .map(|(products, key)| Ok((products[i], *key)))
                .collect();
            let expected = (i as u64 + 1) * (i as u64 + 11);
            assert_eq!(open_outputs(column), Mersenne127::from_u64(expected));
        }
    }

    #[tokio::test]
    async fn test_empty_batch_finishes_without_communication() {
        let results = run_parties::<Mersenne61, _, _, _>(2, |mut evaluator| async move {
            evaluator
                .run_native(BatchMultiplyProtocol::new(Vec::new()))
                .await
        })
        .await;
        for result in results {
            assert_eq!(result.unwrap(), Vec::new());
        }
    }
}
