use crate::error::MpcError;
use crate::fields::MpcField;
use crate::network::Network;
use crate::spdz::{AuthShare, ResourcePool};

use super::{EvaluationStatus, NativeProtocol};

/// Reveal a shared value to every party.
///
/// The opening itself is unverified. The share and the claimed value are recorded in
/// the opened-value store and only become trustworthy after the next MAC check.
pub struct OpenProtocol<T> {
    share: AuthShare<T>,
    output: Option<T>,
}

impl<T: MpcField> OpenProtocol<T> {
    pub fn new(share: AuthShare<T>) -> Self {
        Self {
            share,
            output: None,
        }
    }
}

impl<T: MpcField> NativeProtocol<T> for OpenProtocol<T> {
    type Output = T;

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        if round == 0 {
            network.send_to_all(self.share.share().to_be_bytes())?;
            return Ok(EvaluationStatus::HasMoreRounds);
        }
        let mut value = T::zero();
        for bytes in network.receive_from_all()? {
            value = value + T::from_be_bytes(&bytes)?;
        }
        pool.opened_values_mut()
            .push_opened_values([self.share], [value])?;
        self.output = Some(value.into_effective());
        Ok(EvaluationStatus::IsDone)
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.output.take()
    }
}

#[cfg(test)]
mod tests {
    use crate::fields::{Mersenne127, Ring128};
    use crate::MpcContext;
    use crate::testing::run_parties;

    use super::*;

    #[tokio::test]
    async fn test_open_public_sharing() {
        let results = run_parties::<Mersenne127, _, _, _>(3, |mut evaluator| async move {
            let key = evaluator.pool().mac_key_share();
            let x = AuthShare::from_public(Mersenne127::from_u64(99), key, evaluator.party_id());
            let value = evaluator.run_native(OpenProtocol::new(x)).await?;
            assert!(evaluator.pool().opened_values().has_pending());
            Ok::<_, MpcError>(value)
        })
        .await;
        for result in results {
            assert_eq!(result.unwrap(), Mersenne127::from_u64(99));
        }
    }

    #[tokio::test]
    async fn test_ring_opening_is_reduced_to_effective_width() {
        let results = run_parties::<Ring128, _, _, _>(2, |mut evaluator| async move {
            let key = evaluator.pool().mac_key_share();
            let x = AuthShare::from_public(Ring128::new((7 << 64) | 5), key, evaluator.party_id());
            evaluator.run_native(OpenProtocol::new(x)).await
        })
        .await;
        for result in results {
            assert_eq!(result.unwrap(), Ring128::new(5));
        }
    }
}
