use crate::error::MpcError;
use crate::fields::MpcField;
use crate::network::Network;
use crate::spdz::{AuthShare, ResourcePool};
use crate::MpcContext;

use super::{EvaluationStatus, NativeProtocol};

/// Local operation on authenticated shares.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinearOp<T> {
    Add(AuthShare<T>, AuthShare<T>),
    Sub(AuthShare<T>, AuthShare<T>),
    Neg(AuthShare<T>),
    AddPublic(AuthShare<T>, T),
    SubPublic(AuthShare<T>, T),
    MulPublic(AuthShare<T>, T),
    Identity(AuthShare<T>),
}

/// Gate that needs no communication and finishes in its first round.
pub struct LinearProtocol<T> {
    op: LinearOp<T>,
    output: Option<AuthShare<T>>,
}

impl<T: MpcField> LinearProtocol<T> {
    pub fn new(op: LinearOp<T>) -> Self {
        Self { op, output: None }
    }
}

impl<T: MpcField> NativeProtocol<T> for LinearProtocol<T> {
    type Output = AuthShare<T>;

    fn evaluate(
        &mut self,
        _round: usize,
        pool: &mut ResourcePool<T>,
        _network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        self.output = Some(match self.op {
            LinearOp::Add(x, y) => x + y,
            LinearOp::Sub(x, y) => x - y,
            LinearOp::Neg(x) => -x,
            LinearOp::AddPublic(x, c) => x.add_public(c, pool.mac_key_share(), pool.party_id()),
            LinearOp::SubPublic(x, c) => x.sub_public(c, pool.mac_key_share(), pool.party_id()),
            LinearOp::MulPublic(x, c) => x * c,
            LinearOp::Identity(x) => x,
        });
        Ok(EvaluationStatus::IsDone)
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.output.take()
    }
}

#[cfg(test)]
mod tests {
    use crate::fields::Mersenne61;
    use crate::testing::{open_outputs, run_parties};

    use super::*;

    type Fp = Mersenne61;

    #[tokio::test]
    async fn test_public_constant_is_added_once() {
        let shares = run_parties::<Fp, _, _, _>(3, |mut evaluator| async move {
            let key = evaluator.pool().mac_key_share();
            let x = AuthShare::from_public(Fp::from_u64(10), key, evaluator.party_id());
            let op = LinearOp::AddPublic(x, Fp::from_u64(5));
            let share = evaluator.run_native(LinearProtocol::new(op)).await?;
            Ok::<_, MpcError>((share, key))
        })
        .await;
        assert_eq!(open_outputs(shares), Fp::from_u64(15));
    }

    #[tokio::test]
    async fn test_public_constant_is_subtracted_once() {
        let shares = run_parties::<Fp, _, _, _>(3, |mut evaluator| async move {
            let key = evaluator.pool().mac_key_share();
            let x = AuthShare::from_public(Fp::from_u64(10), key, evaluator.party_id());
            let op = LinearOp::SubPublic(x, Fp::from_u64(4));
            let share = evaluator.run_native(LinearProtocol::new(op)).await?;
            Ok::<_, MpcError>((share, key))
        })
        .await;
        assert_eq!(open_outputs(shares), Fp::from_u64(6));
    }

    #[tokio::test]
    async fn test_linear_combination() {
        let shares = run_parties::<Fp, _, _, _>(2, |mut evaluator| async move {
            let key = evaluator.pool().mac_key_share();
            let party_id = evaluator.party_id();
            let x = AuthShare::from_public(Fp::from_u64(9), key, party_id);
            let y = AuthShare::from_public(Fp::from_u64(4), key, party_id);
            let diff = evaluator
                .run_native(LinearProtocol::new(LinearOp::Sub(x, y)))
                .await?;
            let scaled = evaluator
                .run_native(LinearProtocol::new(LinearOp::MulPublic(diff, Fp::from_u64(3))))
                .await?;
            let share = evaluator
                .run_native(LinearProtocol::new(LinearOp::Neg(scaled)))
                .await?;
            Ok::<_, MpcError>((share, key))
        })
        .await;
        assert_eq!(open_outputs(shares), -Fp::from_u64(15));
    }
}
