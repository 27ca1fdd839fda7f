use tracing::{debug, warn};

use crate::error::MpcError;
use crate::fields::MpcField;
use crate::network::Network;
use crate::spdz::{mac_check_contribution, AuthShare, ResourcePool};

use super::{CommitProtocol, EvaluationStatus, JointRandomnessProtocol, NativeProtocol};

enum Phase<T> {
    Start,
    Seeding {
        shares: Vec<AuthShare<T>>,
        values: Vec<T>,
        seed: JointRandomnessProtocol,
    },
    Checking(CommitProtocol),
    Done,
}

/// Batched verification of every value opened since the previous check.
///
/// The store is drained first, then the parties toss a fresh joint seed, so the
/// coefficients combining the entries are fixed only after the checked values are.
/// Each party commits to its term of the check and the batch is accepted only if the
/// opened terms sum to zero.
pub struct MacCheckProtocol<T> {
    phase: Phase<T>,
    phase_start: usize,
    output: Option<()>,
}

impl<T: MpcField> MacCheckProtocol<T> {
    pub fn new() -> Self {
        Self {
            phase: Phase::Start,
            phase_start: 0,
            output: None,
        }
    }

    /// This party's term of the check, with coefficients drawn from the fresh joint generator.
    fn contribution(
        pool: &mut ResourcePool<T>,
        shares: &[AuthShare<T>],
        values: &[T],
        seed: [u8; 32],
    ) -> Result<CommitProtocol, MpcError> {
        pool.install_joint_seed(seed);
        let rng = pool.joint_rng()?;
        let coefficients: Vec<T> = (0..shares.len()).map(|_| T::random(&mut *rng)).collect();
        let sigma = mac_check_contribution(pool.mac_key_share(), shares, values, &coefficients);
        debug!(entries = shares.len(), "MAC check started");
        Ok(CommitProtocol::new(sigma.to_be_bytes()))
    }

    fn verify(&mut self, terms: Vec<Vec<u8>>) -> Result<EvaluationStatus, MpcError> {
        let mut sum = T::zero();
        for bytes in terms {
            sum = sum + T::from_be_bytes(&bytes)?;
        }
        if sum != T::zero() {
            warn!("MAC check failed");
            return Err(MpcError::MaliciousActivity("MAC check failed".into()));
        }
        self.phase = Phase::Done;
        self.output = Some(());
        Ok(EvaluationStatus::IsDone)
    }
}

impl<T: MpcField> Default for MacCheckProtocol<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MpcField> NativeProtocol<T> for MacCheckProtocol<T> {
    type Output = ();

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        if let Phase::Start = self.phase {
            let (shares, values) = pool.opened_values_mut().pop_values();
            if shares.is_empty() {
                self.phase = Phase::Done;
                self.output = Some(());
                return Ok(EvaluationStatus::IsDone);
            }
            self.phase = Phase::Seeding {
                shares,
                values,
                seed: JointRandomnessProtocol::new(),
            };
            self.phase_start = round;
        }

        let local_round = round - self.phase_start;
        match &mut self.phase {
            Phase::Seeding {
                shares,
                values,
                seed,
            } => {
                if NativeProtocol::<T>::evaluate(seed, local_round, pool, network)?
                    == EvaluationStatus::HasMoreRounds
                {
                    return Ok(EvaluationStatus::HasMoreRounds);
                }
                let joint_seed = NativeProtocol::<T>::out(seed).ok_or_else(|| {
                    MpcError::Protocol("coin toss finished without a seed".into())
                })?;

                // The commitment to this party's term goes out within the same round.
                let mut commit = Self::contribution(pool, shares, values, joint_seed)?;
                if NativeProtocol::<T>::evaluate(&mut commit, 0, pool, network)?
                    == EvaluationStatus::IsDone
                {
                    let terms = NativeProtocol::<T>::out(&mut commit).unwrap_or_default();
                    return self.verify(terms);
                }
                self.phase = Phase::Checking(commit);
                self.phase_start = round;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            Phase::Checking(commit) => {
                if NativeProtocol::<T>::evaluate(commit, local_round, pool, network)?
                    == EvaluationStatus::HasMoreRounds
                {
                    return Ok(EvaluationStatus::HasMoreRounds);
                }
                let terms = NativeProtocol::<T>::out(commit).unwrap_or_default();
                self.verify(terms)
            }
            Phase::Start | Phase::Done => Err(MpcError::Protocol(
                "MAC check evaluated after completion".into(),
            )),
        }
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.output.take()
    }
}
