use rand::{Rng, RngCore};
use tracing::warn;
use zeroize::Zeroize;

use crate::error::MpcError;
use crate::fields::MpcField;
use crate::network::Network;
use crate::spdz::{ResourcePool, DIGEST_LEN};

use super::{BroadcastProtocol, EvaluationStatus, NativeProtocol};

/// Number of random bytes appended to a value before hashing it into a commitment.
const COMMITMENT_RANDOMNESS_LEN: usize = 32;

enum Phase {
    Start,
    Commitments(BroadcastProtocol),
    Openings(BroadcastProtocol),
    Done,
}

/// Commit-then-open broadcast of one value per party.
///
/// Every party first broadcasts `H(value || r)` with validation, then broadcasts the
/// opening `value || r` with validation. Each opening is checked against the commitment
/// received earlier from the same party. The output holds the values of all parties in
/// party order.
pub struct CommitProtocol {
    value: Vec<u8>,
    opening: Vec<u8>,
    phase: Phase,
    phase_start: usize,
    commitments: Vec<Vec<u8>>,
    output: Option<Vec<Vec<u8>>>,
}

impl CommitProtocol {
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            opening: Vec::new(),
            phase: Phase::Start,
            phase_start: 0,
            commitments: Vec::new(),
            output: None,
        }
    }

    fn commit<T: MpcField>(&mut self, pool: &mut ResourcePool<T>) -> Vec<u8> {
        let mut randomness = [0u8; COMMITMENT_RANDOMNESS_LEN];
        pool.local_rng().fill_bytes(&mut randomness);
        self.opening = [self.value.as_slice(), &randomness].concat();
        randomness.zeroize();
        pool.broadcast().commit(&self.opening)
    }

    fn verify_openings<T: MpcField>(
        &self,
        pool: &ResourcePool<T>,
        openings: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, MpcError> {
        openings
            .into_iter()
            .zip(&self.commitments)
            .enumerate()
            .map(|(index, (mut opening, commitment))| {
                let party = index + 1;
                if opening.len() < COMMITMENT_RANDOMNESS_LEN
                    || pool.broadcast().commit(&opening) != *commitment
                {
                    warn!(party, "Opening does not match commitment");
                    return Err(MpcError::MaliciousActivity(format!(
                        "opening of party {party} does not match its commitment"
                    )));
                }
                opening.truncate(opening.len() - COMMITMENT_RANDOMNESS_LEN);
                Ok(opening)
            })
            .collect()
    }
}

impl<T: MpcField> NativeProtocol<T> for CommitProtocol {
    type Output = Vec<Vec<u8>>;

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        if let Phase::Start = self.phase {
            let commitment = self.commit(pool);
            self.phase = Phase::Commitments(BroadcastProtocol::new(commitment));
            self.phase_start = round;
        }

        let local_round = round - self.phase_start;
        match &mut self.phase {
            Phase::Commitments(broadcast) => {
                if broadcast.evaluate(local_round, pool, network)? == EvaluationStatus::IsDone {
                    let commitments = NativeProtocol::<T>::out(broadcast).unwrap_or_default();
                    if let Some(index) = commitments.iter().position(|c| c.len() != DIGEST_LEN) {
                        return Err(MpcError::MaliciousActivity(format!(
                            "commitment of party {} has the wrong length",
                            index + 1
                        )));
                    }
                    self.commitments = commitments;

                    // The openings start right away, within the same round.
                    let mut openings = BroadcastProtocol::new(std::mem::take(&mut self.opening));
                    NativeProtocol::<T>::evaluate(&mut openings, 0, pool, network)?;
                    self.phase = Phase::Openings(openings);
                    self.phase_start = round;
                }
                Ok(EvaluationStatus::HasMoreRounds)
            }
            Phase::Openings(broadcast) => {
                let status = broadcast.evaluate(local_round, pool, network)?;
                if status == EvaluationStatus::HasMoreRounds {
                    return Ok(status);
                }
                let openings = NativeProtocol::<T>::out(broadcast).unwrap_or_default();
                self.output = Some(self.verify_openings(pool, openings)?);
                self.phase = Phase::Done;
                Ok(EvaluationStatus::IsDone)
            }
            Phase::Start | Phase::Done => Err(MpcError::Protocol(
                "commitment protocol evaluated after completion".into(),
            )),
        }
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.output.take()
    }
}

/// Agree on a random 32-byte seed that no coalition short of all parties controls.
/// Every party commits to a seed of its own; the output is the XOR of all of them.
pub struct JointRandomnessProtocol {
    commit: Option<CommitProtocol>,
    output: Option<[u8; 32]>,
}

impl JointRandomnessProtocol {
    pub fn new() -> Self {
        Self {
            commit: None,
            output: None,
        }
    }
}

impl Default for JointRandomnessProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MpcField> NativeProtocol<T> for JointRandomnessProtocol {
    type Output = [u8; 32];

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        let commit = self.commit.get_or_insert_with(|| {
            let seed: [u8; 32] = pool.local_rng().gen();
            CommitProtocol::new(seed.to_vec())
        });
        if commit.evaluate(round, pool, network)? == EvaluationStatus::HasMoreRounds {
            return Ok(EvaluationStatus::HasMoreRounds);
        }

        let seeds = NativeProtocol::<T>::out(commit).unwrap_or_default();
        let mut joint = [0u8; 32];
        for (index, seed) in seeds.iter().enumerate() {
            if seed.len() != joint.len() {
                return Err(MpcError::MaliciousActivity(format!(
                    "seed of party {} has length {}",
                    index + 1,
                    seed.len()
                )));
            }
            for (byte, other) in joint.iter_mut().zip(seed) {
                *byte ^= other;
            }
        }
        self.output = Some(joint);
        Ok(EvaluationStatus::IsDone)
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.output.take()
    }
}
