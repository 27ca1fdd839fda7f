use tracing::warn;

use crate::error::MpcError;
use crate::fields::MpcField;
use crate::network::Network;
use crate::spdz::ResourcePool;
use crate::MpcContext;

use super::{EvaluationStatus, NativeProtocol};

/// Whether received broadcasts must be cross-checked by an extra digest round.
/// With two parties nobody can be shown inconsistent values.
pub(crate) fn needs_validation(num_parties: usize) -> bool {
    num_parties >= 3
}

/// Send the digest of `messages` to every party and return it for later comparison.
pub(crate) fn send_broadcast_validation<'a, T: MpcField>(
    pool: &ResourcePool<T>,
    network: &mut impl Network,
    messages: impl IntoIterator<Item = &'a [u8]>,
) -> Result<Vec<u8>, MpcError> {
    let digest = pool.broadcast().digest(messages);
    network.send_to_all(digest.clone())?;
    Ok(digest)
}

/// Receive every party's digest and require all of them to equal `digest`.
pub(crate) fn receive_broadcast_validation(
    network: &mut impl Network,
    digest: &[u8],
) -> Result<(), MpcError> {
    let digests = network.receive_from_all()?;
    match digests.iter().position(|other| other.as_slice() != digest) {
        Some(index) => {
            warn!(party = index + 1, "Broadcast digest mismatch");
            Err(MpcError::MaliciousActivity(format!(
                "broadcast digest of party {} does not match",
                index + 1
            )))
        }
        None => Ok(()),
    }
}

/// Echo broadcast: every party sends a message to all, and with three or more parties
/// all parties confirm they saw the same set of messages.
pub struct BroadcastProtocol {
    message: Option<Vec<u8>>,
    received: Option<Vec<Vec<u8>>>,
    digest: Vec<u8>,
}

impl BroadcastProtocol {
    pub fn new(message: Vec<u8>) -> Self {
        Self {
            message: Some(message),
            received: None,
            digest: Vec::new(),
        }
    }
}

impl<T: MpcField> NativeProtocol<T> for BroadcastProtocol {
    type Output = Vec<Vec<u8>>;

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        match round {
            0 => {
                let message = self.message.take().unwrap_or_default();
                network.send_to_all(message)?;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            1 => {
                let received = network.receive_from_all()?;
                if !needs_validation(pool.num_parties()) {
                    self.received = Some(received);
                    return Ok(EvaluationStatus::IsDone);
                }
                self.digest =
                    send_broadcast_validation(pool, network, received.iter().map(Vec::as_slice))?;
                self.received = Some(received);
                Ok(EvaluationStatus::HasMoreRounds)
            }
            _ => {
                receive_broadcast_validation(network, &self.digest)?;
                Ok(EvaluationStatus::IsDone)
            }
        }
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.received.take()
    }
}
