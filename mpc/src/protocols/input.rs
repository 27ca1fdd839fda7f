use crate::error::MpcError;
use crate::fields::MpcField;
use crate::network::Network;
use crate::spdz::{AuthShare, InputMask, ResourcePool};
use crate::MpcContext;

use super::broadcast::{needs_validation, receive_broadcast_validation, send_broadcast_validation};
use super::{EvaluationStatus, NativeProtocol};

/// Secret-share a value held by party `owner`.
///
/// The owner broadcasts its value masked by a preprocessed input mask. With three or
/// more parties the masked value is validated by an extra digest round, so the owner
/// cannot hand different parties different masked values.
pub struct InputProtocol<T: MpcField> {
    owner: usize,
    value: Option<T>,
    mask: Option<InputMask<T>>,
    masked: Option<T>,
    digest: Vec<u8>,
    output: Option<AuthShare<T>>,
}

impl<T: MpcField> InputProtocol<T> {
    /// `value` is only read at the owner; other parties may pass `None`.
    pub fn new(owner: usize, value: Option<T>) -> Self {
        Self {
            owner,
            value,
            mask: None,
            masked: None,
            digest: Vec::new(),
            output: None,
        }
    }

    fn send_masked_value(
        &mut self,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<(), MpcError> {
        let mask = pool.data_supplier().next_input_mask(self.owner)?;
        if pool.party_id() == self.owner {
            let value = self.value.take().ok_or_else(|| {
                MpcError::InvalidGraph(format!("party {} has no value to input", self.owner))
            })?;
            let mask_value = mask.real_value.ok_or_else(|| {
                MpcError::Protocol("input mask of own input carries no plaintext".into())
            })?;
            network.send_to_all((value - mask_value).to_be_bytes())?;
        }
        self.mask = Some(mask);
        Ok(())
    }

    fn finish(&mut self, pool: &ResourcePool<T>) -> Result<(), MpcError> {
        let mask = self
            .mask
            .take()
            .ok_or_else(|| MpcError::Protocol("input mask was not drawn".into()))?;
        let masked = self
            .masked
            .take()
            .ok_or_else(|| MpcError::Protocol("masked input was not received".into()))?;
        self.output = Some(
            mask.mask
                .add_public(masked, pool.mac_key_share(), pool.party_id()),
        );
        Ok(())
    }
}

impl<T: MpcField> NativeProtocol<T> for InputProtocol<T> {
    type Output = AuthShare<T>;

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        match round {
            0 => {
                self.send_masked_value(pool, network)?;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            1 => {
                let bytes = network.receive(self.owner)?;
                self.masked = Some(T::from_be_bytes(&bytes)?);
                if !needs_validation(pool.num_parties()) {
                    self.finish(pool)?;
                    return Ok(EvaluationStatus::IsDone);
                }
                self.digest = send_broadcast_validation(pool, network, [bytes.as_slice()])?;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            _ => {
                receive_broadcast_validation(network, &self.digest)?;
                self.finish(pool)?;
                Ok(EvaluationStatus::IsDone)
            }
        }
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.output.take()
    }
}
