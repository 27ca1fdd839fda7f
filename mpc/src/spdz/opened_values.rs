use std::mem;

use crate::error::MpcError;
use crate::fields::MpcField;

use super::AuthShare;

/// Shares opened without verification, together with the plaintext they were opened to.
/// Entries stay here until a MAC check drains the whole store.
pub struct OpenedValueStore<T> {
    shares: Vec<AuthShare<T>>,
    values: Vec<T>,
}

impl<T: MpcField> OpenedValueStore<T> {
    pub fn new() -> Self {
        Self {
            shares: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Record opened shares and their claimed plaintexts.
    pub fn push_opened_values(
        &mut self,
        shares: impl IntoIterator<Item = AuthShare<T>>,
        values: impl IntoIterator<Item = T>,
    ) -> Result<(), MpcError> {
        let before = self.shares.len();
        self.shares.extend(shares);
        self.values.extend(values);
        if self.shares.len() != self.values.len() {
            let pushed_shares = self.shares.len() - before;
            let pushed_values = self.values.len() - before;
            self.shares.truncate(before);
            self.values.truncate(before);
            return Err(MpcError::Protocol(format!(
                "{pushed_shares} opened shares but {pushed_values} opened values"
            )));
        }
        Ok(())
    }

    /// Take all pending entries, leaving the store empty.
    pub fn pop_values(&mut self) -> (Vec<AuthShare<T>>, Vec<T>) {
        (mem::take(&mut self.shares), mem::take(&mut self.values))
    }

    pub fn has_pending(&self) -> bool {
        !self.shares.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

impl<T: MpcField> Default for OpenedValueStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// This party's term of the batched MAC check.
/// The batch is valid iff the terms of all parties sum to zero.
pub fn mac_check_contribution<T: MpcField>(
    mac_key_share: T,
    shares: &[AuthShare<T>],
    values: &[T],
    coefficients: &[T],
) -> T {
    let (combined_value, combined_mac) = shares.iter().zip(values).zip(coefficients).fold(
        (T::zero(), T::zero()),
        |(value_acc, mac_acc), ((share, &value), &r)| {
            (value_acc + r * value, mac_acc + r * share.mac)
        },
    );
    combined_mac - mac_key_share * combined_value
}
