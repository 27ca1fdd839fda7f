mod fake_dealer;
pub use fake_dealer::FakeDataSupplier;

mod opened_values;
pub use opened_values::{mac_check_contribution, OpenedValueStore};

mod precomp_dealer;
pub use precomp_dealer::{PrecomputedData, PrecomputedDataSupplier};

mod resource_pool;
pub use resource_pool::{BroadcastHelper, ResourcePool, ResourcePoolConfig, DIGEST_LEN};

mod share;
pub use share::AuthShare;

use serde::{Deserialize, Serialize};

use crate::error::MpcError;

/// Random authenticated sharing whose plaintext is known to the party it was dealt for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMask<T> {
    /// Plaintext of the mask, present only at the party the mask belongs to.
    pub real_value: Option<T>,
    pub mask: AuthShare<T>,
}

/// Authenticated sharing of a random triple (a, b, c) with c = ab.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaverTriple<T> {
    pub a: AuthShare<T>,
    pub b: AuthShare<T>,
    pub c: AuthShare<T>,
}

/// Source of preprocessed material. Every value handed out is consumed exactly once.
pub trait DataSupplier<T>: Send {
    /// Next mask reserved for inputs of party `owner`.
    fn next_input_mask(&mut self, owner: usize) -> Result<InputMask<T>, MpcError>;

    /// Next `count` Beaver triples.
    fn next_triple_shares(&mut self, count: usize) -> Result<Vec<BeaverTriple<T>>, MpcError>;

    /// This party's additive share of the global MAC key.
    fn mac_key_share(&self) -> T;
}
