pub mod error;
pub mod executor;
pub mod fields;
pub mod graph;
pub mod network;
pub mod plaintext;
pub mod protocols;
pub mod spdz;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::{ConfigError, MpcError, WireError};
pub use executor::{EvaluationStats, Outputs, ProtocolEvaluator};
pub use fields::{MpcField, Mersenne127, Mersenne61, Ring128};
pub use graph::{NodeId, Operation, ProtocolGraph};
pub use protocols::{EvaluationStatus, NativeProtocol, Value};

/// Participant of a multi-party computation.
pub trait MpcContext {
    /// Number of parties participating in MPC computation.
    fn num_parties(&self) -> usize;

    /// ID of current party, between 1 and `num_parties()`.
    fn party_id(&self) -> usize;
}
