use thiserror::Error;

use crate::transport::TransportError;

/// Failure of an MPC invocation. Every variant is fatal to the invocation.
#[derive(Debug, Error)]
pub enum MpcError {
    /// A peer deviated from the protocol (digest mismatch, failed MAC check, bad opening).
    #[error("malicious activity detected: {0}")]
    MaliciousActivity(String),
    /// The data supplier could not hand out the requested preprocessed material.
    #[error("preprocessing exhausted: {0}")]
    PreprocessingExhausted(String),
    #[error("malformed wire data: {0}")]
    Wire(#[from] WireError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The protocol graph references missing nodes or carries operands of the wrong kind.
    #[error("invalid protocol graph: {0}")]
    InvalidGraph(String),
    /// Local violation of the round contract, e.g. a message that nobody consumed.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Byte-level decoding failure of a value received from the network or a file.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("encoding is not a canonical element of the modulus")]
    NonCanonical,
}

/// Rejected construction parameters.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least two parties are required, got {0}")]
    TooFewParties(usize),
    #[error("party id {party_id} is outside 1..={num_parties}")]
    PartyIdOutOfRange { party_id: usize, num_parties: usize },
    /// Preprocessed data that does not fit the party set it claims to belong to.
    #[error("inconsistent preprocessing data: {0}")]
    InconsistentPreprocessing(String),
    #[error(
        "unsupported bit lengths {operational}/{effective}, \
         expected {supported_operational}/{supported_effective}"
    )]
    UnsupportedBitLength {
        operational: u32,
        effective: u32,
        supported_operational: u32,
        supported_effective: u32,
    },
}
