mod broadcast;
pub use broadcast::BroadcastProtocol;

mod commit;
pub use commit::{CommitProtocol, JointRandomnessProtocol};

mod input;
pub use input::InputProtocol;

mod linear;
pub use linear::{LinearOp, LinearProtocol};

mod mac_check;
pub use mac_check::MacCheckProtocol;

mod multiply;
pub use multiply::{BatchMultiplyProtocol, MultiplyProtocol};

mod open;
pub use open::OpenProtocol;

use crate::error::MpcError;
use crate::fields::MpcField;
use crate::graph::{NodeId, Operation};
use crate::network::Network;
use crate::spdz::{AuthShare, ResourcePool};

/// Outcome of evaluating one round of a native protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EvaluationStatus {
    HasMoreRounds,
    IsDone,
}

/// Round-based unit of work. Round numbers start at 0 and grow by one per call.
/// A round first receives what the previous round's peers sent, then sends;
/// nothing may be sent in the round that reports `IsDone`.
pub trait NativeProtocol<T: MpcField> {
    type Output;

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError>;

    /// Result of the protocol, available once it reported `IsDone`.
    fn out(&mut self) -> Option<Self::Output>;
}

/// Value produced by a node of a protocol graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value<T> {
    Share(AuthShare<T>),
    Shares(Vec<AuthShare<T>>),
    /// Opened plaintext, trustworthy only after a MAC check.
    Plain(T),
    /// Completion marker of a MAC check.
    Checked,
}

/// The closed set of native protocols a graph node can run.
pub enum Gate<T: MpcField> {
    Input(InputProtocol<T>),
    Linear(LinearProtocol<T>),
    Multiply(MultiplyProtocol<T>),
    BatchMultiply(BatchMultiplyProtocol<T>),
    Open(OpenProtocol<T>),
    MacCheck(MacCheckProtocol<T>),
}

impl<T: MpcField> Gate<T> {
    /// Build the protocol for `operation` from the values of its operands.
    pub fn instantiate(
        operation: &Operation<T>,
        values: &[Option<Value<T>>],
    ) -> Result<Self, MpcError> {
        let share = |id: NodeId| share_of(values, id);
        Ok(match operation {
            Operation::Input { owner, value } => Gate::Input(InputProtocol::new(*owner, *value)),
            Operation::Add(x, y) => {
                Gate::Linear(LinearProtocol::new(LinearOp::Add(share(*x)?, share(*y)?)))
            }
            Operation::Sub(x, y) => {
                Gate::Linear(LinearProtocol::new(LinearOp::Sub(share(*x)?, share(*y)?)))
            }
            Operation::Neg(x) => Gate::Linear(LinearProtocol::new(LinearOp::Neg(share(*x)?))),
            Operation::AddPublic(x, c) => {
                Gate::Linear(LinearProtocol::new(LinearOp::AddPublic(share(*x)?, *c)))
            }
            Operation::SubPublic(x, c) => {
                Gate::Linear(LinearProtocol::new(LinearOp::SubPublic(share(*x)?, *c)))
            }
            Operation::MulPublic(x, c) => {
                Gate::Linear(LinearProtocol::new(LinearOp::MulPublic(share(*x)?, *c)))
            }
            Operation::Select(batch, index) => {
                let shares = match value_of(values, *batch)? {
                    Value::Shares(shares) => shares,
                    other => return Err(kind_mismatch(*batch, "a share batch", other)),
                };
                let selected = shares.get(*index).copied().ok_or_else(|| {
                    MpcError::InvalidGraph(format!(
                        "index {index} is outside the batch of {} produced by {batch}",
                        shares.len()
                    ))
                })?;
                Gate::Linear(LinearProtocol::new(LinearOp::Identity(selected)))
            }
            Operation::Multiply(x, y) => {
                Gate::Multiply(MultiplyProtocol::new(share(*x)?, share(*y)?))
            }
            Operation::MultiplyBatch(pairs) => {
                let pairs = pairs
                    .iter()
                    .map(|&(x, y)| Ok((share(x)?, share(y)?)))
                    .collect::<Result<Vec<_>, MpcError>>()?;
                Gate::BatchMultiply(BatchMultiplyProtocol::new(pairs))
            }
            Operation::Open(x) => Gate::Open(OpenProtocol::new(share(*x)?)),
            Operation::MacCheck(_) => Gate::MacCheck(MacCheckProtocol::new()),
        })
    }
}

impl<T: MpcField> NativeProtocol<T> for Gate<T> {
    type Output = Value<T>;

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        match self {
            Gate::Input(p) => p.evaluate(round, pool, network),
            Gate::Linear(p) => p.evaluate(round, pool, network),
            Gate::Multiply(p) => p.evaluate(round, pool, network),
            Gate::BatchMultiply(p) => p.evaluate(round, pool, network),
            Gate::Open(p) => p.evaluate(round, pool, network),
            Gate::MacCheck(p) => p.evaluate(round, pool, network),
        }
    }

    fn out(&mut self) -> Option<Self::Output> {
        match self {
            Gate::Input(p) => p.out().map(Value::Share),
            Gate::Linear(p) => p.out().map(Value::Share),
            Gate::Multiply(p) => p.out().map(Value::Share),
            Gate::BatchMultiply(p) => p.out().map(Value::Shares),
            Gate::Open(p) => p.out().map(Value::Plain),
            Gate::MacCheck(p) => p.out().map(|()| Value::Checked),
        }
    }
}

fn value_of<T: MpcField>(
    values: &[Option<Value<T>>],
    id: NodeId,
) -> Result<&Value<T>, MpcError> {
    values
        .get(id.index())
        .and_then(Option::as_ref)
        .ok_or_else(|| MpcError::InvalidGraph(format!("{id} has not been evaluated")))
}

fn share_of<T: MpcField>(
    values: &[Option<Value<T>>],
    id: NodeId,
) -> Result<AuthShare<T>, MpcError> {
    match value_of(values, id)? {
        Value::Share(share) => Ok(*share),
        other => Err(kind_mismatch(id, "a share", other)),
    }
}

fn kind_mismatch<T>(id: NodeId, expected: &str, found: &Value<T>) -> MpcError {
    let found = match found {
        Value::Share(_) => "a share",
        Value::Shares(_) => "a share batch",
        Value::Plain(_) => "a plaintext",
        Value::Checked => "a MAC check",
    };
    MpcError::InvalidGraph(format!("{id} is {found}, expected {expected}"))
}
