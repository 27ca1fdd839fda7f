use crate::error::MpcError;
use crate::fields::MpcField;
use crate::graph::{NodeId, Operation, ProtocolGraph};

/// Value of a node evaluated in the clear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlainValue<T> {
    Scalar(T),
    Batch(Vec<T>),
    Checked,
}

/// Evaluates a protocol graph on a single node without any secret sharing.
/// Every input must carry its value.
#[derive(Debug, Default)]
pub struct PlaintextEvaluator {
    num_openings: usize,
    num_multiplications: usize,
}

impl PlaintextEvaluator {
    /// Create a new instance of the evaluator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total count of opened values.
    pub fn num_openings(&self) -> usize {
        self.num_openings
    }

    /// Get total count of multiplied pairs.
    pub fn num_multiplications(&self) -> usize {
        self.num_multiplications
    }

    pub fn evaluate<T: MpcField>(
        &mut self,
        graph: &ProtocolGraph<T>,
    ) -> Result<Vec<PlainValue<T>>, MpcError> {
        let mut values: Vec<PlainValue<T>> = Vec::with_capacity(graph.len());
        for (id, operation) in graph.nodes() {
            let scalar = |node: NodeId| scalar_of(&values, node);
            let value = match operation {
                Operation::Input { value, .. } => PlainValue::Scalar(value.ok_or_else(|| {
                    MpcError::InvalidGraph(format!("{id} has no plaintext input"))
                })?),
                Operation::Add(x, y) => PlainValue::Scalar(scalar(*x)? + scalar(*y)?),
                Operation::Sub(x, y) => PlainValue::Scalar(scalar(*x)? - scalar(*y)?),
                Operation::Neg(x) => PlainValue::Scalar(-scalar(*x)?),
                Operation::AddPublic(x, c) => PlainValue::Scalar(scalar(*x)? + *c),
                Operation::SubPublic(x, c) => PlainValue::Scalar(scalar(*x)? - *c),
                Operation::MulPublic(x, c) => PlainValue::Scalar(scalar(*x)? * *c),
                Operation::Multiply(x, y) => {
                    self.num_multiplications += 1;
                    PlainValue::Scalar(scalar(*x)? * scalar(*y)?)
                }
                Operation::MultiplyBatch(pairs) => {
                    self.num_multiplications += pairs.len();
                    PlainValue::Batch(
                        pairs
                            .iter()
                            .map(|&(x, y)| Ok(scalar(x)? * scalar(y)?))
                            .collect::<Result<_, MpcError>>()?,
                    )
                }
                Operation::Select(batch, index) => match values.get(batch.index()) {
                    Some(PlainValue::Batch(products)) => {
                        PlainValue::Scalar(*products.get(*index).ok_or_else(|| {
                            MpcError::InvalidGraph(format!("{id} selects past the end of {batch}"))
                        })?)
                    }
                    _ => {
                        return Err(MpcError::InvalidGraph(format!(
                            "{id} selects from {batch}, which is not a batch"
                        )))
                    }
                },
                Operation::Open(x) => {
                    self.num_openings += 1;
                    PlainValue::Scalar(scalar(*x)?.into_effective())
                }
                Operation::MacCheck(_) => PlainValue::Checked,
            };
            values.push(value);
        }
        Ok(values)
    }
}

fn scalar_of<T: MpcField>(values: &[PlainValue<T>], id: NodeId) -> Result<T, MpcError> {
    match values.get(id.index()) {
        Some(PlainValue::Scalar(value)) => Ok(*value),
        _ => Err(MpcError::InvalidGraph(format!("{id} is not a scalar"))),
    }
}

#[cfg(test)]
mod tests {
    use crate::fields::Ring128;

    use super::*;

    #[test]
    fn test_evaluates_in_clear() {
        let mut graph = ProtocolGraph::new();
        let x = graph.input(1, Some(Ring128::new(6)));
        let y = graph.input(2, Some(Ring128::new(7)));
        let (_, products) = graph.mul_batch(vec![(x, y), (x, x)]);
        let diff = graph.sub(products[0], products[1]);
        let lowered = graph.sub_public(diff, Ring128::new(10));
        let opened = graph.open(lowered);

        let mut evaluator = PlaintextEvaluator::new();
        let values = evaluator.evaluate(&graph).unwrap();
        // 6 * 7 - 6 * 6 - 10 wraps around and is reduced to 64 bits when opened.
        let expected = Ring128::new(u64::MAX as u128 - 3);
        assert_eq!(values[opened.index()], PlainValue::Scalar(expected));
        assert_eq!(evaluator.num_multiplications(), 2);
        assert_eq!(evaluator.num_openings(), 1);
    }

    #[test]
    fn test_missing_input_is_rejected() {
        let mut graph = ProtocolGraph::<Ring128>::new();
        graph.input(1, None);
        assert!(PlaintextEvaluator::new().evaluate(&graph).is_err());
    }
}
