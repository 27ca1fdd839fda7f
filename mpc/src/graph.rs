use std::fmt;

use crate::error::MpcError;
use crate::fields::MpcField;

/// Index of a node within a [`ProtocolGraph`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

/// Operation performed by a graph node. Operands are earlier nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation<T> {
    /// Secret input of party `owner`; `value` is only present at the owner.
    Input { owner: usize, value: Option<T> },
    Add(NodeId, NodeId),
    Sub(NodeId, NodeId),
    Neg(NodeId),
    AddPublic(NodeId, T),
    SubPublic(NodeId, T),
    MulPublic(NodeId, T),
    Multiply(NodeId, NodeId),
    /// Products of many pairs, computed with a single exchange.
    MultiplyBatch(Vec<(NodeId, NodeId)>),
    /// Element `index` of the products of a batch node.
    Select(NodeId, usize),
    Open(NodeId),
    /// Verify every value opened so far, once the listed nodes have finished.
    MacCheck(Vec<NodeId>),
}

impl<T> Operation<T> {
    /// Distinct nodes whose values this operation consumes or waits for, in ascending order.
    pub fn dependencies(&self) -> Vec<NodeId> {
        let mut dependencies = match self {
            Operation::Input { .. } => Vec::new(),
            Operation::Add(x, y) | Operation::Sub(x, y) | Operation::Multiply(x, y) => {
                vec![*x, *y]
            }
            Operation::Neg(x)
            | Operation::AddPublic(x, _)
            | Operation::SubPublic(x, _)
            | Operation::MulPublic(x, _)
            | Operation::Select(x, _)
            | Operation::Open(x) => vec![*x],
            Operation::MultiplyBatch(pairs) => {
                pairs.iter().flat_map(|&(x, y)| [x, y]).collect()
            }
            Operation::MacCheck(after) => after.clone(),
        };
        dependencies.sort_unstable();
        dependencies.dedup();
        dependencies
    }
}

/// Directed acyclic graph of protocol operations, built in topological order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolGraph<T> {
    nodes: Vec<Operation<T>>,
}

impl<T: MpcField> Default for ProtocolGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MpcField> ProtocolGraph<T> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Append an operation and return its id.
    pub fn push(&mut self, operation: Operation<T>) -> NodeId {
        self.nodes.push(operation);
        NodeId(self.nodes.len() - 1)
    }

    pub fn input(&mut self, owner: usize, value: Option<T>) -> NodeId {
        self.push(Operation::Input { owner, value })
    }

    pub fn add(&mut self, x: NodeId, y: NodeId) -> NodeId {
        self.push(Operation::Add(x, y))
    }

    pub fn sub(&mut self, x: NodeId, y: NodeId) -> NodeId {
        self.push(Operation::Sub(x, y))
    }

    pub fn neg(&mut self, x: NodeId) -> NodeId {
        self.push(Operation::Neg(x))
    }

    pub fn add_public(&mut self, x: NodeId, value: T) -> NodeId {
        self.push(Operation::AddPublic(x, value))
    }

    pub fn sub_public(&mut self, x: NodeId, value: T) -> NodeId {
        self.push(Operation::SubPublic(x, value))
    }

    pub fn mul_public(&mut self, x: NodeId, value: T) -> NodeId {
        self.push(Operation::MulPublic(x, value))
    }

    pub fn mul(&mut self, x: NodeId, y: NodeId) -> NodeId {
        self.push(Operation::Multiply(x, y))
    }

    /// Multiply all pairs in one batch. Returns the batch node and a node per product.
    pub fn mul_batch(&mut self, pairs: Vec<(NodeId, NodeId)>) -> (NodeId, Vec<NodeId>) {
        let count = pairs.len();
        let batch = self.push(Operation::MultiplyBatch(pairs));
        let products = (0..count)
            .map(|index| self.push(Operation::Select(batch, index)))
            .collect();
        (batch, products)
    }

    pub fn open(&mut self, x: NodeId) -> NodeId {
        self.push(Operation::Open(x))
    }

    pub fn mac_check(&mut self, after: Vec<NodeId>) -> NodeId {
        self.push(Operation::MacCheck(after))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn operation(&self, id: NodeId) -> Option<&Operation<T>> {
        self.nodes.get(id.0)
    }

    /// Nodes with their ids, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Operation<T>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, operation)| (NodeId(index), operation))
    }

    /// For every node, the nodes that depend on it.
    pub fn dependents(&self) -> Vec<Vec<NodeId>> {
        let mut dependents = vec![Vec::new(); self.nodes.len()];
        for (id, operation) in self.nodes() {
            for dependency in operation.dependencies() {
                if let Some(list) = dependents.get_mut(dependency.0) {
                    list.push(id);
                }
            }
        }
        dependents
    }

    /// Check that every operand precedes its user and input owners exist.
    pub fn validate(&self, num_parties: usize) -> Result<(), MpcError> {
        for (id, operation) in self.nodes() {
            if let Some(operand) = operation.dependencies().into_iter().find(|dep| *dep >= id) {
                return Err(MpcError::InvalidGraph(format!(
                    "{id} depends on {operand}, which does not precede it"
                )));
            }
            if let Operation::Input { owner, .. } = operation {
                if *owner == 0 || *owner > num_parties {
                    return Err(MpcError::InvalidGraph(format!(
                        "{id} takes input from party {owner}, but there are {num_parties} parties"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::fields::Mersenne61;

    use super::*;

    #[test]
    fn test_builder_assigns_consecutive_ids() {
        let mut graph = ProtocolGraph::<Mersenne61>::new();
        let x = graph.input(1, None);
        let y = graph.input(2, None);
        let (batch, products) = graph.mul_batch(vec![(x, y), (y, y)]);
        let z = graph.add(products[0], products[1]);
        let opened = graph.open(z);

        assert_eq!(
            [x, y, batch, products[0], products[1], z, opened].map(NodeId::index),
            [0, 1, 2, 3, 4, 5, 6]
        );
        assert_eq!(graph.len(), 7);
        assert_eq!(graph.dependents()[1], vec![batch]);
        assert_eq!(graph.dependents()[4], vec![z]);
        assert!(graph.validate(2).is_ok());
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let mut graph = ProtocolGraph::<Mersenne61>::new();
        let x = graph.input(1, None);
        graph.push(Operation::Add(x, NodeId(5)));
        assert!(matches!(graph.validate(2), Err(MpcError::InvalidGraph(_))));
    }

    #[test]
    fn test_unknown_owner_is_rejected() {
        let mut graph = ProtocolGraph::<Mersenne61>::new();
        graph.input(3, None);
        assert!(matches!(graph.validate(2), Err(MpcError::InvalidGraph(_))));
        assert!(graph.validate(3).is_ok());
    }
}
