use std::collections::BTreeSet;

use tracing::{debug, instrument, trace};

use crate::error::MpcError;
use crate::fields::MpcField;
use crate::graph::{NodeId, ProtocolGraph};
use crate::network::RoundNetwork;
use crate::protocols::{
    EvaluationStatus, Gate, JointRandomnessProtocol, MacCheckProtocol, NativeProtocol, Value,
};
use crate::spdz::{AuthShare, ResourcePool};
use crate::transport::RoundTransport;
use crate::MpcContext;

/// Counters of an evaluator over its lifetime.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Number of network flushes.
    pub rounds: usize,
    /// Number of native protocols run to completion.
    pub protocols: usize,
    /// Payload bytes sent to peers.
    pub bytes_sent: usize,
}

/// Values computed by the nodes of a graph, indexed by node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outputs<T> {
    values: Vec<Option<Value<T>>>,
}

impl<T: MpcField> Outputs<T> {
    pub fn get(&self, id: NodeId) -> Option<&Value<T>> {
        self.values.get(id.index()).and_then(Option::as_ref)
    }

    pub fn share(&self, id: NodeId) -> Option<AuthShare<T>> {
        match self.get(id)? {
            Value::Share(share) => Some(*share),
            _ => None,
        }
    }

    pub fn shares(&self, id: NodeId) -> Option<&[AuthShare<T>]> {
        match self.get(id)? {
            Value::Shares(shares) => Some(shares),
            _ => None,
        }
    }

    /// Opened value of an `Open` node. All openings were MAC-checked before release.
    pub fn plain(&self, id: NodeId) -> Option<T> {
        match self.get(id)? {
            Value::Plain(value) => Some(*value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Drives native protocols of one party, batching all protocols that are ready in a
/// round into a single network exchange.
pub struct ProtocolEvaluator<T: MpcField, Tr> {
    pool: ResourcePool<T>,
    transport: Tr,
    network: RoundNetwork,
    stats: EvaluationStats,
}

impl<T: MpcField, Tr: RoundTransport> ProtocolEvaluator<T, Tr> {
    /// Create new evaluator. The transport must connect the same party as the pool.
    pub fn new(pool: ResourcePool<T>, transport: Tr) -> Result<Self, MpcError> {
        if transport.party_id() != pool.party_id() || transport.num_parties() != pool.num_parties()
        {
            return Err(MpcError::Protocol(format!(
                "transport of party {}/{} used with resource pool of party {}/{}",
                transport.party_id(),
                transport.num_parties(),
                pool.party_id(),
                pool.num_parties()
            )));
        }
        let network = RoundNetwork::new(pool.party_id(), pool.num_parties());
        Ok(Self {
            pool,
            transport,
            network,
            stats: EvaluationStats::default(),
        })
    }

    pub fn pool(&self) -> &ResourcePool<T> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ResourcePool<T> {
        &mut self.pool
    }

    pub fn into_pool(self) -> ResourcePool<T> {
        self.pool
    }

    pub fn stats(&self) -> EvaluationStats {
        EvaluationStats {
            bytes_sent: self.network.bytes_sent(),
            ..self.stats
        }
    }

    /// Run a single protocol to completion, flushing the network after every round.
    pub async fn run_native<P: NativeProtocol<T>>(
        &mut self,
        mut protocol: P,
    ) -> Result<P::Output, MpcError> {
        let mut round = 0;
        while protocol.evaluate(round, &mut self.pool, &mut self.network)?
            == EvaluationStatus::HasMoreRounds
        {
            self.flush().await?;
            round += 1;
        }
        self.check_quiescent()?;
        self.stats.protocols += 1;
        protocol
            .out()
            .ok_or_else(|| MpcError::Protocol("protocol finished without output".into()))
    }

    /// Agree on the seed of the joint generator with all parties.
    pub async fn initialize_joint_randomness(&mut self) -> Result<(), MpcError> {
        let seed = self.run_native(JointRandomnessProtocol::new()).await?;
        self.pool.install_joint_seed(seed);
        debug!("Joint randomness initialized");
        Ok(())
    }

    /// Evaluate every node of `graph`.
    ///
    /// In each round the protocols still in flight advance first, in the order they were
    /// evaluated before, followed by the nodes that became ready, in ascending id order.
    /// The order depends only on the graph, so all parties exchange matching messages.
    /// Values opened anywhere in the graph are MAC-checked before the outputs are returned.
    #[instrument(skip_all, fields(party_id = self.pool.party_id(), nodes = graph.len()))]
    pub async fn evaluate(&mut self, graph: &ProtocolGraph<T>) -> Result<Outputs<T>, MpcError> {
        graph.validate(self.pool.num_parties())?;
        if !self.pool.has_joint_randomness() {
            self.initialize_joint_randomness().await?;
        }

        let mut schedule = Schedule::new(graph);
        let mut in_flight: Vec<(NodeId, Gate<T>, usize)> = Vec::new();
        let start_rounds = self.stats.rounds;

        loop {
            let mut still_running = Vec::with_capacity(in_flight.len());
            for (id, mut gate, round) in in_flight.drain(..) {
                trace!(node = %id, round, "Evaluating protocol");
                match gate.evaluate(round, &mut self.pool, &mut self.network)? {
                    EvaluationStatus::HasMoreRounds => still_running.push((id, gate, round + 1)),
                    EvaluationStatus::IsDone => {
                        schedule.complete(id, gate)?;
                        self.stats.protocols += 1;
                    }
                }
            }
            while let Some((id, mut gate)) = schedule.start_next()? {
                trace!(node = %id, "Starting protocol");
                match gate.evaluate(0, &mut self.pool, &mut self.network)? {
                    EvaluationStatus::HasMoreRounds => still_running.push((id, gate, 1)),
                    EvaluationStatus::IsDone => {
                        schedule.complete(id, gate)?;
                        self.stats.protocols += 1;
                    }
                }
            }

            if still_running.is_empty() {
                break;
            }
            self.flush().await?;
            in_flight = still_running;
        }
        self.check_quiescent()?;
        let outputs = schedule.into_outputs()?;

        if self.pool.opened_values().has_pending() {
            self.run_native(MacCheckProtocol::new()).await?;
        }
        debug!(rounds = self.stats.rounds - start_rounds, "Graph evaluated");
        Ok(outputs)
    }

    /// Exchange the messages of the current round with all peers.
    async fn flush(&mut self) -> Result<(), MpcError> {
        let frames = self.network.take_outgoing()?;
        let received = self.transport.exchange(frames).await?;
        self.network.deliver(received)?;
        self.stats.rounds += 1;
        debug!(
            round = self.stats.rounds,
            bytes_sent = self.network.bytes_sent(),
            "Round flushed"
        );
        Ok(())
    }

    /// Nothing may be sent in a final round and every received message must be consumed.
    fn check_quiescent(&self) -> Result<(), MpcError> {
        if self.network.has_outgoing() {
            return Err(MpcError::Protocol(
                "messages were sent in the final round of a protocol".into(),
            ));
        }
        self.network.ensure_drained()
    }
}

/// Progress of a graph evaluation: finished values and the nodes allowed to start.
struct Schedule<'a, T> {
    graph: &'a ProtocolGraph<T>,
    dependents: Vec<Vec<NodeId>>,
    missing: Vec<usize>,
    ready: BTreeSet<NodeId>,
    values: Vec<Option<Value<T>>>,
}

impl<'a, T: MpcField> Schedule<'a, T> {
    fn new(graph: &'a ProtocolGraph<T>) -> Self {
        let missing: Vec<usize> = graph
            .nodes()
            .map(|(_, operation)| operation.dependencies().len())
            .collect();
        let ready = graph
            .nodes()
            .filter(|(id, _)| missing[id.index()] == 0)
            .map(|(id, _)| id)
            .collect();
        Self {
            graph,
            dependents: graph.dependents(),
            missing,
            ready,
            values: vec![None; graph.len()],
        }
    }

    /// Instantiate the ready node with the lowest id.
    fn start_next(&mut self) -> Result<Option<(NodeId, Gate<T>)>, MpcError> {
        let id = match self.ready.pop_first() {
            Some(id) => id,
            None => return Ok(None),
        };
        let operation = self
            .graph
            .operation(id)
            .ok_or_else(|| MpcError::InvalidGraph(format!("{id} does not exist")))?;
        Ok(Some((id, Gate::instantiate(operation, &self.values)?)))
    }

    /// Store the output of a finished node and release the nodes waiting for it.
    fn complete(&mut self, id: NodeId, mut gate: Gate<T>) -> Result<(), MpcError> {
        let value = gate
            .out()
            .ok_or_else(|| MpcError::Protocol(format!("{id} finished without output")))?;
        self.values[id.index()] = Some(value);
        for &dependent in &self.dependents[id.index()] {
            self.missing[dependent.index()] -= 1;
            if self.missing[dependent.index()] == 0 {
                self.ready.insert(dependent);
            }
        }
        Ok(())
    }

    fn into_outputs(self) -> Result<Outputs<T>, MpcError> {
        if let Some(index) = self.values.iter().position(Option::is_none) {
            return Err(MpcError::InvalidGraph(format!(
                "node {index} was never evaluated"
            )));
        }
        Ok(Outputs {
            values: self.values,
        })
    }
}

impl<T: MpcField, Tr: RoundTransport> MpcContext for ProtocolEvaluator<T, Tr> {
    fn num_parties(&self) -> usize {
        self.pool.num_parties()
    }

    fn party_id(&self) -> usize {
        self.pool.party_id()
    }
}
