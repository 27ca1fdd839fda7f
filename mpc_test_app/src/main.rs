use std::error::Error;

use argh::FromArgs;
use mpc::{
    executor::{EvaluationStats, ProtocolEvaluator},
    fields::Mersenne127,
    network::RoundFrame,
    plaintext::{PlainValue, PlaintextEvaluator},
    spdz::{FakeDataSupplier, PrecomputedDataSupplier, ResourcePool, ResourcePoolConfig},
    transport::{connect_multiparty, NetworkConfig},
    MpcError, MpcField, NodeId, ProtocolGraph,
};
use tracing::info;

type Fp = Mersenne127;

#[derive(Clone, FromArgs)]
/// Runs a small arithmetic computation between local parties over TCP.
struct Options {
    /// number of parties, ignored when a config file is given
    #[argh(option, default = "3")]
    parties: usize,

    /// first localhost port, ignored when a config file is given
    #[argh(option, default = "48000")]
    base_port: u16,

    /// path to a JSON network configuration
    #[argh(option)]
    config: Option<String>,

    /// path pattern of dealer output ('#' is replaced with party ID); fake data if absent
    #[argh(option)]
    precomputed: Option<String>,

    /// input of party 1
    #[argh(option, default = "1234567")]
    x: u64,

    /// input of party 2
    #[argh(option, default = "1110")]
    y: u64,
}

/// Outputs opened by the computation.
struct Computation {
    graph: ProtocolGraph<Fp>,
    outputs: Vec<NodeId>,
}

/// Computes `x * y + 3x` and `x^2 + y^2`. Inputs are only filled in where `knows` allows it.
fn build_computation(options: &Options, knows: impl Fn(usize) -> bool) -> Computation {
    let mut graph = ProtocolGraph::new();
    let x = graph.input(1, knows(1).then(|| Fp::from_u64(options.x)));
    let y = graph.input(2, knows(2).then(|| Fp::from_u64(options.y)));

    let xy = graph.mul(x, y);
    let triple_x = graph.mul_public(x, Fp::from_u64(3));
    let first = graph.add(xy, triple_x);

    let (_, squares) = graph.mul_batch(vec![(x, x), (y, y)]);
    let second = graph.add(squares[0], squares[1]);

    let outputs = vec![graph.open(first), graph.open(second)];
    Computation { graph, outputs }
}

async fn run_node(
    options: Options,
    config: NetworkConfig,
    party_id: usize,
) -> Result<(Vec<Fp>, EvaluationStats), MpcError> {
    let num_parties = config.num_parties();
    let pool_config = ResourcePoolConfig::for_field::<Fp>(party_id, num_parties);
    let pool = match &options.precomputed {
        Some(pattern) => {
            let path = pattern.replace('#', &format!("{party_id}"));
            ResourcePool::new(&pool_config, PrecomputedDataSupplier::<Fp>::from_file(path)?)?
        }
        None => ResourcePool::new(
            &pool_config,
            FakeDataSupplier::<Fp>::new(num_parties, party_id, 123),
        )?,
    };

    let transport = connect_multiparty::<RoundFrame>(&config, party_id).await?;
    let mut evaluator = ProtocolEvaluator::new(pool, transport)?;

    let computation = build_computation(&options, |owner| owner == party_id);
    let outputs = evaluator.evaluate(&computation.graph).await?;
    let values = computation
        .outputs
        .iter()
        .map(|&id| {
            outputs
                .plain(id)
                .ok_or_else(|| MpcError::InvalidGraph(format!("{id} is not an opened value")))
        })
        .collect::<Result<_, _>>()?;
    Ok((values, evaluator.stats()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let options: Options = argh::from_env();
    let config = match &options.config {
        Some(path) => NetworkConfig::load(path)?,
        None => NetworkConfig::localhost(options.parties, options.base_port),
    };

    let tasks: Vec<_> = (1..=config.num_parties())
        .map(|party_id| tokio::spawn(run_node(options.clone(), config.clone(), party_id)))
        .collect();
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        results.push(task.await??);
    }

    let computation = build_computation(&options, |_| true);
    let expected = PlaintextEvaluator::new().evaluate(&computation.graph)?;
    let expected: Vec<_> = computation
        .outputs
        .iter()
        .map(|id| expected[id.index()].clone())
        .collect();

    for (index, (values, stats)) in results.iter().enumerate() {
        info!(party_id = index + 1, ?values, ?stats, "Party finished");
        let plain: Vec<_> = values.iter().copied().map(PlainValue::Scalar).collect();
        if plain != expected {
            let party_id = index + 1;
            return Err(format!("party {party_id} computed {values:?}, expected {expected:?}").into());
        }
    }
    info!(?expected, "All parties agree with the plaintext evaluation");
    Ok(())
}
