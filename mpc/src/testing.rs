use std::future::Future;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::MpcError;
use crate::executor::ProtocolEvaluator;
use crate::fields::MpcField;
use crate::network::{Network, RoundFrame};
use crate::protocols::{EvaluationStatus, NativeProtocol};
use crate::spdz::{AuthShare, FakeDataSupplier, ResourcePool, ResourcePoolConfig};
use crate::transport::{mock_multiparty_channels, BincodeDuplex, MultipartyTransport};

/// Seed shared by the fake data suppliers of all parties in a test run.
const SUPPLIER_SEED: u8 = 42;

pub(crate) type TestTransport = MultipartyTransport<RoundFrame, BincodeDuplex<RoundFrame>>;

/// Installs a subscriber for the current thread. Output is controlled with `RUST_LOG`.
pub(crate) fn init_tracing() -> tracing::dispatcher::DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .set_default()
}

/// Run `party` for every party over in-process channels and collect the results in
/// party order.
pub(crate) async fn run_parties<T, F, Fut, R>(num_parties: usize, party: F) -> Vec<R>
where
    T: MpcField,
    F: Fn(ProtocolEvaluator<T, TestTransport>) -> Fut,
    Fut: Future<Output = R>,
{
    let _guard = init_tracing();
    let evaluators: Vec<_> = mock_multiparty_channels::<RoundFrame>(num_parties, 1 << 20)
        .into_iter()
        .enumerate()
        .map(|(index, transport)| {
            let party_id = index + 1;
            let config = ResourcePoolConfig::for_field::<T>(party_id, num_parties)
                .with_local_seed([party_id as u8; 32]);
            let supplier = FakeDataSupplier::new(num_parties, party_id, SUPPLIER_SEED);
            let pool = ResourcePool::new(&config, supplier).unwrap();
            ProtocolEvaluator::new(pool, transport).unwrap()
        })
        .collect();
    futures::future::join_all(evaluators.into_iter().map(party)).await
}

/// Plain MAC key together with its additive sharing.
pub(crate) struct AuthKey<T> {
    pub shares: Vec<T>,
    pub plain: T,
}

impl<T: MpcField> AuthKey<T> {
    pub fn random(num_parties: usize, seed: u8) -> Self {
        let mut rng = ChaCha20Rng::from_seed([seed; 32]);
        let shares: Vec<_> = (0..num_parties).map(|_| T::random(&mut rng)).collect();
        let plain = shares.iter().fold(T::zero(), |acc, &x| acc + x);
        Self { shares, plain }
    }
}

/// Random authenticated sharing of `value` under `key`.
pub(crate) fn shares_of<T: MpcField>(key: &AuthKey<T>, value: T, seed: u8) -> Vec<AuthShare<T>> {
    let mut rng = ChaCha20Rng::from_seed([seed.wrapping_add(128); 32]);
    let mut shares: Vec<_> = (1..key.shares.len())
        .map(|_| AuthShare::new(T::random(&mut rng), T::random(&mut rng)))
        .collect();
    let sum = shares.iter().fold(AuthShare::zero(), |acc, &x| acc + x);
    shares.push(AuthShare::new(
        value - sum.share(),
        key.plain * value - sum.mac(),
    ));
    shares
}

/// Reconstruct a value, or `None` if its MAC does not verify.
pub(crate) fn open_shares<T: MpcField>(key: &AuthKey<T>, shares: &[AuthShare<T>]) -> Option<T> {
    let sum = shares.iter().fold(AuthShare::zero(), |acc, &x| acc + x);
    (sum.mac() == key.plain * sum.share()).then(|| sum.share())
}

/// Reconstruct a value from the `(share, mac key share)` results of all parties.
pub(crate) fn open_outputs<T: MpcField>(results: Vec<Result<(AuthShare<T>, T), MpcError>>) -> T {
    let (shares, key_shares): (Vec<_>, Vec<_>) =
        results.into_iter().map(|result| result.unwrap()).unzip();
    let key = AuthKey {
        plain: key_shares.iter().fold(T::zero(), |acc, &x| acc + x),
        shares: key_shares,
    };
    open_shares(&key, &shares).expect("MAC of the output does not verify")
}

/// Deviation applied to outgoing messages.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Tamper {
    /// Force the first byte to 0xFF.
    Sentinel,
    /// Flip the lowest bit of the last byte.
    FlipLastBit,
}

/// Protocol wrapper that corrupts what the wrapped protocol sends in one round.
pub(crate) struct Tampered<P> {
    inner: P,
    round: usize,
    kind: Tamper,
    target: Option<usize>,
}

impl<P> Tampered<P> {
    /// Corrupt every message sent in `round`.
    pub fn new(inner: P, round: usize, kind: Tamper) -> Self {
        Self {
            inner,
            round,
            kind,
            target: None,
        }
    }

    /// Only corrupt messages sent to `party`.
    pub fn towards(mut self, party: usize) -> Self {
        self.target = Some(party);
        self
    }
}

impl<T: MpcField, P: NativeProtocol<T>> NativeProtocol<T> for Tampered<P> {
    type Output = P::Output;

    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut ResourcePool<T>,
        network: &mut impl Network,
    ) -> Result<EvaluationStatus, MpcError> {
        if round != self.round {
            return self.inner.evaluate(round, pool, network);
        }
        let mut tampering = TamperingNetwork {
            inner: network,
            kind: self.kind,
            target: self.target,
        };
        self.inner.evaluate(round, pool, &mut tampering)
    }

    fn out(&mut self) -> Option<Self::Output> {
        self.inner.out()
    }
}

struct TamperingNetwork<'a, N> {
    inner: &'a mut N,
    kind: Tamper,
    target: Option<usize>,
}

impl<N: Network> Network for TamperingNetwork<'_, N> {
    fn num_parties(&self) -> usize {
        self.inner.num_parties()
    }

    fn send(&mut self, party: usize, mut message: Vec<u8>) -> Result<(), MpcError> {
        if self.target.map_or(true, |target| target == party) {
            match self.kind {
                Tamper::Sentinel => {
                    if let Some(first) = message.first_mut() {
                        *first = 0xFF;
                    }
                }
                Tamper::FlipLastBit => {
                    if let Some(last) = message.last_mut() {
                        *last ^= 1;
                    }
                }
            }
        }
        self.inner.send(party, message)
    }

    fn receive(&mut self, party: usize) -> Result<Vec<u8>, MpcError> {
        self.inner.receive(party)
    }
}
