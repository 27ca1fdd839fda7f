use digest::Digest;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha3::Sha3_256;
use tracing::debug;
use zeroize::Zeroize;

use crate::error::{ConfigError, MpcError};
use crate::fields::MpcField;
use crate::MpcContext;

use super::{DataSupplier, OpenedValueStore};

/// Length of broadcast validation digests and commitments.
pub const DIGEST_LEN: usize = 32;

/// Construction parameters of a resource pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePoolConfig {
    /// 1-indexed id of the local party.
    pub party_id: usize,
    pub num_parties: usize,
    pub operational_bits: u32,
    pub effective_bits: u32,
    /// Seed of the local generator. Drawn from the OS when absent.
    #[serde(default)]
    pub local_seed: Option<[u8; 32]>,
}

impl ResourcePoolConfig {
    /// Configuration using the bit lengths supported by element type `T`.
    pub fn for_field<T: MpcField>(party_id: usize, num_parties: usize) -> Self {
        Self {
            party_id,
            num_parties,
            operational_bits: T::OPERATIONAL_BITS,
            effective_bits: T::EFFECTIVE_BITS,
            local_seed: None,
        }
    }

    pub fn with_local_seed(mut self, seed: [u8; 32]) -> Self {
        self.local_seed = Some(seed);
        self
    }

    /// Check the parameters against element type `T`.
    pub fn validate<T: MpcField>(&self) -> Result<(), ConfigError> {
        if self.num_parties < 2 {
            return Err(ConfigError::TooFewParties(self.num_parties));
        }
        if self.party_id == 0 || self.party_id > self.num_parties {
            return Err(ConfigError::PartyIdOutOfRange {
                party_id: self.party_id,
                num_parties: self.num_parties,
            });
        }
        if self.operational_bits != T::OPERATIONAL_BITS || self.effective_bits != T::EFFECTIVE_BITS
        {
            return Err(ConfigError::UnsupportedBitLength {
                operational: self.operational_bits,
                effective: self.effective_bits,
                supported_operational: T::OPERATIONAL_BITS,
                supported_effective: T::EFFECTIVE_BITS,
            });
        }
        Ok(())
    }
}

/// SHA3-256 digests for broadcast validation and hash commitments.
#[derive(Clone, Copy, Debug, Default)]
pub struct BroadcastHelper;

impl BroadcastHelper {
    /// Digest over `messages`, each framed by its position and its length, so no two
    /// distinct message lists share a digest input.
    pub fn digest<'a>(&self, messages: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
        let mut hasher = Sha3_256::new();
        for (index, message) in messages.into_iter().enumerate() {
            hasher.update((index as u64).to_be_bytes());
            hasher.update((message.len() as u64).to_be_bytes());
            hasher.update(message);
        }
        hasher.finalize().to_vec()
    }

    /// Hash commitment to an opening (value followed by its randomness).
    pub fn commit(&self, opening: &[u8]) -> Vec<u8> {
        Sha3_256::digest(opening).to_vec()
    }
}

/// Per-party state of one MPC invocation.
pub struct ResourcePool<T: MpcField> {
    party_id: usize,
    num_parties: usize,
    mac_key_share: T,
    supplier: Box<dyn DataSupplier<T>>,
    opened_values: OpenedValueStore<T>,
    local_rng: ChaCha20Rng,
    joint_rng: Option<ChaCha20Rng>,
    broadcast: BroadcastHelper,
}

impl<T: MpcField> ResourcePool<T> {
    /// Validate `config` and set up the pool around `supplier`.
    pub fn new(
        config: &ResourcePoolConfig,
        supplier: impl DataSupplier<T> + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate::<T>()?;
        let local_rng = match config.local_seed {
            Some(seed) => ChaCha20Rng::from_seed(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        debug!(
            party_id = config.party_id,
            num_parties = config.num_parties,
            operational_bits = config.operational_bits,
            effective_bits = config.effective_bits,
            "Resource pool created"
        );
        Ok(Self {
            party_id: config.party_id,
            num_parties: config.num_parties,
            mac_key_share: supplier.mac_key_share(),
            supplier: Box::new(supplier),
            opened_values: OpenedValueStore::new(),
            local_rng,
            joint_rng: None,
            broadcast: BroadcastHelper,
        })
    }

    pub fn mac_key_share(&self) -> T {
        self.mac_key_share
    }

    pub fn data_supplier(&mut self) -> &mut dyn DataSupplier<T> {
        self.supplier.as_mut()
    }

    pub fn opened_values(&self) -> &OpenedValueStore<T> {
        &self.opened_values
    }

    pub fn opened_values_mut(&mut self) -> &mut OpenedValueStore<T> {
        &mut self.opened_values
    }

    /// Generator private to this party.
    pub fn local_rng(&mut self) -> &mut ChaCha20Rng {
        &mut self.local_rng
    }

    /// Generator seeded identically at every party by the joint randomness protocol.
    pub fn joint_rng(&mut self) -> Result<&mut ChaCha20Rng, MpcError> {
        self.joint_rng
            .as_mut()
            .ok_or_else(|| MpcError::Protocol("joint randomness is not initialized".into()))
    }

    pub fn has_joint_randomness(&self) -> bool {
        self.joint_rng.is_some()
    }

    /// Seed the joint generator. The seed buffer is wiped afterwards.
    pub fn install_joint_seed(&mut self, mut seed: [u8; 32]) {
        self.joint_rng = Some(ChaCha20Rng::from_seed(seed));
        seed.zeroize();
    }

    pub fn broadcast(&self) -> &BroadcastHelper {
        &self.broadcast
    }
}

impl<T: MpcField> MpcContext for ResourcePool<T> {
    fn num_parties(&self) -> usize {
        self.num_parties
    }

    fn party_id(&self) -> usize {
        self.party_id
    }
}

impl<T: MpcField> Drop for ResourcePool<T> {
    fn drop(&mut self) {
        self.mac_key_share.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use crate::fields::{Mersenne127, Mersenne61, Ring128};
    use crate::spdz::FakeDataSupplier;

    use super::*;

    fn pool<T: MpcField>(config: &ResourcePoolConfig) -> Result<ResourcePool<T>, ConfigError> {
        ResourcePool::new(
            config,
            FakeDataSupplier::<T>::new(config.num_parties, config.party_id, 1),
        )
    }

    #[test]
    fn test_accepts_supported_widths() {
        let first = pool::<Ring128>(&ResourcePoolConfig::for_field::<Ring128>(2, 3)).unwrap();
        assert_eq!(first.party_id(), 2);
        assert_eq!(first.num_parties(), 3);
        assert!(!first.has_joint_randomness());

        let config = ResourcePoolConfig {
            party_id: 1,
            num_parties: 2,
            operational_bits: 128,
            effective_bits: 64,
            local_seed: None,
        };
        assert!(pool::<Ring128>(&config).is_ok());
    }

    #[test]
    fn test_rejects_unsupported_widths() {
        let config = ResourcePoolConfig {
            party_id: 1,
            num_parties: 2,
            operational_bits: 128,
            effective_bits: 32,
            local_seed: None,
        };
        assert!(matches!(
            pool::<Ring128>(&config),
            Err(ConfigError::UnsupportedBitLength { .. })
        ));

        let config = ResourcePoolConfig::for_field::<Mersenne61>(1, 2);
        assert!(matches!(
            pool::<Mersenne127>(&config),
            Err(ConfigError::UnsupportedBitLength { .. })
        ));
    }

    #[test]
    fn test_rejects_party_ids_out_of_range() {
        for (party_id, num_parties) in [(0, 2), (3, 2)] {
            let config = ResourcePoolConfig::for_field::<Mersenne127>(party_id, num_parties);
            assert_eq!(
                config.validate::<Mersenne127>(),
                Err(ConfigError::PartyIdOutOfRange {
                    party_id,
                    num_parties
                })
            );
        }
        let config = ResourcePoolConfig::for_field::<Mersenne127>(1, 1);
        assert_eq!(
            config.validate::<Mersenne127>(),
            Err(ConfigError::TooFewParties(1))
        );
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{"party_id": 2, "num_parties": 3, "operational_bits": 128, "effective_bits": 127}"#;
        let config: ResourcePoolConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, ResourcePoolConfig::for_field::<Mersenne127>(2, 3));
    }

    #[test]
    fn test_joint_rng_requires_seed() {
        let mut pool = pool::<Mersenne127>(&ResourcePoolConfig::for_field::<Mersenne127>(1, 2))
            .unwrap();
        assert!(pool.joint_rng().is_err());
        pool.install_joint_seed([5; 32]);
        assert!(pool.joint_rng().is_ok());
    }

    #[test]
    fn test_digest_separates_messages() {
        let helper = BroadcastHelper;
        let split = helper.digest([&b"ab"[..], &b"cd"[..]]);
        assert_eq!(split.len(), DIGEST_LEN);
        assert_eq!(split, helper.digest([&b"ab"[..], &b"cd"[..]]));
        assert_ne!(split, helper.digest([&b"abcd"[..]]));
        assert_ne!(split, helper.digest([&b"a"[..], &b"bcd"[..]]));
        assert_ne!(split, helper.digest([&b"abc"[..], &b"d"[..]]));
        assert_ne!(helper.digest([&b""[..], &b"x"[..]]), helper.digest([&b"x"[..], &b""[..]]));
        assert_eq!(helper.commit(b"abcd").len(), DIGEST_LEN);
    }
}
