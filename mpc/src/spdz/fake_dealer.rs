use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{ConfigError, MpcError};
use crate::fields::MpcField;
use crate::MpcContext;

use super::{AuthShare, BeaverTriple, DataSupplier, InputMask};

/// Insecure data supplier that can be used for tests.
/// Parties created with the same seed hand out mutually consistent shares.
pub struct FakeDataSupplier<T> {
    auth_key: FakeAuthKey<T>,
    beaver_triple_gen: FakeShareGenerator<T>,
    input_masks_gen: Vec<FakeShareGenerator<T>>,
}

impl<T: MpcField> FakeDataSupplier<T> {
    /// Create new instance for party `party_id` (1-indexed).
    pub fn new(num_parties: usize, party_id: usize, seed: u8) -> Self {
        let mut rng = ChaCha20Rng::from_seed([seed; 32]);
        let auth_key = FakeAuthKey::random(&mut rng, party_id, num_parties);
        Self {
            auth_key,
            beaver_triple_gen: FakeShareGenerator::new(auth_key, rng.gen()),
            input_masks_gen: (0..num_parties)
                .map(|_| FakeShareGenerator::new(auth_key, rng.gen()))
                .collect(),
        }
    }

    /// Plaintext of the global MAC key. Only a fake dealer can know this.
    pub fn mac_key(&self) -> T {
        self.auth_key.plain_value
    }
}

impl<T: MpcField> MpcContext for FakeDataSupplier<T> {
    fn num_parties(&self) -> usize {
        self.auth_key.num_parties
    }

    fn party_id(&self) -> usize {
        self.auth_key.party_id
    }
}

impl<T: MpcField> DataSupplier<T> for FakeDataSupplier<T> {
    fn next_input_mask(&mut self, owner: usize) -> Result<InputMask<T>, MpcError> {
        let num_parties = self.auth_key.num_parties;
        let generator = owner
            .checked_sub(1)
            .and_then(|index| self.input_masks_gen.get_mut(index))
            .ok_or(ConfigError::PartyIdOutOfRange {
                party_id: owner,
                num_parties,
            })?;
        let (mask, plain) = generator.gen_random_authenticated_share();
        Ok(InputMask {
            real_value: (owner == self.auth_key.party_id).then(|| plain),
            mask,
        })
    }

    fn next_triple_shares(&mut self, count: usize) -> Result<Vec<BeaverTriple<T>>, MpcError> {
        Ok((0..count)
            .map(|_| {
                let (a, a_plain) = self.beaver_triple_gen.gen_random_authenticated_share();
                let (b, b_plain) = self.beaver_triple_gen.gen_random_authenticated_share();
                let c = self
                    .beaver_triple_gen
                    .gen_authenticated_share(a_plain * b_plain);
                BeaverTriple { a, b, c }
            })
            .collect())
    }

    fn mac_key_share(&self) -> T {
        self.auth_key.share_value
    }
}

/// Authentication key in plain and its share.
#[derive(Copy, Clone)]
struct FakeAuthKey<T> {
    num_parties: usize,
    party_id: usize,
    share_value: T,
    plain_value: T,
}

impl<T: MpcField> FakeAuthKey<T> {
    /// Generate fake authentication key and its share.
    fn random(rng: &mut ChaCha20Rng, party_id: usize, num_parties: usize) -> Self {
        let plain_value = T::random(rng);
        let share_value = gen_raw_share(rng, party_id, num_parties, plain_value);
        Self {
            num_parties,
            party_id,
            share_value,
            plain_value,
        }
    }
}

/// Insecure generator of authenticated shares.
struct FakeShareGenerator<T> {
    auth_key: FakeAuthKey<T>,
    rng: ChaCha20Rng,
}

impl<T: MpcField> FakeShareGenerator<T> {
    /// Create new generator.
    fn new(auth_key: FakeAuthKey<T>, seed: [u8; 32]) -> Self {
        Self {
            rng: ChaCha20Rng::from_seed(seed),
            auth_key,
        }
    }

    /// Generate local unauthenticated share of specified value.
    fn gen_raw_share(&mut self, value: T) -> T {
        gen_raw_share(
            &mut self.rng,
            self.auth_key.party_id,
            self.auth_key.num_parties,
            value,
        )
    }

    /// Generate local authenticated share of specified value.
    fn gen_authenticated_share(&mut self, value: T) -> AuthShare<T> {
        AuthShare {
            share: self.gen_raw_share(value),
            mac: self.gen_raw_share(value * self.auth_key.plain_value),
        }
    }

    /// Generate random value and its local authenticated share.
    fn gen_random_authenticated_share(&mut self) -> (AuthShare<T>, T) {
        let value = T::random(&mut self.rng);
        (self.gen_authenticated_share(value), value)
    }
}

/// Generate local unauthenticated share of specified value.
/// Shares of parties 1..=n form an arithmetic progression, party 1 absorbs the difference.
fn gen_raw_share<T: MpcField>(
    rng: &mut ChaCha20Rng,
    party_id: usize,
    num_parties: usize,
    value: T,
) -> T {
    let start = T::random(rng);
    let step = T::random(rng);
    let share = start + step * T::from_u64(party_id as u64);
    let n = num_parties as u64;
    let sum = start * T::from_u64(n) + step * T::from_u64(n * (n + 1) / 2);
    if party_id == 1 {
        share + value - sum
    } else {
        share
    }
}
