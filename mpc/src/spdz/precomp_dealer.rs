use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, MpcError};
use crate::fields::MpcField;
use crate::MpcContext;

use super::{AuthShare, BeaverTriple, DataSupplier, InputMask};

/// Preprocessed material of one party, as produced by the offline dealer.
/// Material is consumed from the back of every list.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PrecomputedData<T> {
    pub num_parties: usize,
    /// 1-indexed id of the party this data was dealt for.
    pub party_id: usize,
    pub mac_key_share: T,
    pub triples: Vec<BeaverTriple<T>>,
    /// Input masks of every party, the list at index `i` belonging to party `i + 1`.
    pub input_masks: Vec<Vec<AuthShare<T>>>,
    /// Plaintexts of this party's own input masks, parallel to its list in `input_masks`.
    pub input_mask_values: Vec<T>,
}

impl<T> PrecomputedData<T>
where
    T: Serialize + for<'a> Deserialize<'a>,
{
    /// Load precomputed data from file.
    pub fn load_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        bincode::deserialize_from(reader).map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }

    /// Save precomputed data to file.
    pub fn save_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }
}

/// Data supplier serving material dealt in advance.
pub struct PrecomputedDataSupplier<T> {
    data: PrecomputedData<T>,
}

impl<T: MpcField> PrecomputedDataSupplier<T> {
    /// Create new supplier given precomputed data.
    pub fn new(data: PrecomputedData<T>) -> Result<Self, ConfigError> {
        if data.num_parties < 2 {
            return Err(ConfigError::TooFewParties(data.num_parties));
        }
        if data.party_id == 0 || data.party_id > data.num_parties {
            return Err(ConfigError::PartyIdOutOfRange {
                party_id: data.party_id,
                num_parties: data.num_parties,
            });
        }
        if data.input_masks.len() != data.num_parties {
            return Err(ConfigError::InconsistentPreprocessing(format!(
                "input masks for {} parties, expected {}",
                data.input_masks.len(),
                data.num_parties
            )));
        }
        let own_masks = data.input_masks[data.party_id - 1].len();
        if own_masks != data.input_mask_values.len() {
            return Err(ConfigError::InconsistentPreprocessing(format!(
                "{own_masks} own input masks but {} plaintexts",
                data.input_mask_values.len()
            )));
        }
        Ok(Self { data })
    }

    /// Number of Beaver triples left.
    pub fn remaining_triples(&self) -> usize {
        self.data.triples.len()
    }

    /// Number of input masks left for party `owner`.
    pub fn remaining_input_masks(&self, owner: usize) -> usize {
        owner
            .checked_sub(1)
            .and_then(|index| self.data.input_masks.get(index))
            .map_or(0, Vec::len)
    }
}

impl<T> PrecomputedDataSupplier<T>
where
    T: MpcField + Serialize + for<'a> Deserialize<'a>,
{
    /// Create new supplier from file with precomputed data.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MpcError> {
        let data = PrecomputedData::load_file(path.as_ref()).map_err(|err| {
            MpcError::PreprocessingExhausted(format!(
                "cannot load {}: {err}",
                path.as_ref().display()
            ))
        })?;
        debug!(
            party_id = data.party_id,
            triples = data.triples.len(),
            "Loaded precomputed data"
        );
        Ok(Self::new(data)?)
    }
}

impl<T: MpcField> MpcContext for PrecomputedDataSupplier<T> {
    fn num_parties(&self) -> usize {
        self.data.num_parties
    }

    fn party_id(&self) -> usize {
        self.data.party_id
    }
}

impl<T: MpcField> DataSupplier<T> for PrecomputedDataSupplier<T> {
    fn next_input_mask(&mut self, owner: usize) -> Result<InputMask<T>, MpcError> {
        let num_parties = self.data.num_parties;
        let masks = owner
            .checked_sub(1)
            .and_then(|index| self.data.input_masks.get_mut(index))
            .ok_or(ConfigError::PartyIdOutOfRange {
                party_id: owner,
                num_parties,
            })?;
        let mask = masks.pop().ok_or_else(|| {
            MpcError::PreprocessingExhausted(format!("no input masks left for party {owner}"))
        })?;
        let real_value = if owner == self.data.party_id {
            Some(self.data.input_mask_values.pop().ok_or_else(|| {
                MpcError::PreprocessingExhausted("no input mask plaintexts left".to_string())
            })?)
        } else {
            None
        };
        Ok(InputMask { real_value, mask })
    }

    fn next_triple_shares(&mut self, count: usize) -> Result<Vec<BeaverTriple<T>>, MpcError> {
        let available = self.data.triples.len();
        if available < count {
            return Err(MpcError::PreprocessingExhausted(format!(
                "requested {count} triples, {available} left"
            )));
        }
        let mut triples = self.data.triples.split_off(available - count);
        triples.reverse();
        Ok(triples)
    }

    fn mac_key_share(&self) -> T {
        self.data.mac_key_share
    }
}

#[cfg(test)]
mod tests {
    use crate::fields::Mersenne61;
    use crate::spdz::FakeDataSupplier;

    use super::*;

    type Fp = Mersenne61;

    /// Deal `num_triples` triples and `num_masks` masks per party out of fake suppliers.
    fn deal(num_parties: usize, num_triples: usize, num_masks: usize) -> Vec<PrecomputedData<Fp>> {
        (1..=num_parties)
            .map(|party_id| {
                let mut fake = FakeDataSupplier::<Fp>::new(num_parties, party_id, 5);
                let triples = fake.next_triple_shares(num_triples).unwrap();
                let mut input_masks = vec![Vec::new(); num_parties];
                let mut input_mask_values = Vec::new();
                for _ in 0..num_masks {
                    for owner in 1..=num_parties {
                        let mask = fake.next_input_mask(owner).unwrap();
                        input_masks[owner - 1].push(mask.mask);
                        input_mask_values.extend(mask.real_value);
                    }
                }
                PrecomputedData {
                    num_parties,
                    party_id,
                    mac_key_share: fake.mac_key_share(),
                    triples,
                    input_masks,
                    input_mask_values,
                }
            })
            .collect()
    }

    fn sum(values: impl IntoIterator<Item = Fp>) -> Fp {
        values.into_iter().fold(Fp::zero(), |acc, x| acc + x)
    }

    #[test]
    fn test_serves_consistent_triples() {
        let mut suppliers: Vec<_> = deal(3, 4, 0)
            .into_iter()
            .map(|data| PrecomputedDataSupplier::new(data).unwrap())
            .collect();
        let alpha = sum(suppliers.iter().map(|s| s.mac_key_share()));
        let triples: Vec<_> = suppliers
            .iter_mut()
            .map(|s| s.next_triple_shares(3).unwrap())
            .collect();
        for k in 0..3 {
            let a = sum(triples.iter().map(|t| t[k].a.share()));
            let b = sum(triples.iter().map(|t| t[k].b.share()));
            let c = sum(triples.iter().map(|t| t[k].c.share()));
            assert_eq!(a * b, c);
            assert_eq!(sum(triples.iter().map(|t| t[k].c.mac())), alpha * c);
        }
        assert_eq!(suppliers[0].remaining_triples(), 1);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let data = deal(2, 2, 1).remove(0);
        let mut supplier = PrecomputedDataSupplier::new(data).unwrap();
        assert!(matches!(
            supplier.next_triple_shares(3),
            Err(MpcError::PreprocessingExhausted(_))
        ));
        assert_eq!(supplier.remaining_triples(), 2);

        let own = supplier.next_input_mask(1).unwrap();
        assert!(own.real_value.is_some());
        assert!(supplier.next_input_mask(2).unwrap().real_value.is_none());
        assert!(matches!(
            supplier.next_input_mask(1),
            Err(MpcError::PreprocessingExhausted(_))
        ));
        assert_eq!(supplier.remaining_input_masks(2), 0);
    }

    #[test]
    fn test_file_round_trip() {
        let data = deal(2, 1, 1).remove(1);
        let path = std::env::temp_dir().join(format!("mpc-precomp-{}.bin", std::process::id()));
        data.save_file(&path).unwrap();
        let mut supplier = PrecomputedDataSupplier::<Fp>::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(supplier.party_id(), 2);
        assert_eq!(supplier.mac_key_share(), data.mac_key_share);
        assert_eq!(supplier.next_triple_shares(1).unwrap(), data.triples);
    }

    #[test]
    fn test_inconsistent_data_is_rejected() {
        let mut data = deal(2, 0, 0).remove(0);
        data.input_masks.pop();
        assert!(matches!(
            PrecomputedDataSupplier::new(data),
            Err(ConfigError::InconsistentPreprocessing(_))
        ));

        let mut data = deal(2, 0, 2).remove(1);
        data.input_mask_values.pop();
        assert!(matches!(
            PrecomputedDataSupplier::new(data),
            Err(ConfigError::InconsistentPreprocessing(_))
        ));
    }
}
