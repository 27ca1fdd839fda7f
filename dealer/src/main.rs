use std::{error::Error, str::FromStr};

use argh::FromArgs;
use mpc::{
    fields::{Mersenne127, Mersenne61, Ring128},
    spdz::{AuthShare, BeaverTriple, PrecomputedData},
    MpcField,
};
use rand::{prelude::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Field type for preprocessing.
enum FieldType {
    Mersenne61,
    Mersenne127,
    Ring128,
}

impl FromStr for FieldType {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "61" => Ok(FieldType::Mersenne61),
            "127" => Ok(FieldType::Mersenne127),
            "ring128" => Ok(FieldType::Ring128),
            _ => Err("Unsupported field type. Available options: 61, 127, ring128"),
        }
    }
}

#[derive(FromArgs)]
/// SPDZ offline preprocessing tool.
struct Options {
    /// number of parties participating in protocol
    #[argh(option)]
    parties: usize,

    /// output path pattern ('#' is replaced with party ID, starting from 1)
    #[argh(option)]
    output: String,

    /// target field
    #[argh(option, default = "FieldType::Mersenne127")]
    field: FieldType,

    /// number of beaver triples to be generated
    #[argh(option)]
    beaver_triples: usize,

    /// number of input masks to be generated for each party
    #[argh(option)]
    input_masks: usize,

    /// seed for reproducible output, drawn from the OS if absent
    #[argh(option)]
    seed: Option<u64>,
}

/// Generator of random authenticated sharings.
struct ShareGenerator<T, R> {
    num_parties: usize,
    mac_key: T,
    rng: R,
}

impl<T, R> ShareGenerator<T, R>
where
    T: MpcField,
    R: Rng,
{
    /// Generate random sharing of given value.
    fn share(&mut self, value: T) -> Vec<AuthShare<T>> {
        let mut shares: Vec<_> = (1..self.num_parties)
            .map(|_| AuthShare::new(T::random(&mut self.rng), T::random(&mut self.rng)))
            .collect();
        let sum = shares.iter().fold(AuthShare::zero(), |acc, &x| acc + x);
        shares.push(AuthShare::new(
            value - sum.share(),
            value * self.mac_key - sum.mac(),
        ));
        shares
    }

    /// Generate random sharing of random value.
    fn share_random(&mut self) -> (Vec<AuthShare<T>>, T) {
        let value = T::random(&mut self.rng);
        (self.share(value), value)
    }

    /// Generate beaver triples and add them to precomputed data table.
    fn fill_beaver_triples(&mut self, data: &mut [PrecomputedData<T>], count: usize) {
        for _ in 0..count {
            let (shares_a, a) = self.share_random();
            let (shares_b, b) = self.share_random();
            let shares_ab = self.share(a * b);
            for (i, party_data) in data.iter_mut().enumerate() {
                party_data.triples.push(BeaverTriple {
                    a: shares_a[i],
                    b: shares_b[i],
                    c: shares_ab[i],
                });
            }
        }
    }

    /// Generate input masks for given party (1-indexed) and add them to precomputed data table.
    fn fill_input_masks_for(&mut self, data: &mut [PrecomputedData<T>], owner: usize, count: usize) {
        for _ in 0..count {
            let (shares, plain) = self.share_random();
            for (i, party_data) in data.iter_mut().enumerate() {
                party_data.input_masks[owner - 1].push(shares[i]);
            }
            data[owner - 1].input_mask_values.push(plain);
        }
    }
}

/// Generate MAC key and sharings.
fn generate<T, R>(mut rng: R, options: &Options) -> Vec<PrecomputedData<T>>
where
    T: MpcField,
    R: Rng,
{
    let mut data: Vec<PrecomputedData<T>> = (1..=options.parties)
        .map(|party_id| PrecomputedData {
            num_parties: options.parties,
            party_id,
            mac_key_share: T::random(&mut rng),
            triples: Vec::with_capacity(options.beaver_triples),
            input_masks: (0..options.parties).map(|_| Vec::new()).collect(),
            input_mask_values: Vec::with_capacity(options.input_masks),
        })
        .collect();

    let mac_key = data.iter().fold(T::zero(), |acc, x| acc + x.mac_key_share);

    let mut share_gen = ShareGenerator {
        num_parties: options.parties,
        mac_key,
        rng,
    };

    info!(count = options.beaver_triples, "Generating beaver triples");
    share_gen.fill_beaver_triples(&mut data, options.beaver_triples);

    info!(count = options.input_masks, "Generating input masks per party");
    for owner in 1..=options.parties {
        share_gen.fill_input_masks_for(&mut data, owner, options.input_masks);
    }

    data
}

fn run<T>(options: Options) -> Result<(), Box<dyn Error>>
where
    T: MpcField + Serialize + for<'a> Deserialize<'a>,
{
    if options.parties < 2 {
        return Err("at least two parties are required".into());
    }
    info!(parties = options.parties, "Generating data");
    let rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let data = generate::<T, _>(rng, &options);

    for party_data in data {
        let output_path = options
            .output
            .replace('#', &format!("{}", party_data.party_id));
        info!(party_id = party_data.party_id, path = %output_path, "Saving");
        party_data.save_file(output_path)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let options: Options = argh::from_env();
    match options.field {
        FieldType::Mersenne61 => run::<Mersenne61>(options),
        FieldType::Mersenne127 => run::<Mersenne127>(options),
        FieldType::Ring128 => run::<Ring128>(options),
    }
}
