use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::WireError;

/// Element of the public modulus the computation runs over, either a prime field or a 2^k ring.
/// The stored representative is always canonical.
pub trait MpcField:
    Copy
    + Clone
    + Debug
    + PartialEq
    + Eq
    + Send
    + Sync
    + Zeroize
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
{
    /// Width of the fixed-size big-endian wire encoding.
    const BYTE_LEN: usize;

    /// Bit length the arithmetic is carried out in.
    const OPERATIONAL_BITS: u32;

    /// Bit length of the values the computation is meant to carry.
    const EFFECTIVE_BITS: u32;

    fn zero() -> Self;

    fn one() -> Self;

    fn from_u64(value: u64) -> Self;

    /// Uniformly random element.
    fn random<R: RngCore>(rng: &mut R) -> Self;

    /// Fixed-width big-endian encoding, always `BYTE_LEN` bytes long.
    fn to_be_bytes(&self) -> Vec<u8>;

    /// Decode a fixed-width big-endian encoding produced by `to_be_bytes`.
    fn from_be_bytes(bytes: &[u8]) -> Result<Self, WireError>;

    /// Reduce an opened value to the effective bit length.
    fn into_effective(self) -> Self {
        self
    }
}

/// Concatenate fixed-width encodings of all elements.
pub fn encode_elements<T: MpcField>(elements: &[T]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(elements.len() * T::BYTE_LEN);
    for element in elements {
        bytes.extend_from_slice(&element.to_be_bytes());
    }
    bytes
}

/// Split a payload into exactly `count` fixed-width elements.
pub fn decode_elements<T: MpcField>(bytes: &[u8], count: usize) -> Result<Vec<T>, WireError> {
    let expected = count * T::BYTE_LEN;
    if bytes.len() != expected {
        return Err(WireError::Length {
            expected,
            actual: bytes.len(),
        });
    }
    bytes.chunks_exact(T::BYTE_LEN).map(T::from_be_bytes).collect()
}

fn check_length(bytes: &[u8], expected: usize) -> Result<(), WireError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(WireError::Length {
            expected,
            actual: bytes.len(),
        })
    }
}

macro_rules! impl_prime_mpc_field {
    ($field:ident, $repr:ident, $bytes:expr, $effective:expr) => {
        impl MpcField for $field {
            const BYTE_LEN: usize = $bytes;
            const OPERATIONAL_BITS: u32 = $bytes * 8;
            const EFFECTIVE_BITS: u32 = $effective;

            fn zero() -> Self {
                <Self as ff::Field>::zero()
            }

            fn one() -> Self {
                <Self as ff::Field>::one()
            }

            fn from_u64(value: u64) -> Self {
                Self::from(value)
            }

            fn random<R: RngCore>(rng: &mut R) -> Self {
                <Self as ff::Field>::random(rng)
            }

            fn to_be_bytes(&self) -> Vec<u8> {
                let mut bytes = ff::PrimeField::to_repr(self).0;
                bytes.reverse();
                bytes.to_vec()
            }

            fn from_be_bytes(bytes: &[u8]) -> Result<Self, WireError> {
                check_length(bytes, $bytes)?;
                let mut repr = [0u8; $bytes];
                repr.copy_from_slice(bytes);
                repr.reverse();
                Option::from(<Self as ff::PrimeField>::from_repr($repr(repr)))
                    .ok_or(WireError::NonCanonical)
            }
        }
    };
}

mod mersenne_61 {
    use ff::PrimeField;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use zeroize::Zeroize;

    /// Finite field mod 2^61-1.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "2305843009213693951"]
    #[PrimeFieldGenerator = "37"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Mersenne61([u64; 1]);

    impl Zeroize for Mersenne61 {
        fn zeroize(&mut self) {
            self.0.zeroize();
        }
    }

    impl Serialize for Mersenne61 {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            self.to_repr().0.serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Mersenne61 {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let repr = Mersenne61Repr(Deserialize::deserialize(deserializer)?);
            Self::from_repr_vartime(repr)
                .ok_or_else(|| serde::de::Error::custom("Invalid field element"))
        }
    }
}

mod mersenne_127 {
    use ff::PrimeField;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use zeroize::Zeroize;

    /// Finite field mod 2^127-1.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "170141183460469231731687303715884105727"]
    #[PrimeFieldGenerator = "43"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Mersenne127([u64; 2]);

    impl Zeroize for Mersenne127 {
        fn zeroize(&mut self) {
            self.0.zeroize();
        }
    }

    impl Serialize for Mersenne127 {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            self.to_repr().0.serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Mersenne127 {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let repr = Mersenne127Repr(Deserialize::deserialize(deserializer)?);
            Self::from_repr_vartime(repr)
                .ok_or_else(|| serde::de::Error::custom("Invalid field element"))
        }
    }
}

pub use mersenne_127::{Mersenne127, Mersenne127Repr};
pub use mersenne_61::{Mersenne61, Mersenne61Repr};

impl_prime_mpc_field!(Mersenne61, Mersenne61Repr, 8, 61);
impl_prime_mpc_field!(Mersenne127, Mersenne127Repr, 16, 127);

/// Ring of integers mod 2^128 carrying 64-bit effective values.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ring128(u128);

impl Ring128 {
    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn value(self) -> u128 {
        self.0
    }
}

impl Zeroize for Ring128 {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Add for Ring128 {
    type Output = Ring128;
    fn add(self, rhs: Self) -> Self::Output {
        Ring128(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Ring128 {
    type Output = Ring128;
    fn sub(self, rhs: Self) -> Self::Output {
        Ring128(self.0.wrapping_sub(rhs.0))
    }
}

impl Mul for Ring128 {
    type Output = Ring128;
    fn mul(self, rhs: Self) -> Self::Output {
        Ring128(self.0.wrapping_mul(rhs.0))
    }
}

impl Neg for Ring128 {
    type Output = Ring128;
    fn neg(self) -> Self::Output {
        Ring128(self.0.wrapping_neg())
    }
}

impl MpcField for Ring128 {
    const BYTE_LEN: usize = 16;
    const OPERATIONAL_BITS: u32 = 128;
    const EFFECTIVE_BITS: u32 = 64;

    fn zero() -> Self {
        Ring128(0)
    }

    fn one() -> Self {
        Ring128(1)
    }

    fn from_u64(value: u64) -> Self {
        Ring128(value as u128)
    }

    fn random<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Ring128(u128::from_be_bytes(bytes))
    }

    fn to_be_bytes(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn from_be_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        check_length(bytes, Self::BYTE_LEN)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(bytes);
        Ok(Ring128(u128::from_be_bytes(raw)))
    }

    fn into_effective(self) -> Self {
        Ring128(self.0 & u64::MAX as u128)
    }
}
