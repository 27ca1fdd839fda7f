use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::fields::MpcField;

/// One party's additive share of a secret value together with its share of `alpha * value`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthShare<T> {
    pub(crate) share: T,
    pub(crate) mac: T,
}

impl<T: MpcField> AuthShare<T> {
    pub fn new(share: T, mac: T) -> Self {
        Self { share, mac }
    }

    pub fn zero() -> Self {
        Self::new(T::zero(), T::zero())
    }

    /// Sharing of a public constant: party 1 holds the value, every party holds its MAC share.
    pub fn from_public(value: T, mac_key_share: T, party_id: usize) -> Self {
        Self {
            share: if party_id == 1 { value } else { T::zero() },
            mac: mac_key_share * value,
        }
    }

    /// Add a public constant.
    pub fn add_public(self, value: T, mac_key_share: T, party_id: usize) -> Self {
        self + Self::from_public(value, mac_key_share, party_id)
    }

    /// Subtract a public constant.
    pub fn sub_public(self, value: T, mac_key_share: T, party_id: usize) -> Self {
        self - Self::from_public(value, mac_key_share, party_id)
    }

    pub fn share(&self) -> T {
        self.share
    }

    pub fn mac(&self) -> T {
        self.mac
    }
}

impl<T: MpcField> Add for AuthShare<T> {
    type Output = AuthShare<T>;
    fn add(self, rhs: Self) -> Self::Output {
        AuthShare {
            share: self.share + rhs.share,
            mac: self.mac + rhs.mac,
        }
    }
}

impl<T: MpcField> Sub for AuthShare<T> {
    type Output = AuthShare<T>;
    fn sub(self, rhs: Self) -> Self::Output {
        AuthShare {
            share: self.share - rhs.share,
            mac: self.mac - rhs.mac,
        }
    }
}

impl<T: MpcField> Neg for AuthShare<T> {
    type Output = AuthShare<T>;
    fn neg(self) -> Self::Output {
        AuthShare {
            share: -self.share,
            mac: -self.mac,
        }
    }
}

impl<T: MpcField> Mul<T> for AuthShare<T> {
    type Output = AuthShare<T>;
    fn mul(self, rhs: T) -> Self::Output {
        AuthShare {
            share: self.share * rhs,
            mac: self.mac * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::fields::{Mersenne127, Ring128};
    use crate::testing::{open_shares, shares_of, AuthKey};

    use super::*;

    fn check_linearity<T: MpcField>(num_parties: usize) {
        let key = AuthKey::<T>::random(num_parties, 3);
        let x = T::from_u64(1234567);
        let y = T::from_u64(1110);
        let k = T::from_u64(42);
        let xs = shares_of(&key, x, 4);
        let ys = shares_of(&key, y, 5);

        let sums: Vec<_> = xs.iter().zip(&ys).map(|(&a, &b)| a + b).collect();
        assert_eq!(open_shares(&key, &sums), Some(x + y));

        let diffs: Vec<_> = xs.iter().zip(&ys).map(|(&a, &b)| a - b).collect();
        assert_eq!(open_shares(&key, &diffs), Some(x - y));

        let scaled: Vec<_> = xs.iter().map(|&a| a * k).collect();
        assert_eq!(open_shares(&key, &scaled), Some(x * k));

        let negated: Vec<_> = xs.iter().map(|&a| -a).collect();
        assert_eq!(open_shares(&key, &negated), Some(-x));

        let shifted: Vec<_> = xs
            .iter()
            .enumerate()
            .map(|(i, &a)| a.add_public(k, key.shares[i], i + 1))
            .collect();
        assert_eq!(open_shares(&key, &shifted), Some(x + k));

        let lowered: Vec<_> = xs
            .iter()
            .enumerate()
            .map(|(i, &a)| a.sub_public(k, key.shares[i], i + 1))
            .collect();
        assert_eq!(open_shares(&key, &lowered), Some(x - k));
    }

    #[test]
    fn test_linearity_prime_field() {
        check_linearity::<Mersenne127>(2);
        check_linearity::<Mersenne127>(3);
    }

    #[test]
    fn test_linearity_ring() {
        check_linearity::<Ring128>(2);
        check_linearity::<Ring128>(4);
    }

    #[test]
    fn test_subtraction_updates_mac() {
        let key = AuthKey::<Mersenne127>::random(2, 9);
        let xs = shares_of(&key, Mersenne127::from_u64(10), 1);
        let ys = shares_of(&key, Mersenne127::from_u64(3), 2);
        let diffs: Vec<_> = xs.iter().zip(&ys).map(|(&a, &b)| a - b).collect();
        let mac_sum = diffs.iter().fold(Mersenne127::zero(), |acc, s| acc + s.mac());
        assert_eq!(mac_sum, key.plain * Mersenne127::from_u64(7));
    }

    #[test]
    fn test_tampered_share_breaks_mac() {
        let key = AuthKey::<Mersenne127>::random(3, 11);
        let mut xs = shares_of(&key, Mersenne127::from_u64(99), 6);
        xs[1].share = xs[1].share + Mersenne127::one();
        assert_eq!(open_shares(&key, &xs), None);
    }
}
