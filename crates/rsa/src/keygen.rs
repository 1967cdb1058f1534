//! RSA key and blinding-prime generation.
//!
//! Primality is probabilistic: trial division by small primes, then 50
//! Miller-Rabin rounds with random bases. A freshly generated key must pass
//! 100 random encrypt/decrypt round trips before it is returned.

use crate::error::KeygenError;
use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Miller-Rabin rounds per primality check.
pub const MILLER_RABIN_ROUNDS: usize = 50;

/// Encrypt/decrypt round trips a fresh key must survive.
pub const SELF_CHECK_ROUNDS: usize = 100;

/// Smallest supported modulus size.
const MIN_MODULUS_BITS: u64 = 16;

const SMALL_PRIMES: [u32; 12] = [3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41];

/// An RSA key: primes, modulus and exponent pair.
///
/// Held immutably by the caller; signing copies the components into the
/// coprocessor register bank by value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(with = "crate::serde_dec")]
    pub p: BigUint,
    #[serde(with = "crate::serde_dec")]
    pub q: BigUint,
    #[serde(with = "crate::serde_dec")]
    pub n: BigUint,
    #[serde(with = "crate::serde_dec")]
    pub e: BigUint,
    #[serde(with = "crate::serde_dec")]
    pub d: BigUint,
}

impl KeyPair {
    /// Generate a fresh key with a `bits`-bit modulus.
    ///
    /// # Errors
    /// `KeyTooSmall` for undersized requests; `SelfCheckFailed` if the
    /// round-trip self-check fails (which indicates a defect here, not bad
    /// luck).
    pub fn generate<R: Rng>(bits: u64, rng: &mut R) -> Result<KeyPair, KeygenError> {
        if bits < MIN_MODULUS_BITS {
            return Err(KeygenError::KeyTooSmall {
                bits,
                min: MIN_MODULUS_BITS,
            });
        }

        let p = generate_prime(bits / 2, rng);
        let q = loop {
            let candidate = generate_prime(bits / 2, rng);
            if candidate != p {
                break candidate;
            }
        };
        debug!(bits, "generated primes p, q");

        let n = &p * &q;
        let phi = (&p - 1u32) * (&q - 1u32);

        // Random public exponent coprime with phi, and its inverse.
        let three = BigUint::from(3u32);
        let (e, d) = loop {
            let e = rng.gen_biguint_range(&three, &phi);
            if e.gcd(&phi).is_one() {
                if let Some(d) = e.modinv(&phi) {
                    break (e, d);
                }
            }
        };
        debug!("selected exponent pair");

        let key = KeyPair { p, q, n, e, d };
        key.self_check(rng)?;
        debug!(rounds = SELF_CHECK_ROUNDS, "key passed round-trip checks");
        Ok(key)
    }

    /// Bit length of the modulus.
    pub fn modulus_bits(&self) -> u64 {
        self.n.bits()
    }

    /// Verify that random messages survive encrypt-then-decrypt.
    fn self_check<R: Rng>(&self, rng: &mut R) -> Result<(), KeygenError> {
        let two = BigUint::from(2u32);
        for _ in 0..SELF_CHECK_ROUNDS {
            let m = rng.gen_biguint_range(&two, &self.n);
            let c = m.modpow(&self.e, &self.n);
            if c.modpow(&self.d, &self.n) != m {
                return Err(KeygenError::SelfCheckFailed {
                    rounds: SELF_CHECK_ROUNDS,
                });
            }
        }
        Ok(())
    }
}

/// Generate a random probable prime of exactly `bits` bits.
pub fn generate_prime<R: Rng>(bits: u64, rng: &mut R) -> BigUint {
    loop {
        let mut candidate = rng.gen_biguint(bits);
        // Force the width and oddness.
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate, MILLER_RABIN_ROUNDS, rng) {
            return candidate;
        }
    }
}

/// Generate the auxiliary blinding prime for the Shamir signing mode.
pub fn generate_blinding_prime<R: Rng>(bits: u64, rng: &mut R) -> BigUint {
    generate_prime(bits, rng)
}

/// Miller-Rabin primality test with `rounds` random bases.
pub fn is_probable_prime<R: Rng>(n: &BigUint, rounds: usize, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    if n == &two {
        return true;
    }
    if n.is_even() {
        return false;
    }
    for p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if (n % &p).is_zero() {
            return n == &p;
        }
    }

    // Write n-1 = d * 2^s with d odd.
    let n_minus_one = n - 1u32;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1;
        s += 1;
    }

    'rounds: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'rounds;
            }
        }
        return false;
    }
    true
}
