//! sigfault-attack: the Boneh-DeMillo-Lipton fault attack against CRT
//! signatures.
//!
//! A signature corrupted in exactly one CRT branch is still correct modulo
//! the other prime, so the difference between a clean and a faulty signature
//! of the same message shares exactly one prime factor with the modulus:
//! `gcd(c - c', N)` factors N. The one-signature variant needs no clean
//! reference: `c'^e` reproduces `m` modulo the untouched prime only, so
//! `gcd(m - c'^e, N)` works from a single faulty signature.
//!
//! The harness drives the signer with attacker-chosen fault cycles, observes
//! the possibly-corrupted outputs, and reconstructs the private exponent
//! from the recovered factors. It does no validation of its own.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use serde::{Deserialize, Serialize};
use sigfault_copro::FaultSpec;
use sigfault_rsa::{serde_dec, SignError, Signer};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum AttackError {
    #[error("no fault cycle in [{lo}, {hi}) produced a usable signature")]
    NoFactorFound { lo: u64, hi: u64 },

    #[error(transparent)]
    Sign(#[from] SignError),
}

/// A successful factorization of the signer's modulus.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttackOutcome {
    #[serde(with = "serde_dec")]
    pub p: BigUint,
    #[serde(with = "serde_dec")]
    pub q: BigUint,
    /// Reconstructed private exponent e⁻¹ mod (p-1)(q-1).
    #[serde(with = "serde_dec")]
    pub d: BigUint,
    /// The fault cycle that produced the exploitable signature.
    pub fault_cycle: u64,
    /// Faulty signatures requested before success.
    pub attempts: u64,
}

/// Factor `n` from a clean/faulty signature pair of the same message.
pub fn factor_from_pair(
    n: &BigUint,
    clean: &BigUint,
    faulty: &BigUint,
) -> Option<(BigUint, BigUint)> {
    let diff = if clean >= faulty {
        clean - faulty
    } else {
        faulty - clean
    };
    nontrivial_factor(n, &diff)
}

/// Factor `n` from a single faulty signature of a known message.
pub fn factor_from_faulty(
    n: &BigUint,
    e: &BigUint,
    m: &BigUint,
    faulty: &BigUint,
) -> Option<(BigUint, BigUint)> {
    let v = faulty.modpow(e, n);
    let m = m % n;
    let diff = if m >= v { m - v } else { v - m };
    nontrivial_factor(n, &diff)
}

/// Reconstruct the private exponent from the recovered factors.
pub fn recover_private_exponent(p: &BigUint, q: &BigUint, e: &BigUint) -> Option<BigUint> {
    let phi = (p - 1u32) * (q - 1u32);
    e.modinv(&phi)
}

fn nontrivial_factor(n: &BigUint, diff: &BigUint) -> Option<(BigUint, BigUint)> {
    let g = diff.gcd(n);
    if g.is_one() || &g == n {
        return None;
    }
    let other = n / &g;
    Some((g, other))
}

/// Run the attack end to end against a signer session.
///
/// Signs the message cleanly once, then requests faulty signatures over the
/// second half of the clean cycle count until one factors the modulus.
/// Detected faults (the Shamir countermeasure) are counted as failed
/// attempts and skipped.
///
/// # Errors
/// `NoFactorFound` when the whole scan range is exhausted — the expected
/// outcome against the Shamir mode.
pub fn run_bdl_attack(signer: &mut Signer, m: &BigUint) -> Result<AttackOutcome, AttackError> {
    let clean = signer.sign(m, FaultSpec::default())?;
    let n = signer.key().n.clone();
    let e = signer.key().e.clone();

    let (lo, hi) = (clean.cycles / 2, clean.cycles);
    info!(lo, hi, "scanning fault cycles");

    let mut attempts = 0;
    for cycle in lo..hi {
        attempts += 1;
        let faulty = match signer.sign(m, FaultSpec::at_cycle(cycle)) {
            Ok(sig) => sig,
            Err(err) if err.is_fault_detected() => {
                debug!(cycle, "fault detected by the signer, skipping");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        if let Some((p, q)) = factor_from_pair(&n, &clean.value, &faulty.value) {
            if let Some(d) = recover_private_exponent(&p, &q, &e) {
                info!(cycle, attempts, "factored the modulus");
                return Ok(AttackOutcome {
                    p,
                    q,
                    d,
                    fault_cycle: cycle,
                    attempts,
                });
            }
        }
    }

    Err(AttackError::NoFactorFound { lo, hi })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sigfault_copro::FaultBranch;
    use sigfault_rsa::{KeyPair, SignMode, SignerConfig};

    fn test_key(seed: u64) -> KeyPair {
        let mut rng = StdRng::seed_from_u64(seed);
        KeyPair::generate(32, &mut rng).expect("keygen")
    }

    fn direct_signer(key: KeyPair, seed: u64) -> Signer {
        let config = SignerConfig {
            mode: SignMode::CrtDirect,
            bit_width: 64,
            ..Default::default()
        };
        Signer::seeded(key, config, seed).expect("signer")
    }

    #[test]
    fn test_factor_from_pair_on_known_factorization() {
        // n = 61 * 53; a difference divisible by 61 only.
        let n = BigUint::from(3233u32);
        let clean = BigUint::from(2790u32);
        let faulty = BigUint::from(2790u32 - 61 * 3);
        let (p, q) = factor_from_pair(&n, &clean, &faulty).unwrap();
        assert_eq!(&p * &q, n);
        assert!(p == BigUint::from(61u32) || q == BigUint::from(61u32));
    }

    #[test]
    fn test_factor_from_pair_rejects_trivial_gcds() {
        let n = BigUint::from(3233u32);
        let c = BigUint::from(2790u32);
        assert!(factor_from_pair(&n, &c, &c).is_none()); // diff = 0
        assert!(factor_from_pair(&n, &c, &(&c - 1u32)).is_none()); // diff = 1
    }

    #[test]
    fn test_single_faulty_signature_factors_modulus() {
        let key = test_key(201);
        let mut signer = direct_signer(key.clone(), 202);
        let m = BigUint::from(0xACEDu32);
        let faulty = signer
            .sign(&m, FaultSpec::in_branch(FaultBranch::P))
            .unwrap();
        let (p, q) = factor_from_faulty(&key.n, &key.e, &m, &faulty.value).unwrap();
        assert_eq!(&p * &q, key.n);
        // The fault hit the p branch, so the q factor is what leaks.
        assert!(p == key.q || q == key.q);
    }

    #[test]
    fn test_bdl_attack_recovers_private_exponent() {
        let key = test_key(211);
        let mut signer = direct_signer(key.clone(), 212);
        let m = BigUint::from(0x1CEDu32);
        let outcome = run_bdl_attack(&mut signer, &m).unwrap();
        assert_eq!(&outcome.p * &outcome.q, key.n);
        assert_eq!(outcome.d, key.d);
        assert!(outcome.attempts >= 1);
    }

    #[test]
    fn test_recovered_exponent_signs_correctly() {
        let key = test_key(221);
        let mut signer = direct_signer(key.clone(), 222);
        let outcome = run_bdl_attack(&mut signer, &BigUint::from(0xFACEu32)).unwrap();
        // Prove the break: sign a fresh message with the recovered exponent.
        let m2 = BigUint::from(0x0DDBA11u32);
        let forged = m2.modpow(&outcome.d, &key.n);
        assert_eq!(forged.modpow(&key.e, &key.n), m2);
    }
}
