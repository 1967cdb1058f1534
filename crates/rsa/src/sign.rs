//! RSA-CRT signing programs.
//!
//! # Signing Modes
//!
//! - **NonCrt**: one exponentiation mod N. Control case: there is no
//!   CRT-branch fault surface at all.
//! - **CrtDirect**: exponentiations mod p and mod q, recombined through the
//!   Bezout coefficients. A fault confined to one branch yields a signature
//!   that factors the modulus (the Boneh-DeMillo-Lipton attack).
//! - **CrtShamir**: exponentiations mod p·t and q·t for a small auxiliary
//!   prime t, with exponents reduced mod (p-1)(t-1) and (q-1)(t-1). Both
//!   branch residues must agree mod t before the combine; a mismatch is the
//!   detected-fault outcome.
//!
//! Every invocation runs `INIT -> LOAD_OPERANDS -> EXPONENTIATE_BRANCH_1 ->
//! EXPONENTIATE_BRANCH_2 -> [CONSISTENCY_CHECK] -> COMBINE -> DONE` on a
//! fresh coprocessor, in strict program order, so fault cycles align across
//! runs. The consistency check's alternate terminal state surfaces as
//! [`SignError::ConsistencyCheckFailed`].

use crate::error::SignError;
use crate::keygen::{self, KeyPair};
use crate::modexp::{modexp, modexp_dual};
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sigfault_copro::{reg, Coprocessor, FaultBranch, FaultSpec};
use tracing::debug;

/// Signing protocol selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignMode {
    /// Single exponentiation mod N (no CRT).
    NonCrt,
    /// Direct CRT combine, no fault detection.
    CrtDirect,
    /// Shamir blinded combine with mod-t consistency check.
    CrtShamir,
}

/// Signer session configuration.
#[derive(Clone, Debug)]
pub struct SignerConfig {
    pub mode: SignMode,
    /// Register width `l`; must cover the key modulus.
    pub bit_width: u64,
    /// Size of the generated blinding prime (CrtShamir only).
    pub blinding_bits: u64,
    /// Explicit blinding prime, overriding generation (CrtShamir only).
    pub blinding: Option<BigUint>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            mode: SignMode::CrtDirect,
            bit_width: 1024,
            blinding_bits: 224,
            blinding: None,
        }
    }
}

/// First and last cycle of a CRT branch computation, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleWindow {
    pub start: u64,
    pub end: u64,
}

impl CycleWindow {
    /// True if the cycle falls inside the window.
    pub fn contains(&self, cycle: u64) -> bool {
        self.start <= cycle && cycle <= self.end
    }
}

/// A (possibly corrupted) signature and its cycle accounting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Signature {
    /// Signature value as read from the output register.
    #[serde(with = "crate::serde_dec")]
    pub value: BigUint,
    /// Total cycles consumed by the invocation.
    pub cycles: u64,
    /// Cycle window of the p-side branch (CRT modes).
    pub branch_p: Option<CycleWindow>,
    /// Cycle window of the q-side branch (CRT modes).
    pub branch_q: Option<CycleWindow>,
}

/// A signing session: key material, mode and (for CrtShamir) the blinding
/// prime, reused across a batch of invocations. Each invocation owns a fresh
/// coprocessor, so sessions share no mutable state with one another.
pub struct Signer {
    key: KeyPair,
    config: SignerConfig,
    blinding: Option<BigUint>,
    rng: StdRng,
}

impl Signer {
    /// Create a signer session.
    ///
    /// # Errors
    /// `BitWidthTooSmall` when the register width cannot hold the modulus;
    /// `InvalidBlinding` when a Shamir blinding prime is unusable (not an
    /// odd prime below both key primes) or cannot be sized.
    pub fn new(key: KeyPair, config: SignerConfig) -> Result<Self, SignError> {
        Self::build(key, config, StdRng::from_entropy())
    }

    /// Create a signer session with reproducible fault positions and
    /// blinding primes.
    pub fn seeded(key: KeyPair, config: SignerConfig, seed: u64) -> Result<Self, SignError> {
        Self::build(key, config, StdRng::seed_from_u64(seed))
    }

    fn build(key: KeyPair, config: SignerConfig, mut rng: StdRng) -> Result<Self, SignError> {
        let need = key.modulus_bits();
        if config.bit_width < need {
            return Err(SignError::BitWidthTooSmall {
                bit_width: config.bit_width,
                need,
            });
        }

        let blinding = match config.mode {
            SignMode::CrtShamir => Some(Self::resolve_blinding(&key, &config, &mut rng)?),
            _ => None,
        };

        Ok(Self {
            key,
            config,
            blinding,
            rng,
        })
    }

    fn resolve_blinding(
        key: &KeyPair,
        config: &SignerConfig,
        rng: &mut StdRng,
    ) -> Result<BigUint, SignError> {
        let limit = key.p.bits().min(key.q.bits());
        if let Some(t) = &config.blinding {
            let ok = t.is_odd()
                && t > &BigUint::from(2u32)
                && t < &key.p
                && t < &key.q
                && keygen::is_probable_prime(t, keygen::MILLER_RABIN_ROUNDS, rng);
            if !ok {
                return Err(SignError::InvalidBlinding);
            }
            return Ok(t.clone());
        }
        // A freshly generated prime strictly narrower than both key primes
        // is automatically below them.
        if config.blinding_bits < 2 || config.blinding_bits >= limit {
            return Err(SignError::InvalidBlinding);
        }
        let t = keygen::generate_blinding_prime(config.blinding_bits, rng);
        debug!(bits = config.blinding_bits, "generated blinding prime");
        Ok(t)
    }

    /// Key material for this session.
    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    /// Session configuration.
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Blinding prime for this session (CrtShamir only).
    pub fn blinding(&self) -> Option<&BigUint> {
        self.blinding.as_ref()
    }

    /// Sign `m` under the scheduled fault.
    ///
    /// # Errors
    /// `ConsistencyCheckFailed` when the Shamir mode detects a corrupted
    /// branch; coprocessor errors propagate unchanged.
    pub fn sign(&mut self, m: &BigUint, fault: FaultSpec) -> Result<Signature, SignError> {
        let seed = self.rng.gen::<u64>();
        let mut cp = Coprocessor::seeded(self.config.bit_width, fault.cycle, seed);
        match self.config.mode {
            SignMode::NonCrt => self.run_noncrt(&mut cp, m),
            SignMode::CrtDirect => self.run_crt_direct(&mut cp, m, fault.branch),
            SignMode::CrtShamir => self.run_crt_shamir(&mut cp, m, fault.branch),
        }
    }

    /// `c = m^d mod N` in one exponentiation. The branch selector has no
    /// meaning here and is ignored.
    fn run_noncrt(&self, cp: &mut Coprocessor, m: &BigUint) -> Result<Signature, SignError> {
        cp.load_immediate(reg::N, self.key.n.clone());
        cp.load_immediate(reg::D, self.key.d.clone());
        cp.load_immediate(reg::M, m.clone());
        cp.load_immediate(reg::ONE, BigUint::one());

        modexp_dual(cp, reg::C, reg::M, reg::D, reg::N);

        Ok(Signature {
            value: cp.get(reg::C).clone(),
            cycles: cp.clock(),
            branch_p: None,
            branch_q: None,
        })
    }

    /// Direct CRT combine: `c = (S_q·x·p + S_p·y·q) mod N`.
    fn run_crt_direct(
        &self,
        cp: &mut Coprocessor,
        m: &BigUint,
        branch: FaultBranch,
    ) -> Result<Signature, SignError> {
        cp.load_immediate(reg::P, self.key.p.clone());
        cp.load_immediate(reg::Q, self.key.q.clone());
        cp.load_immediate(reg::N, self.key.n.clone());
        cp.load_immediate(reg::D, self.key.d.clone());
        cp.load_immediate(reg::M, m.clone());
        cp.load_immediate(reg::ONE, BigUint::one());

        // S_p = m^(d mod p-1) mod p
        let branch_p = windowed(cp, |cp| {
            cp.sub_mod(reg::S1, reg::P, reg::ONE, reg::P);
            cp.mod_copy(reg::S1, reg::D, reg::S1);
            modexp(cp, reg::A, reg::M, reg::S1, reg::P);
        });
        if branch == FaultBranch::P {
            cp.flip_bit(reg::A);
        }

        // S_q = m^(d mod q-1) mod q
        let branch_q = windowed(cp, |cp| {
            cp.sub_mod(reg::S1, reg::Q, reg::ONE, reg::Q);
            cp.mod_copy(reg::S1, reg::D, reg::S1);
            modexp(cp, reg::B, reg::M, reg::S1, reg::Q);
        });
        if branch == FaultBranch::Q {
            cp.flip_bit(reg::B);
        }

        combine(cp)?;

        Ok(Signature {
            value: cp.get(reg::C).clone(),
            cycles: cp.clock(),
            branch_p: Some(branch_p),
            branch_q: Some(branch_q),
        })
    }

    /// Shamir blinded combine with the mod-t consistency check.
    fn run_crt_shamir(
        &self,
        cp: &mut Coprocessor,
        m: &BigUint,
        branch: FaultBranch,
    ) -> Result<Signature, SignError> {
        let Some(t) = &self.blinding else {
            return Err(SignError::InvalidBlinding);
        };

        cp.load_immediate(reg::P, self.key.p.clone());
        cp.load_immediate(reg::Q, self.key.q.clone());
        cp.load_immediate(reg::N, self.key.n.clone());
        cp.load_immediate(reg::D, self.key.d.clone());
        cp.load_immediate(reg::M, m.clone());
        cp.load_immediate(reg::ONE, BigUint::one());
        cp.load_immediate(reg::T, t.clone());

        // t - 1, shared by both branch exponent reductions.
        cp.sub_mod(reg::X, reg::T, reg::ONE, reg::T);

        // S_pt = m^(d mod (p-1)(t-1)) mod p·t. The products p·t and
        // (p-1)(t-1) are below N because t < q, so reducing mod N is exact.
        let branch_p = windowed(cp, |cp| {
            cp.mul_mod(reg::S2, reg::P, reg::T, reg::N);
            cp.sub_mod(reg::S1, reg::P, reg::ONE, reg::P);
            cp.mul_mod(reg::S1, reg::S1, reg::X, reg::N);
            cp.mod_copy(reg::S1, reg::D, reg::S1);
            modexp(cp, reg::A, reg::M, reg::S1, reg::S2);
        });
        if branch == FaultBranch::P {
            cp.flip_bit(reg::A);
        }

        // S_qt = m^(d mod (q-1)(t-1)) mod q·t.
        let branch_q = windowed(cp, |cp| {
            cp.mul_mod(reg::S2, reg::Q, reg::T, reg::N);
            cp.sub_mod(reg::S1, reg::Q, reg::ONE, reg::Q);
            cp.mul_mod(reg::S1, reg::S1, reg::X, reg::N);
            cp.mod_copy(reg::S1, reg::D, reg::S1);
            modexp(cp, reg::B, reg::M, reg::S1, reg::S2);
        });
        if branch == FaultBranch::Q {
            cp.flip_bit(reg::B);
        }

        // Consistency check: both residues mod t must agree.
        cp.mod_copy(reg::X, reg::A, reg::T);
        cp.mod_copy(reg::Y, reg::B, reg::T);
        if cp.get(reg::X) != cp.get(reg::Y) {
            return Err(SignError::ConsistencyCheckFailed { cycle: cp.clock() });
        }

        // S_p = S_pt mod p, S_q = S_qt mod q, then the direct combine.
        cp.mod_copy(reg::A, reg::A, reg::P);
        cp.mod_copy(reg::B, reg::B, reg::Q);
        combine(cp)?;

        Ok(Signature {
            value: cp.get(reg::C).clone(),
            cycles: cp.clock(),
            branch_p: Some(branch_p),
            branch_q: Some(branch_q),
        })
    }
}

/// CRT recombination from the residues in A and B:
/// `C = (B·x·p + A·y·q) mod N` with `x = p⁻¹ mod q`, `y = q⁻¹ mod p`.
fn combine(cp: &mut Coprocessor) -> Result<(), SignError> {
    cp.mod_inverse(reg::X, reg::P, reg::Q)?;
    cp.mod_inverse(reg::Y, reg::Q, reg::P)?;
    cp.mul_mod(reg::C, reg::B, reg::X, reg::N);
    cp.mul_mod(reg::C, reg::C, reg::P, reg::N);
    cp.mul_mod(reg::S1, reg::A, reg::Y, reg::N);
    cp.mul_mod(reg::S1, reg::S1, reg::Q, reg::N);
    cp.add_mod(reg::C, reg::C, reg::S1, reg::N);
    Ok(())
}

/// Run `program` and report the inclusive cycle window it occupied.
fn windowed(cp: &mut Coprocessor, program: impl FnOnce(&mut Coprocessor)) -> CycleWindow {
    let start = cp.clock() + 1;
    program(cp);
    CycleWindow {
        start,
        end: cp.clock(),
    }
}
