//! Signing and key-generation errors.

use sigfault_copro::CoproError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("register width {bit_width} is narrower than the {need}-bit modulus")]
    BitWidthTooSmall { bit_width: u64, need: u64 },

    #[error("blinding modulus must be an odd prime smaller than both key primes")]
    InvalidBlinding,

    #[error("branch residues disagree mod t at cycle {cycle}: fault detected")]
    ConsistencyCheckFailed { cycle: u64 },

    #[error(transparent)]
    Copro(#[from] CoproError),
}

impl SignError {
    /// True for the Shamir countermeasure's detection outcome — an expected
    /// result of adversarial runs, not a defect.
    pub fn is_fault_detected(&self) -> bool {
        matches!(self, SignError::ConsistencyCheckFailed { .. })
    }
}

#[derive(Debug, Error)]
pub enum KeygenError {
    #[error("requested modulus size {bits} is below the {min}-bit minimum")]
    KeyTooSmall { bits: u64, min: u64 },

    #[error("generated key failed the encrypt/decrypt self-check after {rounds} round trips")]
    SelfCheckFailed { rounds: usize },
}
