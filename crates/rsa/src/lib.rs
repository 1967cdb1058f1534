//! sigfault-rsa: RSA signing programs for the fault-injection coprocessor.
//!
//! This crate provides:
//! - Fixed-bit-width modular exponentiation expressed as coprocessor programs
//! - The three signing programs: non-CRT baseline, direct CRT combine, and
//!   the Shamir blinded combine with mod-t fault detection
//! - RSA key generation and blinding-prime generation

pub mod error;
pub mod keygen;
pub mod modexp;
pub mod serde_dec;
pub mod sign;

pub use error::{KeygenError, SignError};
pub use keygen::KeyPair;
pub use sign::{CycleWindow, SignMode, Signature, Signer, SignerConfig};
