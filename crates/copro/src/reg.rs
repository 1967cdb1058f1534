//! Symbolic register roles used by the signing programs.
//!
//! The register file has a fixed layout; programs address slots by role
//! rather than by raw index. `S1`/`S2` are scratch slots, `POW`/`POW2` are
//! reserved for the exponentiation accumulator and its running square, and
//! `T` holds the blinding modulus in the fault-detected signing mode.

/// Number of register slots in the bank.
pub const N_REGS: usize = 16;

/// First prime factor of the modulus.
pub const P: usize = 0;
/// Second prime factor of the modulus.
pub const Q: usize = 1;
/// Public modulus N = p·q.
pub const N: usize = 2;
/// Private exponent.
pub const D: usize = 3;
/// Message.
pub const M: usize = 4;
/// Constant one.
pub const ONE: usize = 5;
/// Scratch slot (reduced exponents, combine intermediates).
pub const S1: usize = 6;
/// Scratch slot (blinded moduli p·t, q·t).
pub const S2: usize = 7;
/// First CRT branch residue (S_p, or S_pt before reduction).
pub const A: usize = 8;
/// Second CRT branch residue (S_q, or S_qt before reduction).
pub const B: usize = 9;
/// Bezout coefficient p⁻¹ mod q.
pub const X: usize = 10;
/// Bezout coefficient q⁻¹ mod p.
pub const Y: usize = 11;
/// Signature output.
pub const C: usize = 12;
/// Exponentiation accumulator.
pub const POW: usize = 13;
/// Running square of the base (dual-accumulator exponentiation).
pub const POW2: usize = 14;
/// Blinding modulus t.
pub const T: usize = 15;
