//! Modular-exponentiation programs.
//!
//! Both programs scan a fixed number of exponent bit positions derived from
//! the coprocessor's register width, never from the operand's magnitude, so
//! the instruction sequence (and with it the cycle count) is identical for
//! every operand of a given width.

use sigfault_copro::{reg, Coprocessor};

/// Left-to-right binary exponentiation: `dst = base^exp mod modulus`.
///
/// Scans bit positions `l ..= 0` (where `l` is the register width) from most
/// to least significant. Each position issues one squaring and one
/// multiplication; the multiplier is the base when the exponent bit is set
/// and the ONE register otherwise, so the cycle count does not depend on the
/// exponent's bit pattern. Correct whenever the exponent fits the scanned
/// width, which the signing programs guarantee by reducing exponents first.
///
/// Cost: `2l + 4` cycles. Clobbers `POW`.
pub fn modexp(cp: &mut Coprocessor, dst: usize, base: usize, exp: usize, modulus: usize) {
    let l = cp.bit_width();
    cp.copy(reg::POW, reg::ONE);
    for i in (0..=l).rev() {
        cp.mul_mod(reg::POW, reg::POW, reg::POW, modulus);
        let multiplier = if cp.get(exp).bit(i) { base } else { reg::ONE };
        cp.mul_mod(reg::POW, reg::POW, multiplier, modulus);
    }
    cp.copy(dst, reg::POW);
}

/// Dual-accumulator exponentiation: `dst = base^exp mod modulus`.
///
/// Walks the exponent from the least significant bit upward, keeping the
/// running square of the base in `POW2` alongside the accumulator in `POW`.
/// The per-bit multiplications are uncounted; one explicit tick against the
/// accumulator completes each bit position, and the fault schedule is
/// disarmed before the final copy so the fault surface is exactly the `l`
/// loop cycles.
///
/// Cost: `l + 2` cycles. Clobbers `POW` and `POW2`.
pub fn modexp_dual(cp: &mut Coprocessor, dst: usize, base: usize, exp: usize, modulus: usize) {
    let l = cp.bit_width();
    cp.copy(reg::POW, reg::ONE);
    cp.copy(reg::POW2, base);
    for k in 0..l {
        if cp.get(exp).bit(k) {
            cp.mul_mod_untimed(reg::POW, reg::POW, reg::POW2, modulus);
        }
        cp.mul_mod_untimed(reg::POW2, reg::POW2, reg::POW2, modulus);
        cp.tick(reg::POW);
    }
    cp.disarm_fault();
    cp.copy_untimed(dst, reg::POW);
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn prepared(l: u64, base: u64, exp: u64, modulus: u64) -> Coprocessor {
        let mut cp = Coprocessor::new(l);
        cp.load_immediate(reg::ONE, BigUint::from(1u32));
        cp.load_immediate(reg::M, BigUint::from(base));
        cp.load_immediate(reg::S1, BigUint::from(exp));
        cp.load_immediate(reg::N, BigUint::from(modulus));
        cp
    }

    #[test]
    fn test_modexp_matches_modpow() {
        for (base, exp, modulus) in [(4u64, 13u64, 497u64), (2, 0, 7), (0, 5, 11), (7, 1, 13)] {
            let mut cp = prepared(32, base, exp, modulus);
            modexp(&mut cp, reg::A, reg::M, reg::S1, reg::N);
            let want = BigUint::from(base).modpow(&BigUint::from(exp), &BigUint::from(modulus));
            assert_eq!(cp.get(reg::A), &want, "{base}^{exp} mod {modulus}");
        }
    }

    #[test]
    fn test_modexp_dual_matches_modpow() {
        for (base, exp, modulus) in [(4u64, 13u64, 497u64), (2, 0, 7), (0, 5, 11), (7, 1, 13)] {
            let mut cp = prepared(32, base, exp, modulus);
            modexp_dual(&mut cp, reg::A, reg::M, reg::S1, reg::N);
            let want = BigUint::from(base).modpow(&BigUint::from(exp), &BigUint::from(modulus));
            assert_eq!(cp.get(reg::A), &want, "{base}^{exp} mod {modulus}");
        }
    }

    #[test]
    fn test_modexp_cycle_cost_is_operand_independent() {
        let mut costs = Vec::new();
        for (base, exp) in [(2u64, 1u64), (200, 0xFFFF), (3, 0x8001)] {
            let mut cp = prepared(32, base, exp, 65521);
            let before = cp.clock();
            modexp(&mut cp, reg::A, reg::M, reg::S1, reg::N);
            costs.push(cp.clock() - before);
        }
        assert!(costs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(costs[0], 2 * 32 + 4);
    }

    #[test]
    fn test_modexp_dual_cycle_cost_is_operand_independent() {
        let mut costs = Vec::new();
        for (base, exp) in [(2u64, 1u64), (200, 0xFFFF), (3, 0x8001)] {
            let mut cp = prepared(32, base, exp, 65521);
            let before = cp.clock();
            modexp_dual(&mut cp, reg::A, reg::M, reg::S1, reg::N);
            costs.push(cp.clock() - before);
        }
        assert!(costs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(costs[0], 32 + 2);
    }
}
