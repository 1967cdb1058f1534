//! Coprocessor register bank and instruction set.
//!
//! # Execution Model
//!
//! The coprocessor is a deterministic virtual arithmetic unit: a fixed file
//! of [`reg::N_REGS`] big-integer registers, a clock that advances by exactly
//! one per completed instruction, and a single-fault schedule. Every
//! mod-producing instruction writes a canonical residue in `[0, modulus)` to
//! its destination, then completes the cycle; if the completed cycle equals
//! the scheduled fault cycle, one uniformly random bit below the configured
//! register width is flipped in the destination register.
//!
//! ## Constraints
//!
//! - One coprocessor per signing invocation; registers start at zero and no
//!   state survives the invocation
//! - The fault schedule is caller-supplied and never re-armed, so at most
//!   one fault fires per invocation
//! - A zero modulus register is a program bug and panics, the way a
//!   hardware divider would trap

use crate::error::CoproError;
use crate::fault::DISARMED;
use crate::reg;
use crate::trace::{ExecutionTrace, Op, TraceRow};
use num_bigint::BigUint;
use num_traits::One;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Register machine state for one signing invocation.
pub struct Coprocessor {
    /// Register file.
    regs: Vec<BigUint>,
    /// Cycle counter, starts at 0.
    clock: u64,
    /// Scheduled fault cycle (0 = disabled).
    fault_cycle: u64,
    /// Register width `l`; fault bit positions are drawn from `[0, l)`.
    bit_width: u64,
    /// Source of fault bit positions.
    rng: StdRng,
    /// Execution trace (if tracing is enabled).
    trace: Option<ExecutionTrace>,
    /// Tracing enabled flag.
    tracing: bool,
}

impl Coprocessor {
    /// Create a coprocessor with no scheduled fault.
    pub fn new(bit_width: u64) -> Self {
        Self::with_fault(bit_width, DISARMED)
    }

    /// Create a coprocessor that flips one random bit at `fault_cycle`.
    pub fn with_fault(bit_width: u64, fault_cycle: u64) -> Self {
        Self::build(bit_width, fault_cycle, StdRng::from_entropy())
    }

    /// Create a coprocessor with a reproducible fault bit position.
    pub fn seeded(bit_width: u64, fault_cycle: u64, seed: u64) -> Self {
        Self::build(bit_width, fault_cycle, StdRng::seed_from_u64(seed))
    }

    fn build(bit_width: u64, fault_cycle: u64, rng: StdRng) -> Self {
        Self {
            regs: vec![BigUint::default(); reg::N_REGS],
            clock: 0,
            fault_cycle,
            bit_width,
            rng,
            trace: None,
            tracing: false,
        }
    }

    /// Enable execution tracing.
    pub fn enable_tracing(&mut self) {
        self.tracing = true;
        self.trace = Some(ExecutionTrace::new());
    }

    /// Disable tracing and return the collected trace.
    pub fn take_trace(&mut self) -> Option<ExecutionTrace> {
        self.tracing = false;
        self.trace.take()
    }

    /// Get a register value.
    #[inline]
    pub fn get(&self, r: usize) -> &BigUint {
        &self.regs[r]
    }

    /// Current cycle count.
    #[inline]
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Configured register width `l`.
    #[inline]
    pub fn bit_width(&self) -> u64 {
        self.bit_width
    }

    /// Reset the fault schedule to the disabled sentinel.
    pub fn disarm_fault(&mut self) {
        self.fault_cycle = DISARMED;
    }

    /// Flip one uniformly random bit below the register width of `r`.
    ///
    /// This is the branch-targeted fault path; it bypasses the cycle
    /// mechanism and costs no cycle.
    pub fn flip_bit(&mut self, r: usize) {
        let pos = self.rng.gen_range(0..self.bit_width);
        self.regs[r] ^= BigUint::one() << pos;
    }

    /// Complete the current instruction: advance the clock and fire the
    /// fault on the destination register if this is the scheduled cycle.
    fn complete_cycle(&mut self, dst: usize, op: Op) {
        self.clock += 1;
        let faulted = self.fault_cycle != DISARMED && self.clock == self.fault_cycle;
        if faulted {
            self.flip_bit(dst);
        }
        if self.tracing {
            if let Some(trace) = &mut self.trace {
                trace.push(TraceRow {
                    clk: self.clock,
                    op,
                    dst,
                    faulted,
                });
            }
        }
    }

    /// dst = (a + b) mod m.
    pub fn add_mod(&mut self, dst: usize, a: usize, b: usize, m: usize) {
        self.regs[dst] = (&self.regs[a] + &self.regs[b]) % &self.regs[m];
        self.complete_cycle(dst, Op::AddMod);
    }

    /// dst = (a - b) mod m, canonical even when a < b.
    pub fn sub_mod(&mut self, dst: usize, a: usize, b: usize, m: usize) {
        let av = &self.regs[a] % &self.regs[m];
        let bv = &self.regs[b] % &self.regs[m];
        self.regs[dst] = (av + &self.regs[m] - bv) % &self.regs[m];
        self.complete_cycle(dst, Op::SubMod);
    }

    /// dst = (a * b) mod m.
    pub fn mul_mod(&mut self, dst: usize, a: usize, b: usize, m: usize) {
        self.regs[dst] = (&self.regs[a] * &self.regs[b]) % &self.regs[m];
        self.complete_cycle(dst, Op::MulMod);
    }

    /// dst = (a * b) mod m without completing a cycle.
    ///
    /// Used only inside the non-CRT exponentiation loop, where one explicit
    /// [`Coprocessor::tick`] per bit position accounts for the whole step.
    pub fn mul_mod_untimed(&mut self, dst: usize, a: usize, b: usize, m: usize) {
        self.regs[dst] = (&self.regs[a] * &self.regs[b]) % &self.regs[m];
    }

    /// dst = src mod m.
    pub fn mod_copy(&mut self, dst: usize, src: usize, m: usize) {
        self.regs[dst] = &self.regs[src] % &self.regs[m];
        self.complete_cycle(dst, Op::ModCopy);
    }

    /// dst = src, unreduced.
    pub fn copy(&mut self, dst: usize, src: usize) {
        self.regs[dst] = self.regs[src].clone();
        self.complete_cycle(dst, Op::Copy);
    }

    /// dst = src without completing a cycle.
    pub fn copy_untimed(&mut self, dst: usize, src: usize) {
        self.regs[dst] = self.regs[src].clone();
    }

    /// dst = src⁻¹ mod m.
    ///
    /// # Errors
    /// Returns `NonInvertibleElement` when `gcd(src, m) != 1`. Under valid
    /// RSA keys the signing programs only invert distinct primes, so this
    /// surfaces key-generation defects rather than expected states.
    pub fn mod_inverse(&mut self, dst: usize, src: usize, m: usize) -> Result<(), CoproError> {
        match self.regs[src].modinv(&self.regs[m]) {
            Some(inv) => {
                self.regs[dst] = inv;
                self.complete_cycle(dst, Op::ModInverse);
                Ok(())
            }
            None => Err(CoproError::NonInvertibleElement {
                reg: src,
                modulus: m,
            }),
        }
    }

    /// dst = (m - (src mod m)) mod m, the additive inverse.
    pub fn add_inverse(&mut self, dst: usize, src: usize, m: usize) {
        let sv = &self.regs[src] % &self.regs[m];
        self.regs[dst] = (&self.regs[m] - sv) % &self.regs[m];
        self.complete_cycle(dst, Op::AddInverse);
    }

    /// dst = value, verbatim.
    pub fn load_immediate(&mut self, dst: usize, value: BigUint) {
        self.regs[dst] = value;
        self.complete_cycle(dst, Op::LoadImmediate);
    }

    /// Complete one cycle against `dst` with no counted instruction.
    pub fn tick(&mut self, dst: usize) {
        self.complete_cycle(dst, Op::Tick);
    }
}
