//! sigfault-copro: cycle-accurate RSA coprocessor register machine.
//!
//! This crate provides:
//! - A 16-slot big-integer register file with a monotonic cycle counter
//! - The coprocessor instruction set (modular add/sub/mul, copies, inverses)
//! - Single bit-flip fault injection at an attacker-chosen cycle
//! - Execution trace output for aligning fault timing

pub mod bank;
pub mod error;
pub mod fault;
pub mod reg;
pub mod trace;

pub use bank::Coprocessor;
pub use error::CoproError;
pub use fault::{FaultBranch, FaultSpec};
pub use trace::{ExecutionTrace, Op, TraceRow};
