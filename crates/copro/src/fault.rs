//! Fault schedule types.
//!
//! A fault is one bit flip. Its *timing* is attacker-chosen: either a cycle
//! number (the coprocessor flips a random bit of that cycle's destination
//! register) or a CRT branch (the signing program flips a random bit of the
//! branch residue right after its exponentiation). Cycle 0 never completes,
//! so `cycle == 0` is the disabled sentinel.

use serde::{Deserialize, Serialize};

/// Disabled fault-cycle sentinel.
pub const DISARMED: u64 = 0;

/// Which CRT branch a branch-targeted fault corrupts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultBranch {
    /// No branch-targeted fault.
    #[default]
    None,
    /// Corrupt the p-side residue.
    P,
    /// Corrupt the q-side residue.
    Q,
}

/// A single-fault schedule for one signing invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultSpec {
    /// Cycle at which the coprocessor flips a bit (0 = disabled).
    pub cycle: u64,
    /// Branch residue to corrupt after its exponentiation.
    pub branch: FaultBranch,
}

impl FaultSpec {
    /// Schedule a fault at the given cycle.
    pub fn at_cycle(cycle: u64) -> Self {
        Self {
            cycle,
            branch: FaultBranch::None,
        }
    }

    /// Schedule a fault in the given branch.
    pub fn in_branch(branch: FaultBranch) -> Self {
        Self {
            cycle: DISARMED,
            branch,
        }
    }

    /// True if no fault is scheduled.
    pub fn is_clean(&self) -> bool {
        self.cycle == DISARMED && self.branch == FaultBranch::None
    }
}
