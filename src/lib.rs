//! rexe-guard: in-process resource guard for untrusted code
//!
//! Pins the memory (address space, data segment, stack) and CPU time limits
//! of the current process before untrusted code runs, verifies the OS honored
//! them, and records the CPU time and peak memory used to `rusage.txt` when
//! the guarded code finishes.
//!
//! # Example
//!
//! ```ignore
//! use rexe_guard::{GuardConfig, run_guarded};
//!
//! let config = GuardConfig::new(256, 5);
//! let answer = run_guarded(&config, || untrusted_main());
//! ```
//!
//! If the limits cannot be applied and verified the process aborts before
//! the closure runs.

mod exit_hook;
pub mod session;

pub use rexe_core::{GuardConfig, GuardError, Result, util};
pub use rexe_rlimit::{
    Ceiling, HostProcess, LimitEnforcer, LimitPlan, ProcessLimits, ProcessUsage, RawUsage,
    ResourceKind, ResourceLimit, RssUnit, UsageArtifact, UsageRecord, UsageReporter, UsageScope,
};
pub use session::{GuardSession, Phase, run_guarded, run_guarded_from_env, run_guarded_with};
