//! rexe-rlimit: setrlimit-based limit enforcement and getrusage-based usage reporting
//!
//! Clamps the current process to fixed memory and CPU ceilings and records
//! what it consumed. Everything that touches the OS goes through the
//! [`ProcessLimits`] and [`ProcessUsage`] traits, implemented for the real
//! process by [`HostProcess`].

pub mod artifact;
pub mod enforcer;
pub mod host;
pub mod resource;
pub mod usage;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use artifact::UsageArtifact;
pub use enforcer::{LimitEnforcer, enforce_or_abort, fatal};
pub use host::{Ceiling, HostProcess, ProcessLimits, ProcessUsage, RawUsage, RssUnit, UsageScope};
pub use resource::{LimitPlan, ResourceKind, ResourceLimit};
pub use usage::{UsageRecord, UsageReporter};
