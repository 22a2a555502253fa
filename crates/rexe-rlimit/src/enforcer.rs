//! Applies and verifies the guard's resource ceilings
//!
//! Each ceiling is written with soft == hard, then read back. A read-back
//! that differs from the request is fatal: the guarded code must never start
//! under a limit that silently did not take.

use log::{debug, error, info};

use rexe_core::{GuardError, Result};

use crate::host::{Ceiling, ProcessLimits};
use crate::resource::{LimitPlan, ResourceKind, ResourceLimit};

/// Pins every limit of a [`LimitPlan`] on a process
pub struct LimitEnforcer<'a, L: ProcessLimits + ?Sized> {
    limits: &'a mut L,
}

impl<'a, L: ProcessLimits + ?Sized> LimitEnforcer<'a, L> {
    pub fn new(limits: &'a mut L) -> Self {
        Self { limits }
    }

    /// Apply all limits in plan order, stopping at the first failure.
    pub fn enforce(&mut self, plan: &LimitPlan) -> Result<()> {
        for limit in plan.limits() {
            self.apply(limit)?;
        }
        info!(
            "Resource limits armed: memory={} bytes, cpu={}s",
            plan.ceiling(ResourceKind::AddressSpace),
            plan.ceiling(ResourceKind::CpuTime)
        );
        Ok(())
    }

    fn apply(&mut self, limit: &ResourceLimit) -> Result<()> {
        self.limits
            .set_limit(limit.kind, Ceiling::pinned(limit.ceiling))?;

        let applied = self.limits.limit(limit.kind)?;
        if !applied.is_pinned_at(limit.ceiling) {
            return Err(GuardError::LimitVerification {
                resource: limit.kind.name(),
                requested: limit.ceiling,
                soft: applied.soft,
                hard: applied.hard,
            });
        }

        debug!(
            "{} pinned at {} {}",
            limit.kind,
            limit.ceiling,
            limit.kind.unit()
        );
        Ok(())
    }
}

/// Enforce `plan`, aborting the process if any limit cannot be applied and verified.
pub fn enforce_or_abort<L: ProcessLimits + ?Sized>(limits: &mut L, plan: &LimitPlan) {
    if let Err(e) = LimitEnforcer::new(limits).enforce(plan) {
        fatal(&e);
    }
}

/// Abort the process over a guard setup failure.
///
/// Goes to stderr as well as the log, since no logger may be installed yet.
pub fn fatal(err: &GuardError) -> ! {
    error!("Refusing to run guarded code: {}", err);
    eprintln!("rexe-guard: fatal: {}", err);
    std::process::abort()
}
