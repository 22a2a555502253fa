//! Guard lifecycle: limits on entry, usage report on orderly exit
//!
//! ```text
//! Start -> LimitsApplied -> (guarded code) -> UsageReported
//!              |                          \-> ReportFailed
//!              \-> FatalAbort (process aborts, nothing runs)
//! ```
//!
//! A host session also reports when the guarded code leaves through
//! `std::process::exit`, which skips `Drop`, through an `atexit` handler.
//! A process killed by a signal (for example on hitting the CPU ceiling)
//! never reaches `finish`, `Drop` or the exit hook, so no usage is reported.
//! The supervisor reads a missing artifact as "limit exceeded".

use log::{error, warn};

use rexe_core::{GuardConfig, Result};

use crate::exit_hook;
use rexe_rlimit::{
    HostProcess, LimitEnforcer, LimitPlan, ProcessLimits, ProcessUsage, RssUnit, UsageArtifact,
    UsageRecord, UsageReporter, UsageScope, fatal,
};

/// Where a [`GuardSession`] is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Limits are pinned and verified; the guarded code may run
    LimitsApplied,
    UsageReported,
    /// Finalized, but the artifact could not be written
    ReportFailed,
    /// Finalized without reporting
    Abandoned,
}

/// Limits applied for the lifetime of the value, usage reported when it ends.
///
/// Reporting happens in [`GuardSession::finish`], or on drop if the session
/// was neither finished nor abandoned. Drop covers early returns and
/// unwinding panics in the guarded code. Sessions on [`HostProcess`] also
/// report from an exit handler if the process exits first.
pub struct GuardSession<P: ProcessLimits + ProcessUsage = HostProcess> {
    process: P,
    plan: LimitPlan,
    reporter: UsageReporter,
    phase: Phase,
    exit_hook: Option<u64>,
}

impl GuardSession<HostProcess> {
    /// Arm the guard on the current process, aborting if it cannot be armed.
    pub fn install(config: &GuardConfig) -> Self {
        Self::try_install(config).unwrap_or_else(|e| fatal(&e))
    }

    pub fn try_install(config: &GuardConfig) -> Result<Self> {
        let mut session = Self::try_install_with(HostProcess, config)?;
        session.exit_hook = Some(exit_hook::arm(session.reporter.clone()));
        Ok(session)
    }

    /// Arm the guard with ceilings taken from `REXE_*` environment variables.
    ///
    /// A missing or malformed variable is fatal, like any other setup failure.
    pub fn install_from_env() -> Self {
        Self::try_install_from_env().unwrap_or_else(|e| fatal(&e))
    }

    pub fn try_install_from_env() -> Result<Self> {
        Self::try_install(&GuardConfig::from_env()?)
    }
}

impl<P: ProcessLimits + ProcessUsage> GuardSession<P> {
    /// Apply and verify every limit of `config` on `process`.
    ///
    /// Errors here are setup failures: the guarded code must not run.
    pub fn try_install_with(mut process: P, config: &GuardConfig) -> Result<Self> {
        let plan = LimitPlan::from_config(config)?;
        LimitEnforcer::new(&mut process).enforce(&plan)?;

        Ok(Self {
            process,
            plan,
            reporter: UsageReporter::new(UsageArtifact::new(&config.usage_path)),
            phase: Phase::LimitsApplied,
            exit_hook: None,
        })
    }

    pub fn install_with(process: P, config: &GuardConfig) -> Self {
        Self::try_install_with(process, config).unwrap_or_else(|e| fatal(&e))
    }

    /// Sample `scope` instead of the calling process
    pub fn with_scope(mut self, scope: UsageScope) -> Self {
        self.reporter = self.reporter.clone().scope(scope);
        self.rearm_exit_hook();
        self
    }

    pub fn with_rss_unit(mut self, unit: RssUnit) -> Self {
        self.reporter = self.reporter.clone().rss_unit(unit);
        self.rearm_exit_hook();
        self
    }

    /// Whether an exit handler will report if the process exits mid-session
    pub fn reports_on_exit(&self) -> bool {
        self.exit_hook.is_some()
    }

    pub fn plan(&self) -> &LimitPlan {
        &self.plan
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn artifact(&self) -> &UsageArtifact {
        self.reporter.artifact()
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    /// Report usage now. The error is the caller's to log; it says nothing
    /// about how the guarded code fared.
    pub fn finish(mut self) -> Result<UsageRecord> {
        self.report()
    }

    /// End the session without reporting
    pub fn abandon(mut self) {
        warn!(
            "Usage report skipped; {} left absent",
            self.reporter.artifact().path().display()
        );
        self.disarm_exit_hook();
        self.phase = Phase::Abandoned;
    }

    fn rearm_exit_hook(&mut self) {
        if let Some(ticket) = self.exit_hook.take() {
            exit_hook::disarm(ticket);
            self.exit_hook = Some(exit_hook::arm(self.reporter.clone()));
        }
    }

    fn disarm_exit_hook(&mut self) {
        if let Some(ticket) = self.exit_hook.take() {
            exit_hook::disarm(ticket);
        }
    }

    fn report(&mut self) -> Result<UsageRecord> {
        self.disarm_exit_hook();
        let result = self.reporter.report(&self.process);
        self.phase = match result {
            Ok(_) => Phase::UsageReported,
            Err(_) => Phase::ReportFailed,
        };
        result
    }
}

impl<P: ProcessLimits + ProcessUsage> Drop for GuardSession<P> {
    fn drop(&mut self) {
        if self.phase != Phase::LimitsApplied {
            return;
        }
        if let Err(e) = self.report() {
            warn!("Usage report failed during teardown: {}", e);
        }
    }
}

/// Run `f` under the guard on the current process.
///
/// Aborts before calling `f` if the limits cannot be armed. A failed usage
/// report is logged and never changes what `f` returned. Usage is still
/// reported if `f` calls `std::process::exit`.
pub fn run_guarded<T>(config: &GuardConfig, f: impl FnOnce() -> T) -> T {
    finish_guarded(GuardSession::install(config), f)
}

/// [`run_guarded`] with the ceilings read from `REXE_MEMORY_LIMIT_MIB`,
/// `REXE_TIME_LIMIT_SEC` and `REXE_USAGE_FILE`
pub fn run_guarded_from_env<T>(f: impl FnOnce() -> T) -> T {
    finish_guarded(GuardSession::install_from_env(), f)
}

pub fn run_guarded_with<P, T>(process: P, config: &GuardConfig, f: impl FnOnce() -> T) -> T
where
    P: ProcessLimits + ProcessUsage,
{
    finish_guarded(GuardSession::install_with(process, config), f)
}

fn finish_guarded<P, T>(session: GuardSession<P>, f: impl FnOnce() -> T) -> T
where
    P: ProcessLimits + ProcessUsage,
{
    let output = f();
    if let Err(e) = session.finish() {
        error!("Usage report failed: {}", e);
    }
    output
}
