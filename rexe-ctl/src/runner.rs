use console::{StyledObject, style};
use log::{debug, info, warn};
use nix::sys::signal::Signal;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use rexe_guard::{GuardConfig, GuardError, GuardSession, UsageArtifact, UsageScope, util};

/// Limits could not be applied or verified; the program never started
pub const EXIT_SETUP_FAILURE: i32 = 125;
/// The program could not be started
pub const EXIT_NOT_STARTED: i32 = 127;

/// How a guarded program ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    /// Nonzero exit, or a signal no ceiling raises
    RuntimeError,
    /// Killed by SIGKILL or SIGXCPU, the signals the CPU ceiling delivers
    LimitExceeded,
}

impl Verdict {
    pub fn classify(status: &ExitStatus) -> Self {
        if let Some(raw) = status.signal() {
            return match Signal::try_from(raw) {
                Ok(Signal::SIGKILL | Signal::SIGXCPU) => Verdict::LimitExceeded,
                _ => Verdict::RuntimeError,
            };
        }
        match status.code() {
            Some(0) => Verdict::Success,
            _ => Verdict::RuntimeError,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::RuntimeError => "runtime error",
            Verdict::LimitExceeded => "limit exceeded",
        }
    }

    fn styled(self) -> StyledObject<&'static str> {
        match self {
            Verdict::Success => style(self.label()).green().bold(),
            Verdict::RuntimeError => style(self.label()).yellow().bold(),
            Verdict::LimitExceeded => style(self.label()).red().bold(),
        }
    }
}

fn signal_name(raw: i32) -> String {
    Signal::try_from(raw)
        .map(|signal| signal.as_str().to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Configuration for a guarded run
pub struct RunConfig {
    pub memory: Option<String>,
    pub time: Option<u64>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub program: String,
    pub args: Vec<String>,
}

/// Config file, then environment, then flags; later sources win.
pub fn resolve_config(run: &RunConfig) -> Result<GuardConfig, GuardError> {
    let base = match &run.config {
        Some(path) => GuardConfig::load(path)?,
        None => GuardConfig::new(0, 0),
    };
    let mut config = base.merge_env()?;

    if let Some(m) = &run.memory {
        debug!("Overriding memory limit: {}", m);
        config.memory_limit_mib = util::parse_memory_mib(m)?;
    }
    if let Some(t) = run.time {
        debug!("Overriding time limit: {}s", t);
        config.time_limit_sec = t;
    }
    if let Some(o) = &run.output {
        debug!("Overriding usage path: {:?}", o);
        config.usage_path = o.clone();
    }

    config.validate()?;
    Ok(config)
}

fn setup_failure(e: &GuardError) -> i32 {
    eprintln!("{} {}", style("setup failure:").red().bold(), e);
    EXIT_SETUP_FAILURE
}

/// Arm the guard on this process, run the program under it, and report the
/// program's usage. Returns the exit status for `rexe-ctl`.
pub fn run_guarded_program(run: RunConfig) -> i32 {
    let config = match resolve_config(&run) {
        Ok(config) => config,
        Err(e) => return setup_failure(&e),
    };

    // A leftover artifact would read as a completed run if this one is killed.
    if let Err(e) = UsageArtifact::new(&config.usage_path).clear() {
        return setup_failure(&e);
    }

    let session = match GuardSession::try_install(&config) {
        Ok(session) => session.with_scope(UsageScope::Children),
        Err(e) => return setup_failure(&e),
    };

    info!("Executing: {} {:?}", run.program, run.args);

    let status = match Command::new(&run.program).args(&run.args).status() {
        Ok(status) => status,
        Err(e) => {
            eprintln!(
                "{} cannot start {}: {}",
                style("error:").red().bold(),
                run.program,
                e
            );
            session.abandon();
            return EXIT_NOT_STARTED;
        }
    };

    let verdict = Verdict::classify(&status);

    if let Some(signal) = status.signal() {
        warn!("{} killed by {}", run.program, signal_name(signal));
        session.abandon();
        eprintln!(
            "{}={} | {}={} | {}",
            style("verdict").dim(),
            verdict.styled(),
            style("signal").dim(),
            style(signal_name(signal)).red().bold(),
            style("no usage recorded").red()
        );
        return 128 + signal;
    }

    let code = status.code().unwrap_or(1);
    match session.finish() {
        Ok(record) => {
            eprintln!(
                "{}={} | {}={} | {}={} | {}={}",
                style("verdict").dim(),
                verdict.styled(),
                style("exit_code").dim(),
                style(code).bold(),
                style("cpu_time_ms").dim(),
                style(record.cpu_time_millis).bold(),
                style("peak_memory_kib").dim(),
                style(record.peak_memory_kib).bold(),
            );
        }
        Err(e) => {
            eprintln!(
                "{}={} | {}={}",
                style("verdict").dim(),
                verdict.styled(),
                style("exit_code").dim(),
                style(code).bold(),
            );
            eprintln!("{} {}", style("usage not recorded:").yellow().bold(), e);
        }
    }
    code
}
