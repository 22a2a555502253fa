//! OS facade for resource limits and self-usage
//!
//! The limit table and usage counters are process-wide OS state. The guard
//! only reaches them through these traits so enforcement and reporting can be
//! exercised against a fake process.

use std::time::Duration;

use log::trace;
use nix::libc::rlim_t;
use nix::sys::resource::{self, Resource, UsageWho};

use rexe_core::{GuardError, Result};

use crate::resource::ResourceKind;

/// A soft/hard ceiling pair as the OS reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ceiling {
    pub soft: u64,
    pub hard: u64,
}

impl Ceiling {
    /// Soft and hard set to the same value, which leaves no room to raise it later
    pub fn pinned(value: u64) -> Self {
        Self {
            soft: value,
            hard: value,
        }
    }

    pub fn is_pinned_at(&self, value: u64) -> bool {
        self.soft == value && self.hard == value
    }
}

/// Whose usage to sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsageScope {
    /// The calling process (RUSAGE_SELF)
    #[default]
    SelfProcess,
    /// Terminated and reaped descendants (RUSAGE_CHILDREN)
    Children,
}

/// Usage counters as reported by the OS, before normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawUsage {
    /// Cumulative user CPU time
    pub user_time: Duration,
    /// Peak resident set size, in the platform's `ru_maxrss` unit
    pub max_rss: i64,
}

/// Unit the platform uses for `ru_maxrss`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RssUnit {
    Kibibytes,
    Bytes,
}

impl RssUnit {
    /// Linux and the BSDs report kibibytes; Apple platforms report bytes.
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    pub const HOST: RssUnit = RssUnit::Bytes;
    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    pub const HOST: RssUnit = RssUnit::Kibibytes;

    /// Normalize a raw `ru_maxrss` value to kibibytes
    pub fn to_kib(self, raw: i64) -> f64 {
        let raw = raw.max(0) as f64;
        match self {
            RssUnit::Kibibytes => raw,
            RssUnit::Bytes => raw / 1024.0,
        }
    }
}

/// Read and write access to a process's resource limit table
pub trait ProcessLimits {
    fn set_limit(&mut self, kind: ResourceKind, ceiling: Ceiling) -> Result<()>;
    fn limit(&self, kind: ResourceKind) -> Result<Ceiling>;
}

/// Access to a process's cumulative resource usage counters
pub trait ProcessUsage {
    fn usage(&self, scope: UsageScope) -> Result<RawUsage>;
}

/// The calling process, through setrlimit/getrlimit/getrusage
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProcess;

fn resource_of(kind: ResourceKind) -> Resource {
    match kind {
        ResourceKind::AddressSpace => Resource::RLIMIT_AS,
        ResourceKind::DataSegment => Resource::RLIMIT_DATA,
        ResourceKind::Stack => Resource::RLIMIT_STACK,
        ResourceKind::CpuTime => Resource::RLIMIT_CPU,
    }
}

fn to_rlim(kind: ResourceKind, value: u64) -> Result<rlim_t> {
    rlim_t::try_from(value).map_err(|_| {
        GuardError::Syscall(format!(
            "setrlimit({}) failed: {} does not fit rlim_t",
            kind.name(),
            value
        ))
    })
}

impl ProcessLimits for HostProcess {
    fn set_limit(&mut self, kind: ResourceKind, ceiling: Ceiling) -> Result<()> {
        let soft = to_rlim(kind, ceiling.soft)?;
        let hard = to_rlim(kind, ceiling.hard)?;
        resource::setrlimit(resource_of(kind), soft, hard).map_err(|errno| {
            GuardError::Syscall(format!(
                "setrlimit({}) failed: {}",
                kind.name(),
                std::io::Error::from(errno)
            ))
        })
    }

    fn limit(&self, kind: ResourceKind) -> Result<Ceiling> {
        let (soft, hard) = resource::getrlimit(resource_of(kind)).map_err(|errno| {
            GuardError::Syscall(format!(
                "getrlimit({}) failed: {}",
                kind.name(),
                std::io::Error::from(errno)
            ))
        })?;
        // rlim_t is only 32 bits on 32-bit Linux; elsewhere this is a no-op.
        #[allow(clippy::useless_conversion)]
        let ceiling = Ceiling {
            soft: u64::from(soft),
            hard: u64::from(hard),
        };
        Ok(ceiling)
    }
}

impl ProcessUsage for HostProcess {
    fn usage(&self, scope: UsageScope) -> Result<RawUsage> {
        let who = match scope {
            UsageScope::SelfProcess => UsageWho::RUSAGE_SELF,
            UsageScope::Children => UsageWho::RUSAGE_CHILDREN,
        };
        let usage = resource::getrusage(who).map_err(|errno| {
            GuardError::Syscall(format!("getrusage failed: {}", std::io::Error::from(errno)))
        })?;

        let utime = usage.user_time();
        let secs = u64::try_from(utime.tv_sec()).unwrap_or(0);
        let micros = u64::try_from(utime.tv_usec()).unwrap_or(0);
        // ru_maxrss is a c_long, 32 bits wide on 32-bit targets.
        #[allow(clippy::useless_conversion)]
        let raw = RawUsage {
            user_time: Duration::from_secs(secs) + Duration::from_micros(micros),
            max_rss: i64::from(usage.max_rss()),
        };
        trace!("getrusage({:?}) = {:?}", scope, raw);
        Ok(raw)
    }
}
