//! In-memory process for exercising the guard without touching real limits

use std::collections::HashMap;
use std::time::Duration;

use rexe_core::{GuardError, Result};

use crate::host::{Ceiling, ProcessLimits, ProcessUsage, RawUsage, UsageScope};
use crate::resource::ResourceKind;

/// A process whose limit table and usage counters are plain data
#[derive(Debug, Clone, Default)]
pub struct FakeProcess {
    table: HashMap<ResourceKind, Ceiling>,
    /// Kinds whose read-back is replaced with this ceiling
    misreport: HashMap<ResourceKind, Ceiling>,
    /// Kinds whose setrlimit fails
    refuse: Vec<ResourceKind>,
    /// Every kind passed to `set_limit`, in call order
    pub applied: Vec<ResourceKind>,
    pub self_usage: RawUsage,
    pub children_usage: RawUsage,
    pub fail_usage: bool,
}

impl FakeProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `ceiling` for `kind` regardless of what was set
    pub fn misreport(mut self, kind: ResourceKind, ceiling: Ceiling) -> Self {
        self.misreport.insert(kind, ceiling);
        self
    }

    /// Make `set_limit(kind, ..)` fail
    pub fn refuse(mut self, kind: ResourceKind) -> Self {
        self.refuse.push(kind);
        self
    }

    pub fn with_usage(mut self, user_time: Duration, max_rss: i64) -> Self {
        self.self_usage = RawUsage { user_time, max_rss };
        self
    }

    pub fn with_children_usage(mut self, user_time: Duration, max_rss: i64) -> Self {
        self.children_usage = RawUsage { user_time, max_rss };
        self
    }
}

impl ProcessLimits for FakeProcess {
    fn set_limit(&mut self, kind: ResourceKind, ceiling: Ceiling) -> Result<()> {
        self.applied.push(kind);
        if self.refuse.contains(&kind) {
            return Err(GuardError::Syscall(format!(
                "setrlimit({}) failed: Operation not permitted",
                kind.name()
            )));
        }
        self.table.insert(kind, ceiling);
        Ok(())
    }

    fn limit(&self, kind: ResourceKind) -> Result<Ceiling> {
        if let Some(ceiling) = self.misreport.get(&kind) {
            return Ok(*ceiling);
        }
        Ok(self
            .table
            .get(&kind)
            .copied()
            .unwrap_or(Ceiling::pinned(u64::MAX)))
    }
}

impl ProcessUsage for FakeProcess {
    fn usage(&self, scope: UsageScope) -> Result<RawUsage> {
        if self.fail_usage {
            return Err(GuardError::Syscall("getrusage failed".to_string()));
        }
        Ok(match scope {
            UsageScope::SelfProcess => self.self_usage,
            UsageScope::Children => self.children_usage,
        })
    }
}
