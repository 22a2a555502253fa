//! Resource kinds and the ceilings requested for them

use std::fmt;

use rexe_core::{GuardConfig, Result};

/// Resource classes the guard clamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Virtual address space (RLIMIT_AS), bytes
    AddressSpace,
    /// Data segment (RLIMIT_DATA), bytes
    DataSegment,
    /// Stack (RLIMIT_STACK), bytes
    Stack,
    /// CPU time (RLIMIT_CPU), seconds
    CpuTime,
}

impl ResourceKind {
    /// All kinds, in enforcement order
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::AddressSpace,
        ResourceKind::DataSegment,
        ResourceKind::Stack,
        ResourceKind::CpuTime,
    ];

    /// The rlimit constant name, used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::AddressSpace => "RLIMIT_AS",
            ResourceKind::DataSegment => "RLIMIT_DATA",
            ResourceKind::Stack => "RLIMIT_STACK",
            ResourceKind::CpuTime => "RLIMIT_CPU",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ResourceKind::CpuTime => "s",
            _ => "bytes",
        }
    }

    pub fn is_memory(&self) -> bool {
        !matches!(self, ResourceKind::CpuTime)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A requested ceiling for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimit {
    pub kind: ResourceKind,
    pub ceiling: u64,
}

/// The four limits derived from a [`GuardConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitPlan {
    limits: [ResourceLimit; 4],
}

impl LimitPlan {
    /// Memory kinds get `memory_limit_mib * 1024 * 1024` bytes, CPU time gets
    /// `time_limit_sec` unchanged.
    pub fn from_config(config: &GuardConfig) -> Result<Self> {
        config.validate()?;
        let bytes = config.memory_limit_bytes()?;
        let limits = ResourceKind::ALL.map(|kind| ResourceLimit {
            kind,
            ceiling: if kind.is_memory() {
                bytes
            } else {
                config.time_limit_sec
            },
        });
        Ok(Self { limits })
    }

    pub fn limits(&self) -> &[ResourceLimit] {
        &self.limits
    }

    pub fn ceiling(&self, kind: ResourceKind) -> u64 {
        self.limits
            .iter()
            .find(|limit| limit.kind == kind)
            .map(|limit| limit.ceiling)
            .unwrap_or_default()
    }
}
