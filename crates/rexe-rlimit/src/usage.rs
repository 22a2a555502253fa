//! Usage sampling and the `rusage.txt` record format
//!
//! The record is one line, `<cpuTimeMillis>,<peakMemoryKiB>`, both plain
//! decimals. Downstream tooling parses it positionally, so field order and
//! units are fixed.

use std::fmt;
use std::str::FromStr;

use log::info;

use rexe_core::{GuardError, Result};

use crate::artifact::UsageArtifact;
use crate::host::{ProcessUsage, RawUsage, RssUnit, UsageScope};

/// CPU time and peak memory consumed, as written to the usage artifact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageRecord {
    /// User CPU time in milliseconds
    pub cpu_time_millis: f64,
    /// Peak resident set size in kibibytes
    pub peak_memory_kib: f64,
}

impl UsageRecord {
    pub fn new(cpu_time_millis: f64, peak_memory_kib: f64) -> Self {
        Self {
            cpu_time_millis,
            peak_memory_kib,
        }
    }

    pub fn from_raw(raw: &RawUsage, unit: RssUnit) -> Self {
        Self {
            cpu_time_millis: raw.user_time.as_micros() as f64 / 1000.0,
            peak_memory_kib: unit.to_kib(raw.max_rss),
        }
    }
}

// Whole numbers keep one fractional digit so the field always reads as a float.
fn write_decimal(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_finite() && value.fract() == 0.0 {
        write!(f, "{:.1}", value)
    } else {
        write!(f, "{}", value)
    }
}

impl fmt::Display for UsageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_decimal(f, self.cpu_time_millis)?;
        f.write_str(",")?;
        write_decimal(f, self.peak_memory_kib)
    }
}

fn parse_field(name: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw.parse().map_err(|_| {
        GuardError::MalformedArtifact(format!("{} is not a number: {:?}", name, raw))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(GuardError::MalformedArtifact(format!(
            "{} must be a finite non-negative number, got {}",
            name, raw
        )));
    }
    Ok(value)
}

impl FromStr for UsageRecord {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        let line = s.strip_suffix('\n').unwrap_or(s);
        let mut fields = line.split(',');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(cpu), Some(mem), None) => Ok(Self {
                cpu_time_millis: parse_field("cpu time", cpu)?,
                peak_memory_kib: parse_field("peak memory", mem)?,
            }),
            _ => Err(GuardError::MalformedArtifact(format!(
                "expected exactly two comma-separated fields, got {:?}",
                line
            ))),
        }
    }
}

/// Samples usage counters and persists them to the usage artifact
#[derive(Debug, Clone)]
pub struct UsageReporter {
    artifact: UsageArtifact,
    scope: UsageScope,
    unit: RssUnit,
}

impl UsageReporter {
    pub fn new(artifact: UsageArtifact) -> Self {
        Self {
            artifact,
            scope: UsageScope::SelfProcess,
            unit: RssUnit::HOST,
        }
    }

    pub fn scope(mut self, scope: UsageScope) -> Self {
        self.scope = scope;
        self
    }

    /// Override the `ru_maxrss` unit (defaults to the host's)
    pub fn rss_unit(mut self, unit: RssUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn artifact(&self) -> &UsageArtifact {
        &self.artifact
    }

    pub fn sample<U: ProcessUsage + ?Sized>(&self, usage: &U) -> Result<UsageRecord> {
        let raw = usage.usage(self.scope)?;
        Ok(UsageRecord::from_raw(&raw, self.unit))
    }

    /// Sample and overwrite the artifact
    pub fn report<U: ProcessUsage + ?Sized>(&self, usage: &U) -> Result<UsageRecord> {
        let record = self.sample(usage)?;
        self.artifact.write(&record)?;
        info!(
            "Usage reported to {}: cpu={}ms peak={}KiB",
            self.artifact.path().display(),
            record.cpu_time_millis,
            record.peak_memory_kib
        );
        Ok(record)
    }
}
