//! Utility functions for guard configuration

use crate::error::{GuardError, Result};

const MIB: u64 = 1024 * 1024;

/// Parse memory size string (e.g., "100M", "1G") into bytes
pub fn parse_memory_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('G') {
        (n, 1024u64 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, MIB)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1024u64)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1u64)
    } else {
        (s.as_str(), 1u64)
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| GuardError::InvalidConfig(format!("Invalid memory size: {}", s)))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| GuardError::InvalidConfig(format!("Memory size overflow: {}", s)))
}

/// Parse a memory ceiling into whole mebibytes.
///
/// A bare number is already mebibytes. Suffixed sizes must be a whole number
/// of mebibytes, since the guard only accepts MiB-granular ceilings.
pub fn parse_memory_mib(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed
            .parse()
            .map_err(|_| GuardError::InvalidConfig(format!("Invalid memory size: {}", s)));
    }

    let bytes = parse_memory_size(trimmed)?;
    if bytes % MIB != 0 {
        return Err(GuardError::InvalidConfig(format!(
            "Memory size {} is not a whole number of MiB",
            trimmed
        )));
    }
    Ok(bytes / MIB)
}

/// Convert a mebibyte ceiling to bytes, rejecting overflow
pub fn mib_to_bytes(mib: u64) -> Result<u64> {
    mib.checked_mul(MIB)
        .ok_or_else(|| GuardError::InvalidConfig(format!("Memory limit overflow: {} MiB", mib)))
}
