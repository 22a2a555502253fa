//! rexe-core: shared types, errors, and configuration for rexe-guard
//!
//! This crate provides the foundational types used by the other rexe crates:
//! - Error types and Result alias
//! - Guard configuration (memory/CPU ceilings, usage artifact location)
//! - Utility functions (memory size parsing)

pub mod config;
pub mod error;
pub mod util;

pub use config::GuardConfig;
pub use error::{GuardError, Result};
