//! The usage artifact file handed to the supervisor

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;

use rexe_core::{GuardError, Result};

use crate::usage::UsageRecord;

/// Location of the `rusage.txt` artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageArtifact {
    path: PathBuf,
}

impl UsageArtifact {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create or truncate the artifact and write `record` to it.
    pub fn write(&self, record: &UsageRecord) -> Result<()> {
        fs::write(&self.path, record.to_string()).map_err(|source| GuardError::ArtifactWrite {
            path: self.path.clone(),
            source,
        })
    }

    /// Read back the artifact. A missing file is `None`: the guarded process
    /// did not reach orderly teardown.
    pub fn read(&self) -> Result<Option<UsageRecord>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => content.parse().map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GuardError::Io(e)),
        }
    }

    /// Remove a stale artifact left by an earlier run
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed stale usage artifact {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GuardError::Io(e)),
        }
    }
}
