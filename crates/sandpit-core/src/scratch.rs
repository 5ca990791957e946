//! Scratch units: one private directory and source file per submission
//!
//! A [`ScratchUnit`] owns `<scratch dir>/<uuid>/main<suffix>`. The unit
//! directory doubles as the child's working directory, so a submission never
//! sees another one's files through relative paths. Dropping the unit removes
//! the directory, so every exit path of an execution (return, `?`, panic
//! unwinding, a cancelled future) releases it.

use crate::{Result, SandpitError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirBuilder, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug)]
pub struct ScratchUnit {
    dir: PathBuf,
    path: PathBuf,
}

impl ScratchUnit {
    /// Create `dir` if missing, allocate a fresh unit in it and write `code`.
    ///
    /// The unit directory is named by a v4 UUID and created non-recursively
    /// with mode 0700, and the file is opened with `create_new`, so two
    /// submissions can never end up sharing a unit.
    pub async fn create(dir: &Path, suffix: &str, code: &str) -> Result<Self> {
        // create_dir_all treats a concurrent creator winning the race as success.
        fs::create_dir_all(dir).await.map_err(SandpitError::Scratch)?;

        let unit_dir = dir.join(Uuid::new_v4().simple().to_string());
        DirBuilder::new()
            .mode(0o700)
            .create(&unit_dir)
            .await
            .map_err(SandpitError::Scratch)?;

        // Owned from here on: any failure below still removes the directory.
        let unit = Self {
            path: unit_dir.join(format!("main{suffix}")),
            dir: unit_dir,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&unit.path)
            .await
            .map_err(SandpitError::Scratch)?;

        file.write_all(code.as_bytes())
            .await
            .map_err(SandpitError::Scratch)?;
        file.flush().await.map_err(SandpitError::Scratch)?;

        tracing::trace!(path = %unit.path.display(), bytes = code.len(), "scratch unit written");
        Ok(unit)
    }

    /// Source file handed to the interpreter
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Private directory holding the source file
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for ScratchUnit {
    fn drop(&mut self) {
        // The child may have left files of its own next to the source.
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => tracing::trace!(dir = %self.dir.display(), "scratch unit released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                dir = %self.dir.display(),
                error = %e,
                "failed to remove scratch unit"
            ),
        }
    }
}
