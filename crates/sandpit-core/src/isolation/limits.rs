//! rlimit configuration for sandboxed children

use nix::sys::resource::{Resource, setrlimit};
use serde::{Deserialize, Serialize};

/// Resource limits set with setrlimit(2) inside the child.
///
/// `None` leaves the inherited limit untouched, except for `cpu_secs`: the
/// sandbox fills that in from its wall-clock timeout
/// (see [`crate::SandboxConfig::effective_limits`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Virtual address space in bytes (RLIMIT_AS)
    pub address_space: Option<u64>,
    /// CPU time in seconds (RLIMIT_CPU), timeout + 1 when unset
    pub cpu_secs: Option<u64>,
    /// Largest file the child may write, in bytes (RLIMIT_FSIZE)
    pub file_size: Option<u64>,
    /// Maximum processes for the real user (RLIMIT_NPROC)
    pub max_processes: Option<u64>,
    /// Disable core dumps (RLIMIT_CORE = 0)
    pub no_core_dumps: bool,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            address_space: Some(256 * 1024 * 1024), // 256MB
            cpu_secs: None,
            file_size: Some(16 * 1024 * 1024),
            max_processes: None,
            no_core_dumps: true,
        }
    }
}

impl ResourceLimits {
    /// No limits beyond the CPU bound derived from the timeout
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            address_space: None,
            cpu_secs: None,
            file_size: None,
            max_processes: None,
            no_core_dumps: false,
        }
    }

    /// Apply to the calling process. Only meant to run in a pre-exec hook.
    pub fn apply(&self) -> nix::Result<()> {
        if let Some(bytes) = self.address_space {
            setrlimit(Resource::RLIMIT_AS, bytes, bytes)?;
        }
        if let Some(secs) = self.cpu_secs {
            // Soft limit delivers SIGXCPU, the hard limit one second later SIGKILL.
            setrlimit(Resource::RLIMIT_CPU, secs, secs.saturating_add(1))?;
        }
        if let Some(bytes) = self.file_size {
            setrlimit(Resource::RLIMIT_FSIZE, bytes, bytes)?;
        }
        if let Some(n) = self.max_processes {
            setrlimit(Resource::RLIMIT_NPROC, n, n)?;
        }
        if self.no_core_dumps {
            setrlimit(Resource::RLIMIT_CORE, 0, 0)?;
        }
        Ok(())
    }
}
