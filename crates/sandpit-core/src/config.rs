//! Sandbox configuration

use crate::isolation::{NamespaceConfig, ResourceLimits};
use crate::screen::DEFAULT_DENYLIST;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the execution core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter invoked as `interpreter <scratch file>`
    pub interpreter: PathBuf,

    /// Directory holding scratch units, created on demand
    pub scratch_dir: PathBuf,

    /// File suffix for scratch units
    pub scratch_suffix: String,

    /// Wall-clock bound for a single child process
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Maximum number of children running at once
    pub max_concurrent: usize,

    /// Maximum number of submissions waiting for admission
    pub max_queued: usize,

    /// Largest accepted submission in bytes
    pub max_code_bytes: usize,

    /// Bytes kept per output stream; the rest is drained and dropped
    pub max_output_bytes: usize,

    /// Top-level module names rejected by the screener
    pub denylist: Vec<String>,

    /// rlimits applied to the child before exec
    pub limits: ResourceLimits,

    /// Namespaces unshared by the child before exec
    pub namespaces: NamespaceConfig,

    /// Environment variables (the child environment is cleared first)
    pub env: Vec<(String, String)>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("/usr/bin/python3"),
            scratch_dir: std::env::temp_dir().join("sandpit"),
            scratch_suffix: ".py".into(),
            timeout: Duration::from_secs(10),
            max_concurrent: 4,
            max_queued: 64,
            max_code_bytes: 64 * 1024,
            max_output_bytes: 1024 * 1024,
            denylist: DEFAULT_DENYLIST.iter().map(|s| (*s).to_string()).collect(),
            limits: ResourceLimits::default(),
            namespaces: NamespaceConfig::default(),
            env: vec![
                ("PATH".into(), "/usr/bin:/bin".into()),
                ("HOME".into(), "/tmp".into()),
                ("TMPDIR".into(), "/tmp".into()),
                ("PYTHONDONTWRITEBYTECODE".into(), "1".into()),
                ("PYTHONUNBUFFERED".into(), "1".into()),
            ],
        }
    }
}

impl SandboxConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }

    /// Reject settings that would make every submission fail
    pub fn validate(&self) -> crate::Result<()> {
        if self.timeout.is_zero() {
            return Err(crate::SandpitError::Config("timeout must be non-zero".into()));
        }
        if self.max_concurrent == 0 {
            return Err(crate::SandpitError::Config(
                "max_concurrent must be at least 1".into(),
            ));
        }
        if self.max_code_bytes == 0 {
            return Err(crate::SandpitError::Config(
                "max_code_bytes must be at least 1".into(),
            ));
        }
        if self.interpreter.as_os_str().is_empty() {
            return Err(crate::SandpitError::Config("interpreter is empty".into()));
        }
        Ok(())
    }

    /// Limits as applied to the child. An unset CPU limit becomes the
    /// timeout rounded up to whole seconds, plus one.
    #[must_use]
    pub fn effective_limits(&self) -> ResourceLimits {
        let mut limits = self.limits;
        if limits.cpu_secs.is_none() {
            let secs = self.timeout.as_secs() + u64::from(self.timeout.subsec_nanos() > 0);
            limits.cpu_secs = Some(secs.saturating_add(1));
        }
        limits
    }
}

/// Builder for SandboxConfig
#[derive(Debug, Default)]
pub struct SandboxConfigBuilder {
    config: SandboxConfig,
}

impl SandboxConfigBuilder {
    #[must_use]
    pub fn interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.interpreter = path.into();
        self
    }

    #[must_use]
    pub fn scratch_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = path.into();
        self
    }

    #[must_use]
    pub fn scratch_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.scratch_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.config.timeout = duration;
        self
    }

    #[must_use]
    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    #[must_use]
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.config.max_concurrent = n;
        self
    }

    #[must_use]
    pub fn max_queued(mut self, n: usize) -> Self {
        self.config.max_queued = n;
        self
    }

    #[must_use]
    pub fn max_code_bytes(mut self, n: usize) -> Self {
        self.config.max_code_bytes = n;
        self
    }

    #[must_use]
    pub fn max_output_bytes(mut self, n: usize) -> Self {
        self.config.max_output_bytes = n;
        self
    }

    #[must_use]
    pub fn deny(mut self, module: impl Into<String>) -> Self {
        self.config.denylist.push(module.into());
        self
    }

    #[must_use]
    pub fn denylist<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.denylist = modules.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.config.limits = limits;
        self
    }

    #[must_use]
    pub fn memory_limit_mb(mut self, mb: u64) -> Self {
        self.config.limits.address_space = Some(mb * 1024 * 1024);
        self
    }

    #[must_use]
    pub fn namespaces(mut self, namespaces: NamespaceConfig) -> Self {
        self.config.namespaces = namespaces;
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn build(self) -> SandboxConfig {
        self.config
    }
}

/// Get default socket path from SANDPIT_SOCKET env var or system default
///
/// Returns:
/// - `$SANDPIT_SOCKET` if set (for development)
/// - `/run/sandpit/sandpit.sock` otherwise (production)
pub fn default_socket_path() -> PathBuf {
    std::env::var("SANDPIT_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/sandpit/sandpit.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.denylist.iter().any(|m| m == "subprocess"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = SandboxConfig::builder()
            .interpreter("/bin/sh")
            .timeout_secs(2)
            .max_concurrent(8)
            .denylist(["forbidden"])
            .build();

        assert_eq!(config.interpreter, PathBuf::from("/bin/sh"));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.denylist, vec!["forbidden".to_string()]);
    }

    #[test]
    fn test_cpu_limit_follows_timeout() {
        let config = SandboxConfig::builder().timeout_secs(60).build();
        assert_eq!(config.effective_limits().cpu_secs, Some(61));

        let config = SandboxConfig::builder()
            .timeout(Duration::from_millis(300))
            .build();
        assert_eq!(config.effective_limits().cpu_secs, Some(2));

        assert_eq!(SandboxConfig::default().effective_limits().cpu_secs, Some(11));
    }

    #[test]
    fn test_explicit_cpu_limit_wins() {
        let limits = ResourceLimits {
            cpu_secs: Some(3),
            ..ResourceLimits::default()
        };
        let config = SandboxConfig::builder()
            .timeout_secs(60)
            .limits(limits)
            .build();
        assert_eq!(config.effective_limits().cpu_secs, Some(3));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = SandboxConfig::builder().max_concurrent(0).build();
        assert!(matches!(
            config.validate(),
            Err(crate::SandpitError::Config(_))
        ));
    }
}
