//! Linux namespace isolation

use nix::sched::CloneFlags;
use serde::{Deserialize, Serialize};

/// Namespaces unshared by the child before exec.
///
/// All off by default. `net`, `ipc` and `uts` need either root or `user`
/// alongside them; without privileges the launch fails and the submission is
/// reported as a system error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Create new user namespace
    pub user: bool,
    /// Create new network namespace (no interfaces but loopback, which is down)
    pub net: bool,
    /// Create new IPC namespace
    pub ipc: bool,
    /// Create new UTS namespace
    pub uts: bool,
}

impl NamespaceConfig {
    /// Every supported namespace
    #[must_use]
    pub const fn all() -> Self {
        Self {
            user: true,
            net: true,
            ipc: true,
            uts: true,
        }
    }

    /// Convert to nix CloneFlags
    #[must_use]
    pub fn to_clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();

        if self.user {
            flags |= CloneFlags::CLONE_NEWUSER;
        }
        if self.net {
            flags |= CloneFlags::CLONE_NEWNET;
        }
        if self.ipc {
            flags |= CloneFlags::CLONE_NEWIPC;
        }
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }

        flags
    }

    /// Enter new namespaces using unshare. No-op when none are enabled.
    pub fn enter(&self) -> nix::Result<()> {
        let flags = self.to_clone_flags();
        if flags.is_empty() {
            return Ok(());
        }
        nix::sched::unshare(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(NamespaceConfig::default().to_clone_flags().is_empty());
        assert!(NamespaceConfig::default().enter().is_ok());
    }

    #[test]
    fn test_flags() {
        let flags = NamespaceConfig {
            user: true,
            net: true,
            ..NamespaceConfig::default()
        }
        .to_clone_flags();
        assert!(flags.contains(CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNET));
        assert!(!flags.contains(CloneFlags::CLONE_NEWIPC));
        assert_eq!(NamespaceConfig::all().to_clone_flags().bits().count_ones(), 4);
    }
}
