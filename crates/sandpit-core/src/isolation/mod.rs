//! Process-level isolation for sandboxed children
//!
//! Everything here runs in the forked child between `fork` and `exec`:
//! - `namespace` - optional unshare of user/net/ipc/uts namespaces
//! - `limits` - rlimits (address space, CPU, file size, core dumps, nproc)
//!
//! The child also gets its own process group so the supervisor can kill the
//! whole tree on timeout.

pub mod limits;
pub mod namespace;

pub use self::limits::ResourceLimits;
pub use self::namespace::NamespaceConfig;

use tokio::process::Command;

/// Put the child in a fresh process group and apply namespaces and limits
/// before `exec`.
#[allow(unsafe_code)]
pub fn install(cmd: &mut Command, limits: ResourceLimits, namespaces: NamespaceConfig) {
    cmd.process_group(0);

    // SAFETY: the hook only issues unshare(2) and setrlimit(2), both
    // async-signal-safe, and performs no allocation.
    unsafe {
        cmd.pre_exec(move || {
            namespaces.enter()?;
            limits.apply()?;
            Ok(())
        });
    }
}
