//! Probes of the current process's privileges.

/// Returns true if the current process already runs as root.
pub fn is_elevated() -> bool {
    nix::unistd::Uid::effective().is_root()
}
