//! Elevation mechanisms the broker can drive.
//!
//! The broker only sees these traits; [`PkexecMechanism`] and
//! [`SudoMechanism`] are the OS-backed implementations.

mod pkexec;
mod sudo;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::command::ElevatedCommand;
use crate::credential::Credential;
use crate::outcome::AttemptResult;

pub use pkexec::PkexecMechanism;
pub use sudo::SudoMechanism;

/// Policy-based elevation: authorized without asking for a password.
///
/// Expected results: `Success`, `Denied`, `Unavailable`, `CommandFailed`.
#[async_trait]
pub trait PolicyMechanism: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, command: &ElevatedCommand) -> AttemptResult;
}

/// Password-based elevation.
///
/// Expected results: `Success`, `CredentialRejected`, `Unavailable`, `CommandFailed`.
#[async_trait]
pub trait CredentialMechanism: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, command: &ElevatedCommand, credential: &Credential) -> AttemptResult;
}

/// Locate an elevation tool, honoring the enabled flag.
pub(crate) fn locate(program: &str, enabled: bool) -> Option<PathBuf> {
    if !enabled || program.trim().is_empty() {
        return None;
    }
    which::which(program).ok()
}
