//! Polkit elevation through pkexec.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use super::{locate, PolicyMechanism};
use crate::command::ElevatedCommand;
use crate::config::MechanismSettings;
use crate::exec::{capture, Captured};
use crate::outcome::AttemptResult;

/// pkexec exits with this when the authentication dialog was dismissed.
const EXIT_DISMISSED: i32 = 126;
/// pkexec exits with this when the caller is not authorized.
const EXIT_NOT_AUTHORIZED: i32 = 127;
/// pkexec prefixes its own refusals with this. A command that exits 126/127
/// by itself does not print it.
const REFUSAL_MARKER: &str = "Error executing command as another user";

#[derive(Debug, Clone)]
pub struct PkexecMechanism {
    program: Option<PathBuf>,
}

impl PkexecMechanism {
    pub fn from_settings(settings: &MechanismSettings) -> Self {
        Self {
            program: locate(&settings.program, settings.enabled),
        }
    }

    /// Resolved path to pkexec, if it is available and enabled.
    pub fn program(&self) -> Option<&PathBuf> {
        self.program.as_ref()
    }
}

#[async_trait]
impl PolicyMechanism for PkexecMechanism {
    fn name(&self) -> &str {
        "pkexec"
    }

    #[tracing::instrument(skip_all, fields(program = %command.program()))]
    async fn execute(&self, command: &ElevatedCommand) -> AttemptResult {
        let Some(pkexec) = &self.program else {
            tracing::debug!("pkexec not found or disabled");
            return AttemptResult::Unavailable;
        };

        // No internal agent and no stdin: polkit may authorize, but we never type a password here.
        let mut cmd = Command::new(pkexec);
        cmd.arg("--disable-internal-agent")
            .arg(command.program())
            .args(command.args());

        match capture(cmd, None).await {
            Ok(captured) => classify(captured),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to launch pkexec");
                AttemptResult::Unavailable
            }
        }
    }
}

fn classify(captured: Captured) -> AttemptResult {
    if captured.status.success() {
        return AttemptResult::Success(captured.into_output());
    }
    let refused = matches!(captured.code(), Some(EXIT_DISMISSED) | Some(EXIT_NOT_AUTHORIZED))
        && captured.stderr.lines().any(|l| l.starts_with(REFUSAL_MARKER));
    if refused {
        tracing::debug!(code = ?captured.code(), "pkexec refused authorization");
        return AttemptResult::Denied;
    }
    AttemptResult::CommandFailed(captured.into_exit_info())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn captured(raw_code: i32, stdout: &str) -> Captured {
        Captured {
            status: ExitStatus::from_raw(raw_code << 8),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn refused(raw_code: i32, reason: &str) -> Captured {
        Captured {
            stderr: format!("{}: {}\n", REFUSAL_MARKER, reason),
            ..captured(raw_code, "")
        }
    }

    #[test]
    fn success_splits_lines() {
        match classify(captured(0, "a\nb\n")) {
            AttemptResult::Success(out) => assert_eq!(out.lines, ["a", "b"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn refusals_are_denied() {
        assert_eq!(classify(refused(126, "Request dismissed")), AttemptResult::Denied);
        assert_eq!(classify(refused(127, "Not authorized")), AttemptResult::Denied);
    }

    #[test]
    fn command_exiting_127_is_a_command_failure() {
        match classify(captured(127, "")) {
            AttemptResult::CommandFailed(info) => assert_eq!(info.code, Some(127)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn other_codes_are_command_failures() {
        match classify(captured(2, "")) {
            AttemptResult::CommandFailed(info) => assert_eq!(info.code, Some(2)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn disabled_is_unavailable() {
        let mech = PkexecMechanism::from_settings(&MechanismSettings {
            program: "pkexec".to_string(),
            enabled: false,
        });
        assert!(mech.program().is_none());
    }
}
