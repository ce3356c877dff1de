//! Password elevation through sudo.
//!
//! sudo is first asked to run the command non-interactively (`-n`) with a
//! null stdin. Only when it answers that a password is required does a second
//! invocation read the password from stdin (`-S`). A NOPASSWD rule therefore
//! never hands the password line to the elevated command.
//!
//! The password never appears in argv, the environment, a shell string or a file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::{locate, CredentialMechanism};
use crate::command::ElevatedCommand;
use crate::config::MechanismSettings;
use crate::credential::Credential;
use crate::exec::{capture, Captured};
use crate::outcome::AttemptResult;

/// sudo's own failures (bad password, not permitted) exit with 1.
const EXIT_SUDO_FAILURE: i32 = 1;

/// Printed by `sudo -n` when the rule needs a password.
const PASSWORD_REQUIRED: &str = "a password is required";

const REJECTED_MARKERS: &[&str] = &[
    "Sorry, try again",
    "incorrect password",
    "no password was provided",
    "Authentication failure",
    PASSWORD_REQUIRED,
];

const NOT_PERMITTED_MARKERS: &[&str] = &[
    "is not in the sudoers file",
    "is not allowed to execute",
    "may not run sudo",
];

#[derive(Debug, Clone)]
pub struct SudoMechanism {
    program: Option<PathBuf>,
    user: Option<String>,
}

impl SudoMechanism {
    pub fn from_settings(settings: &MechanismSettings) -> Self {
        Self {
            program: locate(&settings.program, settings.enabled),
            user: current_user(),
        }
    }

    /// Resolved path to sudo, if it is available and enabled.
    pub fn program(&self) -> Option<&PathBuf> {
        self.program.as_ref()
    }

    fn base_command(sudo: &Path, flags: &[&str], command: &ElevatedCommand) -> Command {
        // -k ignores cached credentials so the supplied password is what gets checked.
        // LC_ALL=C keeps sudo's messages in the form classify() expects.
        let mut cmd = Command::new(sudo);
        cmd.args(flags)
            .arg("--")
            .arg(command.program())
            .args(command.args())
            .env("LC_ALL", "C");
        cmd
    }
}

#[async_trait]
impl CredentialMechanism for SudoMechanism {
    fn name(&self) -> &str {
        "sudo"
    }

    #[tracing::instrument(skip_all, fields(program = %command.program()))]
    async fn execute(&self, command: &ElevatedCommand, credential: &Credential) -> AttemptResult {
        let Some(sudo) = &self.program else {
            tracing::debug!("sudo not found or disabled");
            return AttemptResult::Unavailable;
        };
        let user = self.user.as_deref();

        let probe = Self::base_command(sudo, &["-n", "-k"], command);
        let captured = match capture(probe, None).await {
            Ok(captured) => captured,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to launch sudo");
                return AttemptResult::Unavailable;
            }
        };
        if !needs_password(&captured) {
            tracing::debug!("sudo ran without a password");
            return classify(captured, user);
        }

        let cmd = Self::base_command(sudo, &["-S", "-k", "-p", ""], command);
        let line = credential.as_line();
        match capture(cmd, Some(line.as_slice())).await {
            Ok(captured) => classify(captured, user),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to launch sudo");
                AttemptResult::Unavailable
            }
        }
    }
}

fn current_user() -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::Uid::current())
        .ok()
        .flatten()
        .map(|u| u.name)
}

/// Lines sudo itself wrote, with the `sudo: ` prefix removed.
///
/// The elevated command shares stderr with sudo, so only lines in sudo's own
/// shapes are considered.
fn sudo_lines<'a>(stderr: &'a str, user: Option<&'a str>) -> impl Iterator<Item = &'a str> + 'a {
    stderr.lines().filter_map(move |line| {
        if let Some(rest) = line.strip_prefix("sudo: ") {
            return Some(rest);
        }
        if line.starts_with("Sorry, try again.") {
            return Some(line);
        }
        let user = user?;
        let not_permitted = line.starts_with(&format!("{} is not in the sudoers file", user))
            || line.starts_with(&format!("Sorry, user {} ", user));
        not_permitted.then_some(line)
    })
}

fn sudo_failed(captured: &Captured) -> bool {
    captured.code() == Some(EXIT_SUDO_FAILURE)
}

fn needs_password(captured: &Captured) -> bool {
    sudo_failed(captured) && sudo_lines(&captured.stderr, None).any(|l| l.contains(PASSWORD_REQUIRED))
}

fn classify(captured: Captured, user: Option<&str>) -> AttemptResult {
    if captured.status.success() {
        return AttemptResult::Success(captured.into_output());
    }
    if sudo_failed(&captured) {
        let own: Vec<&str> = sudo_lines(&captured.stderr, user).collect();
        let mentions = |markers: &[&str]| own.iter().any(|l| markers.iter().any(|m| l.contains(m)));
        if mentions(REJECTED_MARKERS) {
            tracing::debug!("sudo rejected the password");
            return AttemptResult::CredentialRejected;
        }
        if mentions(NOT_PERMITTED_MARKERS) {
            tracing::debug!("sudo does not permit this user");
            return AttemptResult::Unavailable;
        }
    }
    AttemptResult::CommandFailed(captured.into_exit_info())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn failed(code: i32, stderr: &str) -> Captured {
        Captured {
            status: ExitStatus::from_raw(code << 8),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn wrong_password_is_rejected() {
        let captured = failed(1, "Sorry, try again.\nsudo: 1 incorrect password attempt\n");
        assert_eq!(classify(captured, Some("alice")), AttemptResult::CredentialRejected);
    }

    #[test]
    fn not_in_sudoers_is_unavailable() {
        let captured = failed(1, "alice is not in the sudoers file.  This incident will be reported.\n");
        assert_eq!(classify(captured, Some("alice")), AttemptResult::Unavailable);

        let captured = failed(1, "Sorry, user alice is not allowed to execute '/bin/ls' as root on host.\n");
        assert_eq!(classify(captured, Some("alice")), AttemptResult::Unavailable);
    }

    #[test]
    fn plain_failure_is_the_command() {
        match classify(failed(1, "ls: cannot access '/nope': No such file or directory\n"), Some("alice")) {
            AttemptResult::CommandFailed(info) => {
                assert_eq!(info.code, Some(1));
                assert!(info.stderr.contains("/nope"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn command_stderr_is_not_read_as_sudo() {
        let captured = failed(1, "mysql: Authentication failure for user app\nincorrect password\n");
        assert!(matches!(classify(captured, Some("alice")), AttemptResult::CommandFailed(_)));
    }

    #[test]
    fn unrelated_sudo_warning_does_not_hide_command_failure() {
        let captured = failed(1, "sudo: unable to resolve host box: Name or service not known\nboom\n");
        assert!(matches!(classify(captured, Some("alice")), AttemptResult::CommandFailed(_)));
    }

    #[test]
    fn sudo_lines_need_exit_status_one() {
        let captured = failed(2, "sudo: 1 incorrect password attempt\n");
        assert!(matches!(classify(captured, Some("alice")), AttemptResult::CommandFailed(_)));
    }

    #[test]
    fn password_required_is_detected() {
        assert!(needs_password(&failed(1, "sudo: a password is required\n")));
        assert!(!needs_password(&failed(1, "app: a password is required\n")));
        assert!(!needs_password(&failed(0, "")));
    }
}
