//! Terminal front-end for the credential gate.

use std::os::fd::AsFd;

use dialoguer::Password;
use nix::sys::termios::{self, SetArg, Termios};

use crate::gate::PromptReceiver;

/// Answer gate prompts from the terminal until the gate goes away.
///
/// Each read happens on a blocking thread so the runtime keeps running
/// while the user types. A failed or interrupted read cancels the prompt.
pub async fn serve_terminal(mut prompts: PromptReceiver) {
    while let Some(prompt) = prompts.next().await {
        let label = format!("[sudo] password to run `{}`", prompt.command());
        let read = tokio::task::spawn_blocking(move || Password::new().with_prompt(label).interact()).await;

        if prompt.is_abandoned() {
            tracing::debug!("Password arrived after the request gave up");
        }
        match read {
            Ok(Ok(secret)) => prompt.supply(secret),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Password read failed");
                prompt.cancel();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Password prompt task failed");
                prompt.cancel();
            }
        }
    }
}

/// Terminal settings captured before any password prompt.
///
/// A hidden read turns echo off until it returns. Exiting while one is still
/// blocked would leave the terminal that way, so callers restore this first.
pub struct TerminalState {
    saved: Option<Termios>,
}

impl TerminalState {
    /// Settings of stdin, if it is a terminal.
    pub fn capture() -> Self {
        Self::capture_from(std::io::stdin())
    }

    pub fn capture_from<Fd: AsFd>(fd: Fd) -> Self {
        Self {
            saved: termios::tcgetattr(fd).ok(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.saved.is_some()
    }

    pub fn restore(&self) {
        self.restore_to(std::io::stdin());
    }

    pub fn restore_to<Fd: AsFd>(&self, fd: Fd) {
        let Some(saved) = &self.saved else {
            return;
        };
        if let Err(e) = termios::tcsetattr(fd, SetArg::TCSANOW, saved) {
            tracing::debug!(error = %e, "Failed to restore terminal settings");
        }
    }
}
