//! Spawning elevation tools and capturing what they print.

use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::outcome::{CommandOutput, ExitInfo};

/// What came back from a spawned elevation tool.
#[derive(Debug)]
pub(crate) struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn into_output(self) -> CommandOutput {
        CommandOutput {
            lines: self.stdout.lines().map(String::from).collect(),
            stderr: self.stderr,
        }
    }

    pub fn into_exit_info(self) -> ExitInfo {
        ExitInfo {
            code: self.status.code(),
            signal: signal_of(&self.status),
            stderr: self.stderr,
        }
    }
}

/// Run `cmd` to completion. When `stdin` is given it is written once and
/// the pipe is closed; otherwise stdin is null.
pub(crate) async fn capture(mut cmd: Command, stdin: Option<&[u8]>) -> std::io::Result<Captured> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });

    let mut child = cmd.spawn()?;

    if let (Some(payload), Some(mut pipe)) = (stdin, child.stdin.take()) {
        // The tool may exit before reading (e.g. no sudo rights); a broken pipe is not our error.
        match pipe.write_all(payload).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Err(e) => return Err(e),
        }
        drop(pipe);
    }

    let output = child.wait_with_output().await?;
    Ok(Captured {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}
