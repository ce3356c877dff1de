//! Attempt results and the broker's final outcome.

use serde::Serialize;

/// Captured output of a command that ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl CommandOutput {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            stderr: String::new(),
        }
    }
}

/// How a command that did run ended unsuccessfully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub stderr: String,
}

impl ExitInfo {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code)?,
            (None, Some(sig)) => write!(f, "killed by signal {}", sig)?,
            (None, None) => write!(f, "unknown exit status")?,
        }
        if let Some(line) = self.stderr.lines().find(|l| !l.trim().is_empty()) {
            write!(f, ": {}", line.trim())?;
        }
        Ok(())
    }
}

/// The result of one mechanism invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Success(CommandOutput),
    Denied,
    Unavailable,
    CredentialRejected,
    CommandFailed(ExitInfo),
}

/// Why a `run` call did not produce output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Elevation was denied by policy")]
    Denied,
    #[error("No elevation mechanism is available")]
    NoElevationMechanism,
    #[error("The password was rejected")]
    CredentialRejected,
    #[error("Password prompt was cancelled")]
    UserCancelled,
    #[error("Command failed with {0}")]
    CommandFailed(ExitInfo),
}

impl FailureReason {
    /// Process exit status the CLI reports for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            FailureReason::Denied => 5,
            FailureReason::NoElevationMechanism => 4,
            FailureReason::CredentialRejected => 3,
            FailureReason::UserCancelled => 130,
            FailureReason::CommandFailed(info) => info.code.filter(|c| *c != 0).unwrap_or(1),
        }
    }
}

/// Final result of one `run` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum ElevationOutcome {
    Ok(CommandOutput),
    Failed(FailureReason),
}

impl ElevationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ElevationOutcome::Ok(_))
    }

    pub fn into_result(self) -> Result<CommandOutput, FailureReason> {
        match self {
            ElevationOutcome::Ok(output) => Ok(output),
            ElevationOutcome::Failed(reason) => Err(reason),
        }
    }
}
