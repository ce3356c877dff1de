//! The command a caller wants to run with elevated rights.

use std::fmt;
use std::path::Path;

use serde::Serialize;

/// An executable plus its arguments. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElevatedCommand {
    program: String,
    args: Vec<String>,
}

impl ElevatedCommand {
    /// Build a command, rejecting an empty program and embedded NUL bytes.
    pub fn new<P, I, A>(program: P, args: I) -> Result<Self, CommandError>
    where
        P: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(CommandError::EmptyProgram);
        }
        if program.contains('\0') {
            return Err(CommandError::NulByte(program));
        }

        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if let Some(bad) = args.iter().find(|a| a.contains('\0')) {
            return Err(CommandError::NulByte(bad.clone()));
        }

        Ok(Self { program, args })
    }

    /// `ls -la <dir>`, the listing the tool exists for.
    pub fn list_directory(dir: &Path) -> Result<Self, CommandError> {
        Self::new("ls", ["-la".to_string(), dir.to_string_lossy().into_owned()])
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ElevatedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command has an empty program name")]
    EmptyProgram,
    #[error("Command contains a NUL byte: {0:?}")]
    NulByte(String),
}
