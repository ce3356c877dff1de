//! rootls - privileged directory listing
//!
//! Runs commands with elevated rights: polkit (pkexec) first, then a single
//! password attempt through sudo, with every failure classified.

pub mod broker;
pub mod command;
pub mod config;
pub mod credential;
pub mod elevation;
mod exec;
pub mod gate;
pub mod mechanism;
pub mod outcome;
pub mod prompt;

pub use broker::{BrokerError, ElevationBroker};
pub use command::{CommandError, ElevatedCommand};
pub use config::{ConfigError, MechanismSettings, Settings};
pub use credential::Credential;
pub use gate::{CredentialGate, GateResponse, GateState, PendingPrompt, PromptReceiver};
pub use mechanism::{CredentialMechanism, PkexecMechanism, PolicyMechanism, SudoMechanism};
pub use outcome::{AttemptResult, CommandOutput, ElevationOutcome, ExitInfo, FailureReason};
