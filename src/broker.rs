//! The elevation broker: policy first, then one password attempt.

use std::sync::Arc;
use std::time::Duration;

use crate::command::ElevatedCommand;
use crate::config::Settings;
use crate::gate::{CredentialGate, GateResponse};
use crate::mechanism::{CredentialMechanism, PkexecMechanism, PolicyMechanism, SudoMechanism};
use crate::outcome::{AttemptResult, ElevationOutcome, FailureReason};

/// Runs one command per [`ElevationBroker::run`] call.
///
/// Holds no per-call state, so a single broker can serve concurrent runs;
/// they only meet at the gate, which queues their prompts.
pub struct ElevationBroker {
    policy: Arc<dyn PolicyMechanism>,
    credential: Arc<dyn CredentialMechanism>,
    gate: CredentialGate,
}

impl ElevationBroker {
    pub fn new(
        policy: Arc<dyn PolicyMechanism>,
        credential: Arc<dyn CredentialMechanism>,
        gate: CredentialGate,
    ) -> Self {
        Self {
            policy,
            credential,
            gate,
        }
    }

    /// pkexec and sudo as configured.
    pub fn from_settings(settings: &Settings, gate: CredentialGate) -> Self {
        Self::new(
            Arc::new(PkexecMechanism::from_settings(&settings.policy)),
            Arc::new(SudoMechanism::from_settings(&settings.credential)),
            gate,
        )
    }

    pub fn gate(&self) -> &CredentialGate {
        &self.gate
    }

    #[tracing::instrument(skip_all, fields(program = %command.program(), args = command.args().len()))]
    pub async fn run(&self, command: &ElevatedCommand) -> ElevationOutcome {
        match self.policy.execute(command).await {
            AttemptResult::Success(output) => {
                tracing::info!(mechanism = self.policy.name(), "Elevated via policy");
                return ElevationOutcome::Ok(output);
            }
            AttemptResult::CommandFailed(info) => {
                tracing::info!(mechanism = self.policy.name(), %info, "Command failed under policy elevation");
                return ElevationOutcome::Failed(FailureReason::CommandFailed(info));
            }
            AttemptResult::Denied | AttemptResult::CredentialRejected => {
                tracing::info!(mechanism = self.policy.name(), "Policy denied, falling back to password");
            }
            AttemptResult::Unavailable => {
                tracing::info!(mechanism = self.policy.name(), "Policy mechanism unavailable, falling back to password");
            }
        }

        let credential = match self.gate.request(command).await {
            GateResponse::Credential(c) => c,
            GateResponse::Cancelled => {
                tracing::info!("Password prompt cancelled");
                return ElevationOutcome::Failed(FailureReason::UserCancelled);
            }
        };

        let result = self.credential.execute(command, &credential).await;
        drop(credential);

        let outcome = match result {
            AttemptResult::Success(output) => ElevationOutcome::Ok(output),
            AttemptResult::CredentialRejected => ElevationOutcome::Failed(FailureReason::CredentialRejected),
            AttemptResult::Unavailable => ElevationOutcome::Failed(FailureReason::NoElevationMechanism),
            AttemptResult::CommandFailed(info) => ElevationOutcome::Failed(FailureReason::CommandFailed(info)),
            AttemptResult::Denied => ElevationOutcome::Failed(FailureReason::Denied),
        };
        match &outcome {
            ElevationOutcome::Ok(_) => tracing::info!(mechanism = self.credential.name(), "Elevated via password"),
            ElevationOutcome::Failed(reason) => {
                tracing::info!(mechanism = self.credential.name(), %reason, "Password elevation failed")
            }
        }
        outcome
    }

    /// [`ElevationBroker::run`] bounded by an optional deadline.
    ///
    /// A command already handed to a mechanism keeps running after the
    /// deadline; only the wait is abandoned.
    pub async fn run_with_timeout(
        &self,
        command: &ElevatedCommand,
        timeout: Option<Duration>,
    ) -> Result<ElevationOutcome, BrokerError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(command))
                .await
                .map_err(|_| BrokerError::TimedOut(limit)),
            None => Ok(self.run(command).await),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Timed out after {0:?}")]
    TimedOut(Duration),
}
