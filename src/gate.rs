//! The credential gate: where the broker waits for a caller-supplied password.
//!
//! [`CredentialGate::request`] hands a [`PendingPrompt`] to whoever holds the
//! [`PromptReceiver`] (a terminal, a dialog, a test) and suspends until the
//! prompt is answered with [`PendingPrompt::supply`] or [`PendingPrompt::cancel`].
//!
//! Only one prompt is outstanding at a time. Concurrent requests queue and
//! are served in arrival order. A prompt whose request was abandoned (timed
//! out or dropped) is never handed out by [`PromptReceiver::next`].

use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::command::ElevatedCommand;
use crate::credential::Credential;

/// Lifecycle of a single prompt.
///
/// `Resolved` and `Cancelled` stay visible until the next request takes its
/// turn. A request abandoned mid-prompt returns the gate to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Prompting,
    Resolved,
    Cancelled,
}

/// What a request produced.
#[derive(Debug)]
pub enum GateResponse {
    Credential(Credential),
    Cancelled,
}

pub struct CredentialGate {
    prompts: mpsc::Sender<PendingPrompt>,
    turn: Mutex<()>,
    state: watch::Sender<GateState>,
}

impl CredentialGate {
    /// Create a gate and the receiving end a front-end drains.
    pub fn new() -> (Self, PromptReceiver) {
        let (tx, rx) = mpsc::channel(1);
        let (state, _) = watch::channel(GateState::Idle);
        let gate = Self {
            prompts: tx,
            turn: Mutex::new(()),
            state,
        };
        (gate, PromptReceiver { rx })
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    /// Ask the front-end for a password for `command`.
    ///
    /// Resolves `Cancelled` if the prompt is cancelled or dropped, or if the
    /// front-end has gone away.
    pub async fn request(&self, command: &ElevatedCommand) -> GateResponse {
        let _turn = self.turn.lock().await;
        let guard = StateGuard::enter(&self.state);

        let (reply_tx, reply_rx) = oneshot::channel();
        let prompt = PendingPrompt {
            command: command.to_string(),
            reply: reply_tx,
        };

        if self.prompts.send(prompt).await.is_err() {
            tracing::debug!("no prompt front-end attached");
            guard.finish(GateState::Cancelled);
            return GateResponse::Cancelled;
        }

        match reply_rx.await {
            Ok(Some(credential)) => {
                guard.finish(GateState::Resolved);
                GateResponse::Credential(credential)
            }
            Ok(None) | Err(_) => {
                guard.finish(GateState::Cancelled);
                GateResponse::Cancelled
            }
        }
    }
}

/// Sets `Prompting` on entry. Dropped without [`StateGuard::finish`] (the
/// request future went away mid-prompt) it returns the gate to `Idle`.
struct StateGuard<'a> {
    state: &'a watch::Sender<GateState>,
    finished: bool,
}

impl<'a> StateGuard<'a> {
    fn enter(state: &'a watch::Sender<GateState>) -> Self {
        state.send_replace(GateState::Prompting);
        Self { state, finished: false }
    }

    fn finish(mut self, terminal: GateState) {
        self.state.send_replace(terminal);
        self.finished = true;
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.send_replace(GateState::Idle);
        }
    }
}

/// Receiving side of the gate, owned by the prompt front-end.
pub struct PromptReceiver {
    rx: mpsc::Receiver<PendingPrompt>,
}

impl PromptReceiver {
    /// Next prompt to answer. `None` once the gate is dropped.
    ///
    /// Prompts whose requester has already given up are skipped.
    pub async fn next(&mut self) -> Option<PendingPrompt> {
        loop {
            let prompt = self.rx.recv().await?;
            if prompt.is_abandoned() {
                tracing::debug!(command = %prompt.command, "Skipping abandoned prompt");
                continue;
            }
            return Some(prompt);
        }
    }
}

/// An outstanding password request. Dropping it cancels the request.
#[derive(Debug)]
pub struct PendingPrompt {
    command: String,
    reply: oneshot::Sender<Option<Credential>>,
}

impl PendingPrompt {
    /// The command the password is for, for display.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// True once the request this prompt answers has been dropped. A front-end
    /// already showing the prompt can use this to dismiss it.
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    pub fn supply(self, secret: impl Into<String>) {
        // If the requester gave up, the credential comes back here and is wiped on drop.
        let _ = self.reply.send(Some(Credential::new(secret)));
    }

    pub fn cancel(self) {
        let _ = self.reply.send(None);
    }
}
