// src/engine/turn.rs — Per-turn state machine
//
// Idle → Sent on submit, Sent → Streaming on the first operation,
// → Finalizing on final_message, → Idle on done. error and transport
// failures return to Idle from any state.

use std::time::Duration;

use futures::StreamExt;

use super::ledger::OperationLedger;
use super::transcript::Transcript;
use super::types::{Message, Operation, OperationStatus};
use crate::api::{AnalysisRequest, CoachApi};
use crate::infra::errors::CoachError;
use crate::stream::{self, Frame, StreamEvent};

/// Placeholder content after a transport failure.
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "Sorry, I couldn't complete the analysis. Please try again.";

/// Synthesized error when the stream goes quiet past the idle timeout.
pub const TIMEOUT_MESSAGE: &str = "The analysis timed out.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Sent,
    Streaming,
    Finalizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEnd {
    Completed,
    /// The far end sent an `error` event. A normal outcome, not a crash.
    Rejected { reason: String },
    TransportFailed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// The resolved assistant message as it stands in the transcript.
    pub message: Message,
    /// Session id assigned by the server during the turn, if any.
    pub session_id: Option<String>,
    pub end: TurnEnd,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.end, TurnEnd::Completed)
    }
}

/// Live notifications for renderers.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnProgress {
    Sent { placeholder_id: String },
    Operation { operation: Operation, index: usize },
    FinalMessage { content: String },
    SessionAssigned { session_id: String },
    Completed,
    Failed { content: String },
}

pub type ProgressFn = Box<dyn Fn(TurnProgress) + Send>;

/// Owns the transcript and drives one turn at a time against it.
///
/// The placeholder and the ledger belong to the in-flight turn; nothing else
/// writes to them until the turn returns to Idle.
pub struct TurnEngine {
    transcript: Transcript,
    ledger: OperationLedger,
    phase: TurnPhase,
    placeholder_id: Option<String>,
    assigned_session: Option<String>,
    activity: Option<Operation>,
    outcome: Option<TurnOutcome>,
    progress: Option<ProgressFn>,
}

impl Default for TurnEngine {
    fn default() -> Self {
        Self::new(Transcript::fresh())
    }
}

impl TurnEngine {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            ledger: OperationLedger::new(),
            phase: TurnPhase::Idle,
            placeholder_id: None,
            assigned_session: None,
            activity: None,
            outcome: None,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: impl Fn(TurnProgress) + Send + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn ledger(&self) -> &OperationLedger {
        &self.ledger
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_input_locked(&self) -> bool {
        self.phase != TurnPhase::Idle
    }

    /// The operation currently shown as "in progress", if any.
    pub fn activity(&self) -> Option<&Operation> {
        self.activity.as_ref()
    }

    pub fn placeholder_id(&self) -> Option<&str> {
        self.placeholder_id.as_deref()
    }

    /// Swap the whole transcript. Refused while a turn is in flight.
    pub fn replace_transcript(&mut self, transcript: Transcript) -> Result<(), CoachError> {
        if self.is_input_locked() {
            return Err(CoachError::TurnInFlight);
        }
        self.transcript = transcript;
        self.ledger.clear();
        self.activity = None;
        Ok(())
    }

    /// Idle → Sent. Appends the user message and an empty placeholder.
    pub fn begin_turn(&mut self, text: &str) -> Result<String, CoachError> {
        if self.is_input_locked() {
            return Err(CoachError::TurnInFlight);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(CoachError::EmptyMessage);
        }

        self.ledger.clear();
        self.activity = None;
        self.assigned_session = None;
        self.outcome = None;

        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id.clone();
        self.transcript.push(Message::user(text));
        self.transcript.push(placeholder);
        self.placeholder_id = Some(placeholder_id.clone());
        self.phase = TurnPhase::Sent;

        self.emit(TurnProgress::Sent {
            placeholder_id: placeholder_id.clone(),
        });
        Ok(placeholder_id)
    }

    /// Route one event. Events arriving while Idle are ignored.
    pub fn apply(&mut self, event: StreamEvent) -> Flow {
        if self.phase == TurnPhase::Idle {
            tracing::debug!("Ignoring event with no turn in flight: {:?}", event);
            return Flow::Stop;
        }

        match event {
            StreamEvent::Operation(op) => {
                tracing::debug!("operation {} ({}) {}", op.name, op.kind, op.status);
                let index = self.ledger.upsert(op.clone());
                self.activity = self.ledger.running().last().cloned();
                if self.phase == TurnPhase::Sent {
                    self.phase = TurnPhase::Streaming;
                }
                let snapshot = self.ledger.snapshot();
                self.update_placeholder(|m| m.operations = Some(snapshot));
                self.emit(TurnProgress::Operation {
                    operation: op,
                    index,
                });
                Flow::Continue
            }
            StreamEvent::FinalMessage {
                message,
                session_id,
            } => {
                self.update_placeholder(|m| m.content = message.clone());
                self.phase = TurnPhase::Finalizing;
                self.emit(TurnProgress::FinalMessage { content: message });
                if let Some(id) = session_id {
                    self.assigned_session = Some(id.clone());
                    self.emit(TurnProgress::SessionAssigned { session_id: id });
                }
                Flow::Continue
            }
            StreamEvent::Done => {
                // Completion is authoritative over lingering running entries.
                self.close(TurnEnd::Completed);
                Flow::Stop
            }
            StreamEvent::Error { message } => {
                tracing::warn!("Analysis reported an error: {}", message);
                self.update_placeholder(|m| m.content = message.clone());
                self.close(TurnEnd::Rejected { reason: message });
                Flow::Stop
            }
            StreamEvent::Unknown(kind) => {
                tracing::debug!("Ignoring unknown event type '{}'", kind);
                Flow::Continue
            }
        }
    }

    /// Dispatch every payload of a frame in order. Malformed payloads are skipped.
    pub fn apply_frame(&mut self, frame: &Frame) -> Flow {
        for payload in &frame.payloads {
            match StreamEvent::parse(payload) {
                Ok(event) => {
                    if self.apply(event) == Flow::Stop {
                        return Flow::Stop;
                    }
                }
                Err(e) => tracing::warn!("Skipping frame: {}", e),
            }
        }
        Flow::Continue
    }

    /// Any state → Idle with the fixed failure message.
    pub fn fail_transport(&mut self, error: &CoachError) {
        if !self.is_input_locked() {
            return;
        }
        tracing::warn!("Analysis stream failed: {}", error);
        self.update_placeholder(|m| m.content = TRANSPORT_FAILURE_MESSAGE.to_string());
        self.close(TurnEnd::TransportFailed {
            error: error.to_string(),
        });
    }

    /// Stream closed by the far end. Without `done`, a delivered final
    /// message still completes the turn; otherwise it is a dropped connection.
    pub fn end_of_stream(&mut self) {
        match self.phase {
            TurnPhase::Idle => {}
            TurnPhase::Finalizing => {
                tracing::debug!("Stream ended after final message without done");
                self.close(TurnEnd::Completed);
            }
            TurnPhase::Sent | TurnPhase::Streaming => {
                self.fail_transport(&CoachError::Transport {
                    message: "stream ended before the analysis finished".into(),
                    retriable: false,
                });
            }
        }
    }

    /// Abandon the in-flight turn (teardown, navigation, Ctrl-C).
    ///
    /// A final message that already arrived is kept and the turn counts as
    /// completed, same as a stream that ends without `done`.
    pub fn abort(&mut self) {
        if self.phase == TurnPhase::Finalizing {
            tracing::debug!("Turn cancelled after final message, keeping the answer");
            self.close(TurnEnd::Completed);
            return;
        }
        self.fail_transport(&CoachError::Transport {
            message: "turn cancelled".into(),
            retriable: false,
        });
    }

    pub fn take_outcome(&mut self) -> Option<TurnOutcome> {
        self.outcome.take()
    }

    /// Run a whole turn: open the stream, decode, dispatch until it ends.
    ///
    /// Only pre-flight problems (a turn already running, an empty message)
    /// are errors; everything after the send resolves to a [`TurnOutcome`].
    pub async fn run(
        &mut self,
        api: &dyn CoachApi,
        session_id: &str,
        text: &str,
        idle_timeout: Option<Duration>,
    ) -> Result<TurnOutcome, CoachError> {
        self.begin_turn(text)?;

        let request = AnalysisRequest {
            message: text.trim().to_string(),
            session_id: session_id.to_string(),
        };

        match api.open_analysis(&request).await {
            Ok(bytes) => {
                let mut frames = stream::frames(bytes);
                loop {
                    let next = match idle_timeout {
                        Some(limit) => match tokio::time::timeout(limit, frames.next()).await {
                            Ok(next) => next,
                            Err(_) => {
                                tracing::warn!("No data for {:?}, closing stream", limit);
                                self.apply(StreamEvent::Error {
                                    message: TIMEOUT_MESSAGE.to_string(),
                                });
                                break;
                            }
                        },
                        None => frames.next().await,
                    };

                    match next {
                        Some(Ok(frame)) => {
                            if self.apply_frame(&frame) == Flow::Stop {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            self.fail_transport(&e);
                            break;
                        }
                        None => {
                            self.end_of_stream();
                            break;
                        }
                    }
                }
                // Dropping the frame stream closes the transport.
                drop(frames);
            }
            Err(e) => self.fail_transport(&e),
        }

        self.take_outcome().ok_or_else(|| {
            CoachError::Other(anyhow::anyhow!("turn ended without an outcome"))
        })
    }

    fn update_placeholder(&mut self, edit: impl FnOnce(&mut Message)) {
        let Some(id) = self.placeholder_id.as_deref() else {
            return;
        };
        let Some(current) = self.transcript.get(id) else {
            return;
        };
        let mut next = current.clone();
        edit(&mut next);
        self.transcript.replace(id, next);
    }

    fn close(&mut self, end: TurnEnd) {
        let message = self
            .placeholder_id
            .take()
            .and_then(|id| self.transcript.get(&id).cloned());

        self.phase = TurnPhase::Idle;
        self.ledger.clear();
        self.activity = None;

        match &end {
            TurnEnd::Completed => self.emit(TurnProgress::Completed),
            TurnEnd::Rejected { .. } | TurnEnd::TransportFailed { .. } => {
                let content = message
                    .as_ref()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                self.emit(TurnProgress::Failed { content });
            }
        }

        if let Some(message) = message {
            self.outcome = Some(TurnOutcome {
                message,
                session_id: self.assigned_session.take(),
                end,
            });
        }
    }

    fn emit(&self, event: TurnProgress) {
        if let Some(ref cb) = self.progress {
            cb(event);
        }
    }
}

/// Whether any operation in the snapshot is still marked running.
pub fn has_running(operations: &[Operation]) -> bool {
    operations
        .iter()
        .any(|o| o.status == OperationStatus::Running)
}
