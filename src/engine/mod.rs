// src/engine/mod.rs — Streaming turn engine: ledger, transcript, state machine

pub mod ledger;
pub mod transcript;
pub mod turn;
pub mod types;

pub use ledger::OperationLedger;
pub use transcript::Transcript;
pub use turn::{TurnEnd, TurnEngine, TurnOutcome, TurnPhase, TurnProgress};
pub use types::{Message, Operation, OperationStatus, Role};
