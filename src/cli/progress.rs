// src/cli/progress.rs — Terminal rendering for live turns and stored transcripts

use crate::engine::turn::{has_running, TurnProgress};
use crate::engine::types::{Message, Operation, OperationStatus, Role};
use crate::infra::session::Session;

/// Build a progress callback that writes operation updates to stderr.
///
/// All progress output goes to stderr so stdout carries only answers.
pub fn terminal_progress() -> impl Fn(TurnProgress) + Send + 'static {
    move |event| {
        if let Some(line) = progress_line(&event) {
            eprintln!("{}", line);
        }
    }
}

/// One stderr line per progress event. `None` for events printed elsewhere.
pub fn progress_line(event: &TurnProgress) -> Option<String> {
    match event {
        TurnProgress::Sent { .. } => Some("[coach] analyzing...".to_string()),
        TurnProgress::Operation { operation, .. } => Some(format!("[op] {}", operation_line(operation))),
        TurnProgress::SessionAssigned { session_id } => {
            Some(format!("[session] {}", session_id))
        }
        TurnProgress::FinalMessage { .. } | TurnProgress::Completed => None,
        TurnProgress::Failed { .. } => Some("[coach] turn ended with an error".to_string()),
    }
}

pub fn operation_line(op: &Operation) -> String {
    let marker = match op.status {
        OperationStatus::Running => "…",
        OperationStatus::Completed => "✓",
        OperationStatus::Failed => "✗",
    };
    match op.detail {
        Some(ref detail) => format!("{} {} ({}) {}: {}", marker, op.name, op.kind, op.status, detail),
        None => format!("{} {} ({}) {}", marker, op.name, op.kind, op.status),
    }
}

pub fn format_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "coach",
    };
    let mut out = format!("{}> {}", speaker, message.content);
    if let Some(ref ops) = message.operations {
        for op in ops {
            out.push_str(&format!("\n    {}", operation_line(op)));
        }
        if has_running(ops) {
            out.push_str("\n    (some steps never reported back)");
        }
    }
    if let Some(ref suggestions) = message.suggestions {
        for s in suggestions {
            out.push_str(&format!("\n    - {}", s));
        }
    }
    out
}

pub fn format_session(session: &Session, active: bool) -> String {
    let marker = if active { "*" } else { " " };
    let title = if session.title.is_empty() {
        "(untitled)"
    } else {
        session.title.as_str()
    };
    let mut line = format!(
        "{} {}  {:<40} {:>3} msgs  {}",
        marker,
        session.id,
        title,
        session.message_count,
        session.updated_at.format("%Y-%m-%d %H:%M"),
    );
    if !session.last_message_preview.is_empty() {
        line.push_str(&format!("\n      {}", session.last_message_preview));
    }
    line
}
