// src/cli/conversations.rs — One-shot commands: ask, list, show, delete

use crate::cli::progress::{format_message, format_session};
use crate::coach::Coach;
use crate::engine::turn::TurnEnd;

pub async fn run_ask(coach: &mut Coach, message: &str, new: bool) -> anyhow::Result<()> {
    if new {
        coach.create_conversation()?;
    }

    let outcome = coach.send(message).await?;
    println!("{}", outcome.message.content);
    match outcome.end {
        TurnEnd::Completed => Ok(()),
        TurnEnd::Rejected { reason } => Err(anyhow::anyhow!("analysis failed: {}", reason)),
        TurnEnd::TransportFailed { error } => Err(anyhow::anyhow!("connection failed: {}", error)),
    }
}

pub async fn run_list(coach: &Coach) -> anyhow::Result<()> {
    let sessions = coach.list_conversations().await?;
    if sessions.is_empty() {
        eprintln!("No saved conversations yet.");
        return Ok(());
    }
    for s in &sessions {
        println!("{}", format_session(s, s.id == coach.active_session_id()));
    }
    Ok(())
}

pub async fn run_show(coach: &mut Coach, id: Option<&str>) -> anyhow::Result<()> {
    let id = match id {
        Some(id) => id.to_string(),
        None => coach.active_session_id().to_string(),
    };
    coach.load_conversation(&id).await?;
    for m in coach.transcript().messages() {
        println!("{}\n", format_message(m));
    }
    Ok(())
}

pub async fn run_delete(coach: &mut Coach, id: &str) -> anyhow::Result<()> {
    let was_active = id == coach.active_session_id();
    coach.delete_conversation(id).await?;
    eprintln!("Deleted {}", id);
    if was_active {
        eprintln!("Started new conversation {}", coach.active_session_id());
    }
    Ok(())
}
