// src/cli/chat.rs — Interactive REPL

use std::fmt;

use crate::cli::progress::{format_message, format_session};
use crate::coach::Coach;
use crate::engine::turn::TurnEnd;
use crate::infra::session::Session;

const HELP: &str = "\
  /new            start a new conversation
  /list           list saved conversations
  /switch [id]    switch conversation (picker when no id)
  /delete <id>    delete a conversation
  /history        print the current transcript
  /status         show the active conversation
  /quit           exit";

/// Run the interactive coach REPL.
pub async fn run_chat(coach: &mut Coach) -> anyhow::Result<()> {
    eprintln!(
        "tradecoach v{} | conversation {} | /help for commands\n",
        env!("CARGO_PKG_VERSION"),
        coach.active_session_id(),
    );
    if coach.transcript().is_fresh() {
        if let Some(welcome) = coach.transcript().last() {
            println!("{}\n", format_message(welcome));
        }
    } else {
        eprintln!(
            "  Resuming conversation ({} messages). /history to print it.\n",
            coach.transcript().len()
        );
    }

    let mut turns = 0u32;

    while let Some(input) = read_input() {
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" || trimmed == "/quit" {
            break;
        }

        if trimmed.starts_with('/') {
            handle_slash_command(trimmed, coach).await;
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        // Ctrl-C drops the send future, which closes the stream.
        let result = {
            let send = coach.send(trimmed);
            tokio::select! {
                r = send => Some(r),
                _ = tokio::signal::ctrl_c() => None,
            }
        };

        match result {
            None => match coach.abort_turn() {
                Some(outcome) if outcome.is_completed() => {
                    println!("{}\n", outcome.message.content);
                    turns += 1;
                }
                _ => eprintln!("[cancelled]"),
            },
            Some(Ok(outcome)) => {
                println!("{}\n", outcome.message.content);
                match outcome.end {
                    TurnEnd::Completed => turns += 1,
                    TurnEnd::Rejected { .. } => {}
                    TurnEnd::TransportFailed { error } => eprintln!("[error] {}", error),
                }
            }
            Some(Err(e)) => eprintln!("[error] {}", e),
        }
    }

    eprintln!(
        "\nSession total: {} completed turn(s) in {}",
        turns,
        coach.active_session_id()
    );
    Ok(())
}

fn read_input() -> Option<String> {
    use std::io::{self, BufRead, Write};

    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line),
        Err(_) => None,
    }
}

struct SessionChoice(Session);

impl fmt::Display for SessionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.0.title.is_empty() {
            "(untitled)"
        } else {
            self.0.title.as_str()
        };
        write!(
            f,
            "{:<40} {}  {}",
            title,
            self.0.updated_at.format("%Y-%m-%d %H:%M"),
            self.0.id
        )
    }
}

async fn handle_slash_command(input: &str, coach: &mut Coach) {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" => eprintln!("{}", HELP),

        "/status" => {
            eprintln!("  Conversation: {}", coach.active_session_id());
            eprintln!("  Messages: {}", coach.transcript().len());
        }

        "/new" => match coach.create_conversation() {
            Ok(id) => {
                eprintln!("  Started conversation {}", id);
                if let Some(welcome) = coach.transcript().last() {
                    println!("{}\n", format_message(welcome));
                }
            }
            Err(e) => eprintln!("  Could not start a conversation: {}", e),
        },

        "/list" => match coach.list_conversations().await {
            Ok(sessions) if sessions.is_empty() => eprintln!("  No saved conversations yet."),
            Ok(sessions) => {
                for s in &sessions {
                    eprintln!("{}", format_session(s, s.id == coach.active_session_id()));
                }
            }
            Err(e) => eprintln!("  Could not list conversations: {}", e),
        },

        "/switch" => {
            let id = if arg.is_empty() {
                match pick_conversation(coach).await {
                    Some(id) => id,
                    None => return,
                }
            } else {
                arg.to_string()
            };
            match coach.load_conversation(&id).await {
                Ok(()) => {
                    eprintln!("  Switched to {}", id);
                    for m in coach.transcript().messages() {
                        println!("{}\n", format_message(m));
                    }
                }
                Err(e) => eprintln!("  Could not load {}: {}", id, e),
            }
        }

        "/delete" => {
            if arg.is_empty() {
                eprintln!("  Usage: /delete <id>");
                return;
            }
            let was_active = arg == coach.active_session_id();
            match coach.delete_conversation(arg).await {
                Ok(()) => {
                    eprintln!("  Deleted {}", arg);
                    if was_active {
                        eprintln!("  Started new conversation {}", coach.active_session_id());
                    }
                }
                Err(e) => eprintln!("  Could not delete {}: {}", arg, e),
            }
        }

        "/history" => {
            for m in coach.transcript().messages() {
                println!("{}\n", format_message(m));
            }
        }

        _ => eprintln!("  Unknown command: {}. Try /help", cmd),
    }
}

async fn pick_conversation(coach: &Coach) -> Option<String> {
    let sessions = match coach.list_conversations().await {
        Ok(s) if s.is_empty() => {
            eprintln!("  No saved conversations yet.");
            return None;
        }
        Ok(s) => s,
        Err(e) => {
            eprintln!("  Could not list conversations: {}", e);
            return None;
        }
    };

    let options: Vec<SessionChoice> = sessions.into_iter().map(SessionChoice).collect();
    match inquire::Select::new("Conversation:", options).prompt() {
        Ok(choice) => Some(choice.0.id),
        Err(_) => None,
    }
}
