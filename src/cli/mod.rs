// src/cli/mod.rs — CLI definition (clap derive)

pub mod chat;
pub mod conversations;
pub mod progress;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tradecoach", about = "Talk to your trading coach", version)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    /// API base URL (overrides config)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Suppress live operation progress (only print final answers)
    #[arg(long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive coach conversation (default)
    Chat,
    /// Ask one question in the active conversation and exit
    Ask {
        /// The question
        #[arg(trailing_var_arg = true, required = true)]
        message: Vec<String>,
        /// Start a new conversation for this question
        #[arg(long)]
        new: bool,
    },
    /// List stored conversations, most recent first
    List,
    /// Print a conversation's transcript
    Show {
        /// Conversation id (defaults to the active one)
        id: Option<String>,
    },
    /// Delete a conversation
    Delete {
        /// Conversation id
        id: String,
    },
}

use std::sync::Arc;

use crate::api::retry::RetryConfig;
use crate::api::{CoachApi, HttpCoachApi, RetryingApi};
use crate::coach::Coach;
use crate::infra::config::Config;
use crate::infra::session::FileSessionStore;

/// Wire the HTTP API, retry layer and durable session store into a [`Coach`].
pub fn build_coach(config: &Config, quiet: bool) -> anyhow::Result<Coach> {
    let http: Arc<dyn CoachApi> = Arc::new(HttpCoachApi::new(&config.api)?);
    let api: Arc<dyn CoachApi> = Arc::new(RetryingApi::with_config(
        http,
        RetryConfig::from(&config.retry),
    ));

    let store = FileSessionStore::default();
    tracing::debug!("Active session file: {}", store.path().display());
    let coach = Coach::new(api, Box::new(store))?
        .with_idle_timeout(config.stream.idle_timeout());

    Ok(if quiet {
        coach
    } else {
        coach.with_progress(progress::terminal_progress())
    })
}
