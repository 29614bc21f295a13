// src/main.rs — tradecoach entry point

use clap::Parser;

use tradecoach::cli::{self, Cli, Commands};
use tradecoach::infra::config::Config;
use tradecoach::infra::{logger, paths};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let mut config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };
    if let Some(ref base_url) = cli.base_url {
        config.api.base_url = base_url.clone();
    }

    // Initialize logging (respects RUST_LOG)
    logger::init_logging(&config.log.level);

    paths::ensure_dirs().await?;

    let mut coach = cli::build_coach(&config, cli.quiet)?;
    tracing::debug!(
        "Using {} with conversation {}",
        config.api.base_url,
        coach.active_session_id()
    );

    match cli.command {
        None | Some(Commands::Chat) => cli::chat::run_chat(&mut coach).await,
        Some(Commands::Ask { message, new }) => {
            cli::conversations::run_ask(&mut coach, &message.join(" "), new).await
        }
        Some(Commands::List) => cli::conversations::run_list(&coach).await,
        Some(Commands::Show { id }) => {
            cli::conversations::run_show(&mut coach, id.as_deref()).await
        }
        Some(Commands::Delete { id }) => cli::conversations::run_delete(&mut coach, &id).await,
    }
}
