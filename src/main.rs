// ABOUTME: athenais binary: loads config, logs into Matrix, and runs the plugin-driven bot
// ABOUTME: Also offers a one-shot `prompt` command against the configured AI backend

use anyhow::{Context, Result};
use athenais::{
    config::Config,
    logging::{self, LogOptions},
    matrix_client, metrics, paths, plugins,
    transport::MatrixTransport,
};
use athenais_ai::{Completion, OpenAiClient};
use athenais_core::{Bot, BotError, Transport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "athenais", version, about = "Plugin-driven Matrix bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (overrides the default search path).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Also write logs to the data directory.
    #[arg(long, global = true, default_value_t = false)]
    log_file: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Matrix and run the bot (default when no subcommand is provided).
    Run,
    /// Send one prompt to the AI backend and print the reply.
    Prompt {
        /// Prompt text; multiple words are joined with spaces.
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = logging::init(&LogOptions {
        json: cli.json_logs,
        file_dir: cli.log_file.then(paths::log_dir),
    })?;

    let config = Config::load_from(cli.config.as_deref())?;
    tracing::info!(
        homeserver = %config.matrix.home_server,
        user_id = %config.matrix.user_id,
        rooms = config.matrix.rooms.len(),
        storage = ?config.storage.backend,
        openai = config.openai_config().is_some(),
        "Configuration loaded"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Prompt { text } => prompt(config, &text.join(" ")).await,
    }
}

fn completion_backend(config: &Config) -> Option<Arc<dyn Completion>> {
    config
        .openai_config()
        .map(|c| Arc::new(OpenAiClient::new(c)) as Arc<dyn Completion>)
}

async fn prompt(config: Config, text: &str) -> Result<()> {
    let completion = completion_backend(&config)
        .context("OpenAI API key is required (set openai.api_key or OPEN_AI_KEY)")?;
    let reply = completion
        .prompt(text)
        .await
        .context("Failed to generate response")?;
    println!("{}", reply);
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    if let Some(listen) = config.metrics_listen()? {
        metrics::init_metrics(listen)?;
    }

    let storage = config.storage_backend();
    let sync_store = storage.sync_store()?;

    let client = matrix_client::create_client(&config.matrix.home_server, &storage).await?;
    matrix_client::login(
        &client,
        &config.matrix.user_id,
        config.matrix.password.as_deref(),
        config.matrix.access_token.as_deref(),
        &config.matrix.device_name,
    )
    .await?;

    let transport: Arc<dyn Transport> =
        Arc::new(MatrixTransport::connect(client, sync_store).await?);

    let registry = plugins::default_registry(&config, completion_backend(&config))?;
    tracing::info!(plugins = ?registry.names(), "Plugins registered");

    let bot = Bot::new(transport, config.desired_rooms(), registry);

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C, shutting down");
                ctrl_c_token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    match bot.run(shutdown).await {
        Ok(()) | Err(BotError::Cancelled) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
