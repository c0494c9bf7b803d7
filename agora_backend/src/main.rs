use agora_backend::api;
use agora_backend::bootstrap;
use agora_backend::config::AgoraConfig;
use agora_backend::telemetry;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "Agora forum backend")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Create the data directories and database, then exit
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();
    let config = AgoraConfig::from_env()?;
    let resources = bootstrap::initialize(&config)?;
    tracing::info!(
        base = %config.paths.base.display(),
        created = ?resources.directories_created,
        database_initialized = resources.database_initialized,
        "bootstrap complete"
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!(port = config.api_port, "starting Agora HTTP server");
            api::serve_http(config, resources.database).await
        }
        Command::Init => Ok(()),
    }
}
