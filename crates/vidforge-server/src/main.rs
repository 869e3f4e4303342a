use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use vidforge_core::config::AppConfig;
use vidforge_core::http::HttpServer;
use vidforge_core::{AppCore, GenerationJob, JobStatus};

#[derive(Parser)]
#[command(name = "vidforge", version, about = "Browser-driven video generation service")]
struct Cli {
    /// Port for the HTTP listener
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Production mode: headless browser, system Chromium
    #[arg(long)]
    production: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service (default)
    Serve,
    /// Drive one generation end-to-end and print the downloaded path
    Run {
        /// Prompt describing the video
        #[arg(long)]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing logger
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vidforge_core=debug".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::default();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.production {
        config.production = true;
    }
    info!(
        port = config.port,
        production = config.production,
        "Starting Vidforge"
    );

    let core = AppCore::new(config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(core).await,
        Commands::Run { prompt } => run_once(core, prompt).await,
    }
}

async fn serve(core: Arc<AppCore>) -> Result<()> {
    let (shutdown_tx, _) = broadcast::channel(1);

    // On interrupt, release browser resources before the listener stops.
    // A job in flight at that point is abandoned.
    {
        let core = core.clone();
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, closing browser session");
                core.shutdown().await;
                let _ = shutdown_tx.send(());
            }
        });
    }

    HttpServer::new(core).run(shutdown_tx.subscribe()).await
}

/// One generation without the HTTP surface, handy for smoke-testing the
/// automation against the live target.
async fn run_once(core: Arc<AppCore>, prompt: String) -> Result<()> {
    anyhow::ensure!(!prompt.trim().is_empty(), "prompt must not be empty");

    let Some(permit) = core.gate.try_admit() else {
        anyhow::bail!("another generation is already running");
    };

    let mut job = GenerationJob::new(prompt);
    core.engine.execute(&mut job).await;
    permit.release();
    core.shutdown().await;

    match job.status {
        JobStatus::Succeeded => {
            let path = job.result_path.expect("succeeded jobs carry a path");
            println!("{}", path.display());
            Ok(())
        }
        _ => anyhow::bail!(
            job.failure_reason
                .unwrap_or_else(|| "generation did not complete".to_string())
        ),
    }
}
