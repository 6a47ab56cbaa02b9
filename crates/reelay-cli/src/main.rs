mod check;
mod pipeline;

use clap::{Parser, Subcommand};
use reelay_core::ProfileStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reelay")]
#[command(about = "Relay tracked creator feeds into Discord threads")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll every profile on the configured interval until interrupted (default).
    Run,
    /// Run a single pass over every profile and exit.
    Once,
    /// Validate configuration and print the state of every profile.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = reelay_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(config.env.ansi_logs())
        .init();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let mut scheduler = pipeline::build_scheduler(&config)?;
            tracing::info!(
                env = %config.env,
                profiles = scheduler.store().profiles().len(),
                path = %config.profiles_path.display(),
                "reelay starting"
            );
            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                signal_token.cancel();
            });
            scheduler.run(cancel).await;
        }
        Commands::Once => {
            let mut scheduler = pipeline::build_scheduler(&config)?;
            let summary = scheduler.tick().await;
            println!(
                "synced {} profile(s), {} failed",
                summary.synced, summary.failed
            );
            if summary.synced == 0 && summary.failed > 0 {
                anyhow::bail!("every profile failed to sync");
            }
        }
        Commands::Check => {
            let store = reelay_core::YamlProfileStore::open(&config.profiles_path)?;
            print!("{}", check::render_status(&config, &store));
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, finishing current profile");
}
