//! listsearch-gate - UPN-gated sign-in and knowledge-base blob helper
//!
#![doc = "Main entry point for the listsearch-gate application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use listsearch_gate::cli::{BlobCommand, Cli, Commands};
use listsearch_gate::commands;
use listsearch_gate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting sign-in server");
            commands::serve::run_serve(config).await?;
            Ok(())
        }
        Commands::Blob { command } => match command {
            BlobCommand::Upload {
                name,
                file,
                content,
            } => {
                tracing::debug!("Uploading blob {}", name);
                commands::blob::upload(&config, &name, file, content).await?;
                Ok(())
            }
            BlobCommand::Delete { name } => {
                tracing::debug!("Deleting blob {}", name);
                commands::blob::delete(&config, &name).await?;
                Ok(())
            }
        },
        Commands::CheckUpn { upn } => {
            let decision = commands::check_upn::check_upn(&config, &upn);
            if !decision.is_continue() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool, json_logs: bool) {
    let default_level = if verbose {
        "listsearch_gate=debug"
    } else {
        "listsearch_gate=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
