//! profile-harvest entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::sync::Notify;

use profile_harvest::config::resolve_config_path;
use profile_harvest::{HarvestConfig, Harvester};
use profile_harvest_server::HarvestServer;

#[derive(Parser)]
#[command(
    name = "profile-harvest",
    about = "Profile extraction through an adaptive pool of outbound identities",
    version
)]
struct Cli {
    /// Path to a JSON config file. Also reads HARVEST_CONFIG.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and the background refresher.
    Serve {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:3200")]
        addr: String,

        /// Bearer token for authentication.
        /// Also reads from HARVEST_TOKEN env var.
        #[arg(long)]
        token: Option<String>,
    },

    /// Extract one profile and print the JSON outcome.
    Scrape {
        /// Target profile handle.
        target: String,

        /// Caller address to register as an identity.
        #[arg(long)]
        caller: Option<String>,

        /// User agent to send instead of a rotated one.
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Run a single identity refresh cycle and print the report.
    Refresh,

    /// Check connectivity to the target service.
    Probe {
        /// Identity address to probe through.
        #[arg(long)]
        caller: Option<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   profile-harvest completions bash > ~/.local/share/bash-completion/completions/profile-harvest
    ///   profile-harvest completions zsh > ~/.zfunc/_profile-harvest
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { addr, token } => {
            // Resolve token: CLI flag > env var
            let effective_token = token.or_else(|| std::env::var("HARVEST_TOKEN").ok());
            if effective_token.is_some() {
                tracing::info!("Auth: bearer token required");
            }

            let harvester = Arc::new(Harvester::new(load_config(cli.config.as_deref())?)?);
            let shutdown = Arc::new(Notify::new());
            let refresher = harvester.spawn_refresher(shutdown.clone())?;

            let server = HarvestServer::new(harvester, effective_token);
            server
                .run(&addr, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("failed to listen for shutdown signal: {e}");
                    }
                    tracing::info!("shutting down");
                })
                .await?;

            shutdown.notify_one();
            if let Some(handle) = refresher {
                handle.await?;
            }
        }

        Commands::Scrape {
            target,
            caller,
            user_agent,
        } => {
            let harvester = Harvester::new(load_config(cli.config.as_deref())?)?;
            let outcome = harvester
                .scrape_profile(&target, caller.as_deref().unwrap_or(""), user_agent.as_deref())
                .await;
            match outcome {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(failure) => {
                    println!("{}", serde_json::to_string_pretty(&failure)?);
                    std::process::exit(1);
                }
            }
        }

        Commands::Refresh => {
            let harvester = Harvester::new(load_config(cli.config.as_deref())?)?;
            let report = harvester.refresher()?.run_cycle().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Probe { caller } => {
            let harvester = Harvester::new(load_config(cli.config.as_deref())?)?;
            let status = harvester.probe(caller.as_deref()).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "profile-harvest", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&str>) -> anyhow::Result<HarvestConfig> {
    let path = resolve_config_path(explicit);
    if let Some(p) = &path {
        tracing::info!("Config: {}", p.display());
    }
    Ok(HarvestConfig::load(path.as_deref())?)
}
