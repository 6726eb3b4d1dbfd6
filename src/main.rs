use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use logvigil::config::VigilConfig;

#[derive(Parser)]
#[command(
    name = "logvigil",
    about = "Multi-tenant security log ingestion and anomaly alerting",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (takes precedence over LOGVIGIL_CONFIG
    /// and the system location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + ingestion pipeline)
    Serve {
        /// Bind address, overrides the config file
        #[arg(long)]
        bind: Option<String>,

        /// SQLite database path, overrides the config file
        #[arg(long)]
        db: Option<String>,
    },

    /// Manage tenants (onboarding is an operator action, not an API one)
    Tenant {
        #[command(subcommand)]
        action: TenantAction,
    },
}

#[derive(Subcommand)]
enum TenantAction {
    /// Onboard a new tenant and print its generated API key
    Add {
        /// Tenant name
        #[arg(long)]
        name: String,
    },

    /// List all tenants
    List,
}

fn load_config(cli: &Cli) -> Result<VigilConfig> {
    match &cli.config {
        Some(path) => VigilConfig::load(path),
        None => Ok(VigilConfig::load_or_default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    // Initialize tracing; RUST_LOG wins over the config file level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    match cli.command {
        Commands::Serve { bind, db } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            if let Some(db) = db {
                config.storage.db_path = db;
            }
            tracing::info!(bind = %config.server.bind_address, "Starting logvigil daemon");
            logvigil::serve(config).await?;
        }
        Commands::Tenant { action } => {
            let pool = logvigil::storage::open_pool(&config.storage.db_path)?;
            let directory = logvigil::tenant::SqliteTenantDirectory::new(pool);

            match action {
                TenantAction::Add { name } => {
                    let tenant = directory.onboard(&name)?;
                    println!("Tenant '{}' onboarded.", tenant.name);
                    println!("  id:      {}", tenant.id);
                    println!("  api key: {}", tenant.api_key);
                    println!("(The key is shown once; store it securely.)");
                }
                TenantAction::List => {
                    let tenants = directory.list()?;
                    if tenants.is_empty() {
                        println!("No tenants found.");
                    } else {
                        println!("{:<38} | {:<20} | Created", "Id", "Name");
                        println!("{:-<38}-|-{:-<20}-|-{:-<25}", "", "", "");
                        for t in tenants {
                            println!(
                                "{:<38} | {:<20} | {}",
                                t.id.to_string(),
                                t.name,
                                t.created_at.to_rfc3339()
                            );
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
