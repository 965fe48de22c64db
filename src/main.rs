use clap::{Parser, Subcommand};
use std::path::PathBuf;

use condition_monitor::config::{OverflowPolicy, ServiceConfig};
use condition_monitor::db::{init_database_schema, open_database};

#[derive(Parser, Debug)]
#[command(author, version, about = "Ingest device condition telemetry and serve graph and trend views")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service with its flush and trend workers
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Buffer overflow policy (overrides config file)
        #[arg(long, value_enum)]
        overflow_policy: Option<OverflowPolicy>,
    },
    /// Create or verify the database schema, then exit
    InitDb {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Parse and validate a config file and print the effective values
    CheckConfig {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Serve {
            config,
            port,
            overflow_policy,
        } => {
            let mut config = ServiceConfig::load(&config)?;
            if let Some(port) = port {
                config.api_port = port;
            }
            if let Some(policy) = overflow_policy {
                config.overflow_policy = policy;
            }
            condition_monitor::serve::serve(config)
        }
        Command::InitDb { config } => {
            let config = ServiceConfig::load(&config)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let pool = open_database(&config.database_path, 1).await?;
                init_database_schema(&pool).await?;
                pool.close().await;
                Ok::<(), condition_monitor::db::DynError>(())
            })?;
            println!(
                "Database ready: {} (version {})",
                config.database_path.display(),
                condition_monitor::EXPECTED_DB_VERSION
            );
            Ok(())
        }
        Command::CheckConfig { config } => {
            let config = ServiceConfig::load(&config)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
