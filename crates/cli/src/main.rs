mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{database, migrate, AppContext};
use rivet_core::{init_logging, ConfigTrait, LogFormat, LoggingConfig, RivetConfig};
use rivet_migrate::MigrationId;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code used when interrupted by ctrl-c
const INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "rivet")]
#[command(version, about = "Versioned SQL schema migrations for PostgreSQL")]
struct Cli {
    /// Directory holding migration files [env: RIVET_MIGRATIONS_DIR]
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Database connection URL [env: DATABASE_URL]
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Log output format: pretty, text or json [env: RIVET_LOG_FORMAT]
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema migrations table, dropping any existing one
    Setup,

    /// Generate a new migration
    Generate {
        /// Migration name, e.g. createUsers
        name: String,
    },

    /// Run pending migrations
    Migrate {
        /// Only run migrations up to this timestamp (YYYYMMDDHHMMSS)
        #[arg(short, long)]
        timestamp: Option<MigrationId>,
    },

    /// Rollback the last migration, or every migration down to a timestamp
    Rollback {
        /// Rollback migrations down to this timestamp (YYYYMMDDHHMMSS)
        #[arg(short, long)]
        timestamp: Option<MigrationId>,
    },

    /// Show migration status
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rivet: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let logging = LoggingConfig::from_config(&config).with_service("rivet", env!("CARGO_PKG_VERSION"));
    if let Err(e) = init_logging(logging).context("Failed to initialize logging") {
        eprintln!("rivet: {:#}", e);
        return ExitCode::FAILURE;
    }
    for (field, source) in config.config_sources() {
        tracing::trace!(field = %field, source = %source, "Configuration source");
    }

    let app = AppContext::new(config);

    // Dropping the command future drops any open transaction, which rolls it back.
    let outcome = tokio::select! {
        result = dispatch(cli.command, &app) => result.map(|_| ExitCode::SUCCESS),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, pending changes were rolled back");
            Ok(ExitCode::from(INTERRUPTED))
        }
    };

    app.shutdown().await;

    match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<RivetConfig> {
    let mut config = RivetConfig::from_env().context("Invalid configuration")?;

    if let Some(dir) = &cli.migrations_dir {
        config = config.with_migrations_dir(dir);
    }
    if let Some(url) = &cli.database_url {
        config = config.with_database_url(url);
    }
    if let Some(format) = cli.log_format {
        config = config.with_log_format(format);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn dispatch(command: Commands, app: &AppContext) -> anyhow::Result<()> {
    match command {
        Commands::Setup => database::setup(app).await,
        Commands::Generate { name } => migrate::generate(app, &name),
        Commands::Migrate { timestamp } => migrate::run(app, timestamp.as_ref()).await,
        Commands::Rollback { timestamp } => migrate::rollback(app, timestamp.as_ref()).await,
        Commands::Status => migrate::status(app).await,
    }
}
