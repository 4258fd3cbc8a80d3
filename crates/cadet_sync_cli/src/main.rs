//! cadet-sync CLI - mirror 42 Intra cadet profiles and run campus jobs.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::OutputFormat;
use crate::commands::schedule::ScheduleAction;
use crate::commands::shared::{CliResult, Runtime, notifier, open_db, print_failed};
use crate::commands::webhook::WebhookAction;

#[derive(Parser)]
#[command(name = "cadet-sync")]
#[command(version)]
#[command(about = "Mirror 42 Intra cadet profiles and run campus maintenance jobs")]
#[command(
    long_about = "cadet-sync lists the configured cursus tracks on the 42 Intra API, stores a \
timestamped snapshot of every cadet's profile, and runs the campus jobs built on that data: \
correction point redistribution, blackhole reports and webhook notifications."
)]
#[command(after_long_help = r#"EXAMPLES
    Sync every configured track once:
        $ cadet-sync sync

    Preview a redistribution without moving points:
        $ cadet-sync redistribute --target 10 --dry-run

    Register the webhook jobs report to:
        $ cadet-sync webhook add notifications https://discord.com/api/webhooks/...

    Run the scheduler in the foreground:
        $ cadet-sync schedule run

CONFIGURATION
    cadet-sync reads configuration from:
      1. ~/.config/cadet-sync/config.toml (or $XDG_CONFIG_HOME/cadet-sync/config.toml)
      2. ./cadet-sync.toml
      3. Environment variables (CADET_SYNC_ prefix, `__` between sections)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    CADET_SYNC_DATABASE__URL          Database connection string
    CADET_SYNC_INTRA__CLIENT_ID       Intra application uid (or FORTY_TWO_CLIENT_ID)
    CADET_SYNC_INTRA__CLIENT_SECRET   Intra application secret (or FORTY_TWO_CLIENT_SECRET)
    CADET_SYNC_SYNC__TRACK_IDS        Comma separated cursus ids to sync
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync cadet profiles from the Intra API
    Sync {
        /// Cursus ids to sync instead of the configured ones
        #[arg(short, long = "track")]
        tracks: Vec<i64>,
    },
    /// Move correction points above the target into the campus pool
    Redistribute {
        /// Points each cadet keeps (default from config)
        #[arg(short, long, allow_negative_numbers = true)]
        target: Option<i64>,

        /// Announce on the dry-run webhook without moving points
        #[arg(short = 'n', long)]
        dry_run: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show a cadet's status from the newest stored snapshot
    Status {
        login: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Post the upcoming blackhole summary
    BlackholeReport,
    /// Send a plain message to a named webhook
    Notify { webhook: String, message: String },
    /// Manage webhook targets
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
    /// Manage and run scheduled jobs
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
    /// Run database migrations
    #[cfg(feature = "migrate")]
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(feature = "migrate")]
#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cadet_sync=info,cadet_sync_cli=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    shutdown::setup_shutdown_handler();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        print_failed(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult {
    match cli.command {
        Commands::Completions { shell } => return commands::meta::handle_completions(shell),
        Commands::Man { output } => return commands::meta::handle_man(output),
        _ => {}
    }

    let config = config::Config::load()?;
    let database_url = config
        .database_url()
        .ok_or("could not determine a database URL; set database.url")?;

    if let Some(path) = cadet_sync::db::sqlite_path(&database_url)
        && path.is_relative()
    {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory.",
            path.display()
        );
    }
    cadet_sync::ensure_sqlite_parent_dir(&database_url)?;

    match cli.command {
        Commands::Sync { tracks } => {
            let runtime = Runtime::open(&config, &database_url).await?;
            commands::jobs::handle_sync(&runtime, tracks).await
        }
        Commands::Redistribute {
            target,
            dry_run,
            output,
        } => {
            let runtime = Runtime::open(&config, &database_url).await?;
            commands::jobs::handle_redistribute(&runtime, target, dry_run, output).await
        }
        Commands::BlackholeReport => {
            let runtime = Runtime::open(&config, &database_url).await?;
            commands::jobs::handle_blackhole_report(&runtime).await
        }
        Commands::Status { login, output } => {
            let db = open_db(&database_url).await?;
            commands::status::handle_status(&db, &login, output).await
        }
        Commands::Notify { webhook, message } => {
            let db = open_db(&database_url).await?;
            let notifier = notifier(&config.settings())?;
            commands::notify::handle_notify(&db, &notifier, &webhook, &message).await
        }
        Commands::Webhook { action } => {
            let db = open_db(&database_url).await?;
            commands::webhook::handle_webhook(action, &db).await
        }
        Commands::Schedule { action } => {
            commands::schedule::handle_schedule(action, &config, &database_url).await
        }
        #[cfg(feature = "migrate")]
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await
        }
        Commands::Completions { .. } | Commands::Man { .. } => Ok(()),
    }
}
