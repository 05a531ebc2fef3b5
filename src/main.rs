use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tsp_mysql::cli::StateOverrides;

#[derive(Parser)]
#[command(name = "tsp-mysql")]
#[command(about = "Incremental MySQL transactions to TrueSight Pulse metrics ETL", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    state: StateArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct StateArgs {
    /// Lock file guarding against overlapping runs
    #[arg(long, global = true)]
    lock_file: Option<PathBuf>,

    /// File holding the timestamp of the last extracted row
    #[arg(long, global = true)]
    last_record_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract new rows and deliver them as measurements (default)
    Run,
    /// Show the rows the next run would extract, without delivering
    Preview {
        #[arg(long)]
        limit: Option<usize>,
    },
    Metrics {
        #[command(subcommand)]
        action: MetricsAction,
    },
    Watermark {
        #[command(subcommand)]
        action: WatermarkAction,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum MetricsAction {
    /// Create the metric definitions measurements are written to
    Create,
}

#[derive(Subcommand)]
enum WatermarkAction {
    Show,
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tsp_mysql=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = tsp_mysql::config::resolve_config_path(cli.config.as_deref());
    let overrides = StateOverrides {
        lock_file: cli.state.lock_file,
        last_record_file: cli.state.last_record_file,
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => tsp_mysql::cli::run::run(config_path.as_deref(), &overrides).await,
        Commands::Preview { limit } => {
            tsp_mysql::cli::preview::preview(config_path.as_deref(), &overrides, limit).await
        }
        Commands::Metrics { action } => match action {
            MetricsAction::Create => tsp_mysql::cli::metrics::create().await,
        },
        Commands::Watermark { action } => match action {
            WatermarkAction::Show => tsp_mysql::cli::watermark::show(config_path.as_deref(), &overrides),
        },
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => tsp_mysql::cli::config::init(stdout),
            ConfigAction::Validate => tsp_mysql::cli::config::validate(config_path, &overrides),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
