use clap::{Parser, Subcommand};
use logwindow::cli::run::RunOverrides;
use logwindow::config::types::duration_format::parse_duration;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logwindow")]
#[command(about = "Tumbling-window log batcher", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Batch log lines from a file or stdin into JSON lines
    Run(RunArgs),
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// File to read, or '-' for stdin
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// File to append batches to, or '-' for stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Name attached to every record
    #[arg(long)]
    source_id: Option<String>,

    /// Keep reading the input file after EOF
    #[arg(long)]
    follow: bool,

    #[arg(long)]
    max_batch_size: Option<usize>,

    /// e.g. 500ms, 5s, 1m
    #[arg(long, value_parser = parse_duration)]
    max_window: Option<Duration>,
}

impl From<RunArgs> for RunOverrides {
    fn from(args: RunArgs) -> Self {
        Self {
            input: args.input,
            output: args.output,
            source_id: args.source_id,
            follow: args.follow,
            max_batch_size: args.max_batch_size,
            max_window: args.max_window,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,

        /// Where to write the config instead of the default location
        #[arg(long)]
        path: Option<PathBuf>,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays clean for batch output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logwindow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = logwindow::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run(args)) => {
            logwindow::cli::run::run(config_path, args.into()).await?;
        }
        None => {
            // Default behavior is to run
            logwindow::cli::run::run(config_path, RunOverrides::default()).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout, path } => {
                logwindow::cli::config::init(stdout, path)?;
            }
            ConfigAction::Validate => {
                logwindow::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
