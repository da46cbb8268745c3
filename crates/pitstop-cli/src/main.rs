mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pitstop",
    about = "Sprint health dashboard: metrics, pit-stop recommendations and tracker sync",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .pitstop/)
    #[arg(long, global = true, env = "PITSTOP_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize .pitstop/ with a default config and store
    Init {
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Don't seed the store with the demo sprint
        #[arg(long)]
        no_demo: bool,
    },

    /// Start the HTTP API
    Serve {
        /// Port to listen on (defaults to server.port in config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Pull the active sprint from the issue tracker into the store
    Sync {
        /// Tracker sprint id (defaults to the board's active sprint)
        #[arg(long)]
        sprint: Option<String>,
    },

    /// Compute sprint metrics and record a snapshot
    Metrics {
        /// Sprint id (defaults to the active sprint)
        #[arg(long)]
        sprint: Option<String>,

        /// Consult the tracker before the local store
        #[arg(long)]
        refresh: bool,
    },

    /// Generate pit-stop recommendations
    Recommend {
        /// Sprint id (defaults to the active sprint)
        #[arg(long)]
        sprint: Option<String>,

        /// Consult the tracker before the local store
        #[arg(long)]
        refresh: bool,
    },

    /// Mark a recommendation applied (or dismissed)
    Apply {
        /// Recommendation id as shown by `pitstop recommend`
        id: String,

        /// Dismiss instead of applying
        #[arg(long)]
        dismiss: bool,
    },

    /// Show the metrics history of a sprint
    Snapshots {
        /// Sprint id (defaults to the active sprint)
        #[arg(long)]
        sprint: Option<String>,
    },

    /// Inspect and validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Sync { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name, no_demo } => cmd::init::run(&root, name.as_deref(), no_demo),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Sync { sprint } => cmd::sync::run(&root, sprint.as_deref(), cli.json),
        Commands::Metrics { sprint, refresh } => {
            cmd::metrics::run(&root, sprint.as_deref(), refresh, cli.json)
        }
        Commands::Recommend { sprint, refresh } => {
            cmd::recommend::run(&root, sprint.as_deref(), refresh, cli.json)
        }
        Commands::Apply { id, dismiss } => cmd::recommend::apply(&root, &id, dismiss, cli.json),
        Commands::Snapshots { sprint } => cmd::snapshots::run(&root, sprint.as_deref(), cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
