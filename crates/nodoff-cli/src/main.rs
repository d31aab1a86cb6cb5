use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "nodoff-cli", version, about = "Nodoff sleep timer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute playback progress for a position
    Progress(commands::progress::ProgressArgs),
    /// Auto timer window checks
    Auto {
        #[command(subcommand)]
        action: commands::auto::AutoAction,
    },
    /// List quick-pick timer selections
    Presets {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a sleep timer session against an in-memory player
    Simulate(commands::simulate::SimulateArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    // Logs go to stderr; stdout carries JSON.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nodoff=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Progress(args) => commands::progress::run(args),
        Commands::Auto { action } => commands::auto::run(action),
        Commands::Presets { json } => commands::presets::run(json),
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
