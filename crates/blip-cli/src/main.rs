use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

#[derive(Parser)]
#[command(name = "blip", version, about = "Blip counters CLI")]
struct Cli {
    /// Treat this RFC 3339 instant as the current time
    #[arg(long, global = true, value_parser = parse_instant)]
    now: Option<DateTime<Utc>>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Counter management
    Counter {
        #[command(subcommand)]
        action: commands::counter::CounterAction,
    },
    /// App lifecycle triggers
    App {
        #[command(subcommand)]
        action: commands::app::AppAction,
    },
    /// Widget host requests
    Widget {
        #[command(subcommand)]
        action: commands::widget::WidgetAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BLIP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let now = cli.now.unwrap_or_else(Utc::now);
    let result = match cli.command {
        Commands::Counter { action } => commands::counter::run(action, now),
        Commands::App { action } => commands::app::run(action, now),
        Commands::Widget { action } => commands::widget::run(action, now),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
