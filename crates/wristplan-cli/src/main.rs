use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "wristplan", version, about = "Wristplan watch face schedule host")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the face snapshot (no alerts are fired)
    Status {
        /// Evaluate at this local time (HH:MM or YYYY-MM-DDTHH:MM[:SS])
        #[arg(long)]
        at: Option<String>,
    },
    /// Print the next entry to start
    Next {
        #[arg(long)]
        at: Option<String>,
    },
    /// List every entry of a weekday
    Day {
        /// Weekday, e.g. Mon or monday
        weekday: String,
    },
    /// Load a schedule document and summarise it
    Validate {
        path: std::path::PathBuf,
    },
    /// Run one render tick against the persisted ledger
    Tick {
        #[arg(long)]
        at: Option<String>,
    },
    /// Run the face host: render ticks plus in-process wake timers
    Watch {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
        /// Also print a snapshot on every tick
        #[arg(long)]
        snapshots: bool,
    },
    /// Read or switch a feature toggle
    Toggle {
        #[arg(value_enum)]
        flag: commands::toggle::Flag,
        #[arg(value_enum)]
        state: Option<commands::toggle::State>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Fired alert history
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Inspect or reset the alert ledger
    Ledger {
        #[command(subcommand)]
        action: commands::ledger::LedgerAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WRISTPLAN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Status { at } => commands::face::status(at.as_deref()),
        Commands::Next { at } => commands::face::next(at.as_deref()),
        Commands::Day { weekday } => commands::face::day(&weekday),
        Commands::Validate { path } => commands::face::validate(&path),
        Commands::Tick { at } => commands::face::tick(at.as_deref()),
        Commands::Watch { ticks, snapshots } => commands::watch::run(ticks, snapshots),
        Commands::Toggle { flag, state } => commands::toggle::run(flag, state),
        Commands::Config { action } => commands::config::run(action),
        Commands::History { limit } => commands::history::run(limit),
        Commands::Ledger { action } => commands::ledger::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "wristplan", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
