use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use mqk_config::AccountingMethod;

mod commands;

use commands::report::{run_report, ReportArgs};

#[derive(Parser)]
#[command(name = "mqk-acct")]
#[command(about = "Trade accounting: position, cost basis and realized PnL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overlays)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Replay a JSON trade file and print position or lot statistics
    Report {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// JSON array of trades, oldest first
        #[arg(long)]
        trades: String,

        /// Symbol to account for (must have a markets.<symbol> entry)
        #[arg(long)]
        symbol: String,

        /// Override accounting.method from config
        #[arg(long, value_enum)]
        method: Option<MethodArg>,

        /// Override report.level (FIFO price-band granularity)
        #[arg(long)]
        level: Option<u32>,

        /// Mark price for unrealized profit (defaults to the last trade price)
        #[arg(long)]
        last_price: Option<String>,

        /// Fail when the config carries keys nothing reads
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    AverageCost,
    Fifo,
}

impl From<MethodArg> for AccountingMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::AverageCost => AccountingMethod::AverageCost,
            MethodArg::Fifo => AccountingMethod::Fifo,
        }
    }
}

fn main() -> Result<()> {
    // Load .env.local if present (dev convenience, e.g. RUST_LOG).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = mqk_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Report {
            config_paths,
            trades,
            symbol,
            method,
            level,
            last_price,
            strict_config,
        } => run_report(ReportArgs {
            config_paths,
            trades_path: trades,
            symbol,
            method: method.map(AccountingMethod::from),
            level,
            last_price,
            strict_config,
        })?,
    }

    Ok(())
}

// Logs go to stderr so stdout stays `key=value` + JSON.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
