//! `mqk-acct report`: replay a trade file through one accounting method.
//!
//! Output is `key=value` lines followed by one pretty JSON document, so the
//! first lines can be grepped and the rest piped to `jq`.

use anyhow::{Context, Result};
use mqk_accounting::{AverageCostCalculator, Fixed, LotDistribution, Market, Trade};
use mqk_config::{AccountingConfig, AccountingMethod};
use serde_json::json;
use std::str::FromStr;
use tracing::info;

pub struct ReportArgs {
    pub config_paths: Vec<String>,
    pub trades_path: String,
    pub symbol: String,
    pub method: Option<AccountingMethod>,
    pub level: Option<u32>,
    pub last_price: Option<String>,
    pub strict_config: bool,
}

pub fn run_report(args: ReportArgs) -> Result<()> {
    let loaded = super::load_config(&args.config_paths, args.strict_config)?;
    let cfg = AccountingConfig::from_loaded(&loaded)?;
    let market = cfg.market(&args.symbol)?;
    let trades = super::load_trades(&args.trades_path)?;

    let method = args.method.unwrap_or(cfg.method);
    info!(
        symbol = %market.symbol,
        method = method.as_str(),
        trades = trades.len(),
        "replaying trades"
    );

    println!("config_hash={}", loaded.config_hash);
    println!("symbol={}", market.symbol);
    println!("method={}", method.as_str());

    match method {
        AccountingMethod::AverageCost => {
            let last_price = resolve_last_price(args.last_price.as_deref(), &market, &trades)?;
            average_cost(&cfg, &market, &trades, last_price)
        }
        AccountingMethod::Fifo => {
            let level = args.level.unwrap_or(cfg.report_level);
            fifo(&cfg, market, &trades, level)
        }
    }
}

fn average_cost(
    cfg: &AccountingConfig,
    market: &Market,
    trades: &[Trade],
    last_price: Fixed,
) -> Result<()> {
    let (report, position) = AverageCostCalculator::new(cfg.trading_fee_currency())
        .calculate_with_position(market, trades, last_price)
        .context("average-cost replay rejected the trade file")?;
    report.print();

    println!("base={}", position.base());
    println!("quote={}", position.quote());
    println!("average_cost={}", position.average_cost());
    println!("realized_profit={}", report.profit);
    println!("unrealized_profit={}", report.unrealized_profit);

    let doc = json!({
        "position": position.snapshot(),
        "report": report,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&doc).context("serialize report json failed")?
    );
    Ok(())
}

fn fifo(cfg: &AccountingConfig, market: Market, trades: &[Trade], level: u32) -> Result<()> {
    let distribution = LotDistribution::new(market, cfg.trading_fee_currency());
    let checkpoints = distribution
        .add_trades(trades)
        .context("fifo replay rejected the trade file")?;
    let stats = distribution.stats(level);

    println!("checkpoints={}", join(&checkpoints));
    println!("lots={}", distribution.lots().len());
    println!("total_quantity={}", stats.total_quantity);
    println!("pending_quantity={}", distribution.pending_quantity());
    println!("level={}", level);

    let doc = json!({
        "checkpoints": checkpoints,
        "pendingSells": distribution.pending_sells(),
        "stats": stats,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&doc).context("serialize stats json failed")?
    );
    Ok(())
}

/// `--last-price` if given, else the last trade price seen for the symbol.
fn resolve_last_price(raw: Option<&str>, market: &Market, trades: &[Trade]) -> Result<Fixed> {
    if let Some(raw) = raw {
        return Fixed::from_str(raw.trim())
            .with_context(|| format!("invalid --last-price '{}'", raw));
    }
    Ok(trades
        .iter()
        .rev()
        .find(|t| t.symbol == market.symbol)
        .map(|t| t.price)
        .unwrap_or(Fixed::ZERO))
}

fn join(xs: &[usize]) -> String {
    xs.iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
