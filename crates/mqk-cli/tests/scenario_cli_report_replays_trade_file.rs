//! Scenario: `mqk-acct report` replays a JSON trade file.
//!
//! # Invariants under test
//!
//! 1. Average-cost output carries base, quote, average cost and realized
//!    profit as `key=value` lines, then a JSON document.
//! 2. `--method fifo` overrides the configured method and prints lot stats.
//! 3. A symbol without a `markets.<symbol>` entry is rejected.
//! 4. `--strict-config` fails on keys nothing reads.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = r#"
markets:
  BTCUSDT:
    base_currency: BTC
    quote_currency: USDT
accounting:
  method: average_cost
report:
  level: 1
"#;

const TRADES: &str = r#"[
  {"id": 1, "symbol": "BTCUSDT", "side": "buy",  "price": "100", "quantity": "1", "quoteQuantity": "100", "isBuyer": true},
  {"id": 2, "symbol": "BTCUSDT", "side": "buy",  "price": "200", "quantity": "1", "quoteQuantity": "200", "isBuyer": true},
  {"id": 3, "symbol": "BTCUSDT", "side": "sell", "price": "250", "quantity": "1", "quoteQuantity": "250", "isBuyer": false}
]"#;

struct Fixture {
    _dir: TempDir,
    config: PathBuf,
    trades: PathBuf,
}

fn fixture(config: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("accounting.yaml");
    let trades_path = dir.path().join("trades.json");
    fs::write(&config_path, config).unwrap();
    fs::write(&trades_path, TRADES).unwrap();
    Fixture {
        _dir: dir,
        config: config_path,
        trades: trades_path,
    }
}

#[allow(deprecated)]
fn mqk_acct() -> Command {
    Command::cargo_bin("mqk-acct").unwrap()
}

#[test]
fn average_cost_report_prints_position() {
    let fx = fixture(CONFIG);

    mqk_acct()
        .arg("report")
        .arg("--config")
        .arg(&fx.config)
        .arg("--trades")
        .arg(&fx.trades)
        .args(["--symbol", "BTCUSDT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("method=average_cost"))
        .stdout(predicate::str::contains("base=1.00000000"))
        .stdout(predicate::str::contains("quote=-50.00000000"))
        .stdout(predicate::str::contains("average_cost=150.00000000"))
        .stdout(predicate::str::contains("realized_profit=100.00000000"))
        .stdout(predicate::str::contains("\"averageCost\""));
}

#[test]
fn method_override_runs_fifo() {
    let fx = fixture(CONFIG);

    mqk_acct()
        .arg("report")
        .arg("--config")
        .arg(&fx.config)
        .arg("--trades")
        .arg(&fx.trades)
        .args(["--symbol", "BTCUSDT", "--method", "fifo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("method=fifo"))
        .stdout(predicate::str::contains("lots=1"))
        .stdout(predicate::str::contains("total_quantity=1.00000000"))
        .stdout(predicate::str::contains("pending_quantity=0.00000000"))
        .stdout(predicate::str::contains("\"100.00\""));
}

#[test]
fn unknown_symbol_is_rejected() {
    let fx = fixture(CONFIG);

    mqk_acct()
        .arg("report")
        .arg("--config")
        .arg(&fx.config)
        .arg("--trades")
        .arg(&fx.trades)
        .args(["--symbol", "ETHUSDT"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_MARKET_UNKNOWN"));
}

#[test]
fn strict_config_fails_on_unused_keys() {
    let fx = fixture(&format!("{CONFIG}\nextra:\n  knob: 1\n"));

    mqk_acct()
        .arg("report")
        .arg("--config")
        .arg(&fx.config)
        .arg("--trades")
        .arg(&fx.trades)
        .args(["--symbol", "BTCUSDT", "--strict-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn config_hash_prints_hash_and_canonical_json() {
    let fx = fixture(CONFIG);

    mqk_acct()
        .arg("config-hash")
        .arg(&fx.config)
        .assert()
        .success()
        .stdout(predicate::str::is_match("config_hash=[0-9a-f]{64}").unwrap())
        .stdout(predicate::str::contains("\"method\":\"average_cost\""));
}
