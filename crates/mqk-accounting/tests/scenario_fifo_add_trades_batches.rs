//! Scenario: batch ingestion into the FIFO distribution.
//!
//! # Invariants under test
//!
//! 1. Checkpoints mark buys that start a new holding period; index 0 never
//!    does.
//! 2. Sells without inventory are deferred and filled by later buys.
//! 3. Fees paid in the tracked base asset on other symbols drain inventory.
//! 4. Other symbols are skipped; a malformed trade rejects the whole batch.
//! 5. Fully consumed lots are squashed at the end of every batch.

use mqk_accounting::{AccountingError, Fixed, Lot, LotDistribution, Market, Trade};

fn f(x: f64) -> Fixed {
    Fixed::from_f64(x)
}

fn btc() -> LotDistribution {
    LotDistribution::new(Market::new("BTCUSDT", "BTC", "USDT"), "BNB")
}

fn bnb() -> LotDistribution {
    LotDistribution::new(Market::new("BNBUSDT", "BNB", "USDT"), "BNB")
}

#[test]
fn checkpoints_mark_new_holding_periods() {
    let d = btc();
    let trades = vec![
        Trade::buy("BTCUSDT", f(100.0), f(1.0)),
        Trade::sell("BTCUSDT", f(110.0), f(1.0)),
        Trade::buy("BTCUSDT", f(105.0), f(0.5)),
        Trade::buy("BTCUSDT", f(106.0), f(0.5)),
        Trade::sell("BTCUSDT", f(107.0), f(1.0)),
        Trade::buy("ETHUSDT", f(10.0), f(1.0)),
        Trade::buy("BTCUSDT", f(100.0), f(1.0)),
    ];

    let checkpoints = d.add_trades(&trades).unwrap();
    assert_eq!(checkpoints, vec![2, 6]);
    assert_eq!(d.lots(), vec![Lot::new(f(100.0), f(1.0))]);
}

#[test]
fn first_trade_is_never_a_checkpoint() {
    let d = btc();
    let checkpoints = d
        .add_trades(&[Trade::buy("BTCUSDT", f(100.0), f(1.0))])
        .unwrap();
    assert!(checkpoints.is_empty());
}

#[test]
fn checkpoints_carry_across_batches() {
    let d = btc();
    d.add_trades(&[
        Trade::buy("BTCUSDT", f(100.0), f(1.0)),
        Trade::sell("BTCUSDT", f(110.0), f(1.0)),
    ])
    .unwrap();
    assert!(d.lots().is_empty());

    let checkpoints = d
        .add_trades(&[
            Trade::sell("BTCUSDT", f(90.0), f(0.1)),
            Trade::buy("BTCUSDT", f(95.0), f(1.0)),
        ])
        .unwrap();
    assert_eq!(checkpoints, vec![1]);
}

#[test]
fn pending_sell_is_filled_by_later_buy() {
    let d = btc();
    let checkpoints = d
        .add_trades(&[
            Trade::sell("BTCUSDT", f(100.0), f(1.0)),
            Trade::buy("BTCUSDT", f(90.0), f(2.0)),
        ])
        .unwrap();

    assert_eq!(checkpoints, vec![1]);
    assert!(d.pending_sells().is_empty());
    assert_eq!(d.lots(), vec![Lot::new(f(90.0), f(1.0))]);
}

#[test]
fn pending_sell_stays_observable_without_inventory() {
    let d = btc();
    d.add_trades(&[Trade::sell("BTCUSDT", f(100.0), f(0.4))]).unwrap();
    assert_eq!(d.pending_sells(), vec![Lot::new(f(100.0), f(0.4))]);
    assert_eq!(d.total_quantity(), Fixed::ZERO);
}

#[test]
fn base_fee_reduces_lot_quantity() {
    let d = bnb();
    d.add_trades(&[Trade::buy("BNBUSDT", f(300.0), f(1.0)).with_fee(f(0.001), "BNB")])
        .unwrap();
    assert_eq!(d.total_quantity(), f(0.999));
}

#[test]
fn cross_symbol_fee_in_base_asset_drains_inventory() {
    let d = bnb();
    let trades = vec![
        Trade::buy("BNBUSDT", f(300.0), f(1.0)),
        Trade::buy("BTCUSDT", f(30000.0), f(0.1)).with_fee(f(0.01), "BNB"),
        Trade::sell("ETHUSDT", f(2000.0), f(1.0)).with_fee(f(0.02), "BNB"),
        Trade::buy("BTCUSDT", f(30000.0), f(0.1)).with_fee(f(3.0), "USDT"),
    ];
    d.add_trades(&trades).unwrap();
    assert_eq!(d.total_quantity(), f(0.97));
}

#[test]
fn cross_symbol_fee_ignored_when_fee_asset_is_not_tracked() {
    let d = btc();
    let trades = vec![
        Trade::buy("BTCUSDT", f(30000.0), f(0.1)),
        Trade::buy("BNBUSDT", f(300.0), f(1.0)).with_fee(f(0.01), "BNB"),
    ];
    d.add_trades(&trades).unwrap();
    assert_eq!(d.total_quantity(), f(0.1));
}

#[test]
fn malformed_trade_rejects_whole_batch() {
    let d = btc();
    let trades = vec![
        Trade::buy("BTCUSDT", f(100.0), f(1.0)),
        Trade::sell("BTCUSDT", f(100.0), f(-1.0)),
    ];
    let err = d.add_trades(&trades).unwrap_err();
    assert_eq!(err, AccountingError::NegativeQuantity { quantity: f(-1.0) });
    assert!(d.lots().is_empty());
}

#[test]
fn stats_reflect_squashed_inventory() {
    let d = btc();
    d.add_trades(&[
        Trade::buy("BTCUSDT", f(95.0), f(1.0)),
        Trade::buy("BTCUSDT", f(91.0), f(1.0)),
        Trade::buy("BTCUSDT", f(120.0), f(1.0)),
        Trade::sell("BTCUSDT", f(100.0), f(1.5)),
    ])
    .unwrap();

    // Profitable pass: 91 (newer) then half of 95.
    let stats = d.stats(1);
    assert_eq!(stats.price_levels, vec!["90.00", "100.00"]);
    assert_eq!(stats.quantities["90.00"], f(0.5));
    assert_eq!(stats.quantities["100.00"], f(1.0));
    assert_eq!(stats.total_quantity, f(1.5));
}
