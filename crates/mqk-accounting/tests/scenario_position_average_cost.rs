//! Scenario: weighted-average-cost position over fee-bearing trade streams.
//!
//! # Invariants under test
//!
//! 1. A base-currency fee shrinks the bought quantity; the average cost is
//!    the full notional over the net quantity.
//! 2. A quote-currency fee shrinks sell proceeds; quantity is untouched.
//! 3. Extending a side blends the average cost by size.
//! 4. Reducing a side leaves the average cost unchanged and realizes
//!    `(exit - average) * qty`.
//! 5. A sell larger than the long side closes it at the pre-trade average
//!    and opens a short at the trade price.
//!
//! All tests are pure; no IO, no network.

use mqk_accounting::{Fixed, Market, Position, Trade};

const FEE_RATE: f64 = 0.05 * 0.01;

fn f(x: f64) -> Fixed {
    Fixed::from_f64(x)
}

fn buy(price: f64, qty: f64) -> Trade {
    Trade::buy("BTCUSDT", f(price), f(qty))
}

fn sell(price: f64, qty: f64) -> Trade {
    Trade::sell("BTCUSDT", f(price), f(qty))
}

struct Case {
    name: &'static str,
    trades: Vec<Trade>,
    expected_average_cost: Fixed,
    expected_base: Fixed,
    expected_quote: Fixed,
    expected_profit: Fixed,
}

fn cases() -> Vec<Case> {
    vec![
        Case {
            name: "base fee",
            trades: vec![buy(1000.0, 0.01).with_fee(f(0.01 * FEE_RATE), "BTC")],
            expected_average_cost: f((1000.0 * 0.01) / (0.01 * (1.0 - FEE_RATE))),
            expected_base: f(0.01 - (0.01 * FEE_RATE)),
            expected_quote: f(0.0 - 1000.0 * 0.01),
            expected_profit: f(0.0),
        },
        Case {
            name: "quote fee",
            trades: vec![sell(1000.0, 0.01).with_fee(f((1000.0 * 0.01) * FEE_RATE), "USDT")],
            expected_average_cost: f((1000.0 * 0.01 * (1.0 - FEE_RATE)) / 0.01),
            expected_base: f(-0.01),
            expected_quote: f(0.0 + 1000.0 * 0.01 * (1.0 - FEE_RATE)),
            expected_profit: f(0.0),
        },
        Case {
            name: "long",
            trades: vec![buy(1000.0, 0.01), buy(2000.0, 0.03)],
            expected_average_cost: f((1000.0 * 0.01 + 2000.0 * 0.03) / 0.04),
            expected_base: f(0.01 + 0.03),
            expected_quote: f(0.0 - 1000.0 * 0.01 - 2000.0 * 0.03),
            expected_profit: f(0.0),
        },
        Case {
            name: "long and sell",
            trades: vec![buy(1000.0, 0.01), buy(2000.0, 0.03), sell(3000.0, 0.01)],
            expected_average_cost: f((1000.0 * 0.01 + 2000.0 * 0.03) / 0.04),
            expected_base: f(0.03),
            expected_quote: f(0.0 - 1000.0 * 0.01 - 2000.0 * 0.03 + 3000.0 * 0.01),
            expected_profit: f((3000.0 - (1000.0 * 0.01 + 2000.0 * 0.03) / 0.04) * 0.01),
        },
        Case {
            name: "long and sell to short",
            trades: vec![buy(1000.0, 0.01), buy(2000.0, 0.03), sell(3000.0, 0.10)],
            expected_average_cost: f(3000.0),
            expected_base: f(-0.06),
            expected_quote: f(-1000.0 * 0.01 - 2000.0 * 0.03 + 3000.0 * 0.1),
            expected_profit: f((3000.0 - (1000.0 * 0.01 + 2000.0 * 0.03) / 0.04) * 0.04),
        },
        Case {
            name: "short",
            trades: vec![sell(2000.0, 0.01), sell(3000.0, 0.03)],
            expected_average_cost: f((2000.0 * 0.01 + 3000.0 * 0.03) / (0.01 + 0.03)),
            expected_base: f(0.0 - 0.01 - 0.03),
            expected_quote: f(2000.0 * 0.01 + 3000.0 * 0.03),
            expected_profit: f(0.0),
        },
    ]
}

#[test]
fn average_cost_table() {
    for case in cases() {
        let mut pos = Position::new(Market::new("BTCUSDT", "BTC", "USDT"));
        let profit = pos.add_trades(&case.trades).unwrap();

        assert_eq!(pos.quote(), case.expected_quote, "{}: quote", case.name);
        assert_eq!(pos.base(), case.expected_base, "{}: base", case.name);
        assert_eq!(
            pos.average_cost(),
            case.expected_average_cost,
            "{}: average cost",
            case.name
        );
        if profit.realized {
            assert_eq!(profit.amount, case.expected_profit, "{}: profit", case.name);
        } else {
            assert_eq!(profit.amount, Fixed::ZERO, "{}: profit", case.name);
        }
    }
}

#[test]
fn flip_reports_realized_profit() {
    let mut pos = Position::new(Market::new("BTCUSDT", "BTC", "USDT"));
    pos.add_trades(&[buy(1000.0, 0.01), buy(2000.0, 0.03)]).unwrap();

    let ev = pos.add_trade(&sell(3000.0, 0.10)).unwrap();
    assert!(ev.realized);
    assert_eq!(ev.amount, f(50.0));
    assert!(pos.is_short());
}

#[test]
fn opening_only_sequences_never_realize() {
    let mut long = Position::new(Market::new("BTCUSDT", "BTC", "USDT"));
    for (px, qty) in [(100.0, 1.0), (90.0, 0.5), (120.0, 2.0), (80.0, 0.25)] {
        let ev = long.add_trade(&buy(px, qty)).unwrap();
        assert!(!ev.realized);
    }

    let mut short = Position::new(Market::new("BTCUSDT", "BTC", "USDT"));
    for (px, qty) in [(100.0, 1.0), (110.0, 0.5)] {
        let ev = short.add_trade(&sell(px, qty)).unwrap();
        assert!(!ev.realized);
    }
}
