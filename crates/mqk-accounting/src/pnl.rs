//! Average-cost profit and loss report for one symbol.
//!
//! Replays a trade history through a [`Position`] and summarizes what a
//! backtest or a session produced: realized and unrealized profit, volumes
//! and the fees paid per currency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AccountingError;
use crate::fixedpoint::Fixed;
use crate::position::Position;
use crate::types::{Market, Side, Trade};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageCostReport {
    pub symbol: String,
    pub last_price: Fixed,
    pub num_trades: usize,
    pub buy_volume: Fixed,
    pub sell_volume: Fixed,
    pub profit: Fixed,
    pub unrealized_profit: Fixed,
    pub average_cost: Fixed,
    /// Remaining signed base quantity.
    pub stock: Fixed,
    /// Fees keyed by currency.
    pub fees: BTreeMap<String, Fixed>,
}

impl AverageCostReport {
    /// Emit the report through `tracing` at INFO.
    pub fn print(&self) {
        info!("{} PROFIT AND LOSS REPORT", self.symbol);
        info!("===============================================");
        info!("TRADES SINCE: {} trades", self.num_trades);
        info!("BUY VOLUME: {}", self.buy_volume);
        info!("SELL VOLUME: {}", self.sell_volume);
        info!("LAST PRICE: {}", self.last_price);
        info!("AVERAGE COST: {}", self.average_cost);
        info!("STOCK: {}", self.stock);
        for (currency, fee) in &self.fees {
            info!("FEE ({}): {}", currency, fee);
        }
        info!("PROFIT: {}", self.profit);
        info!("UNREALIZED PROFIT: {}", self.unrealized_profit);
    }
}

/// Builds an [`AverageCostReport`].
///
/// Fees charged in `trading_fee_currency` on other symbols' trades are
/// counted too, since they were paid out of the same account.
#[derive(Clone, Debug, Default)]
pub struct AverageCostCalculator {
    pub trading_fee_currency: String,
}

impl AverageCostCalculator {
    pub fn new(trading_fee_currency: impl Into<String>) -> Self {
        Self {
            trading_fee_currency: trading_fee_currency.into(),
        }
    }

    pub fn calculate(
        &self,
        market: &Market,
        trades: &[Trade],
        last_price: Fixed,
    ) -> Result<AverageCostReport, AccountingError> {
        self.calculate_with_position(market, trades, last_price)
            .map(|(report, _)| report)
    }

    /// [`calculate`](Self::calculate), also returning the replayed
    /// [`Position`] so callers need not replay the trades a second time.
    ///
    /// The position shares this calculator's trading fee currency, so a fee
    /// another symbol pays in `market`'s base asset reduces `stock`.
    pub fn calculate_with_position(
        &self,
        market: &Market,
        trades: &[Trade],
        last_price: Fixed,
    ) -> Result<(AverageCostReport, Position), AccountingError> {
        let mut position =
            Position::new(market.clone()).with_trading_fee_currency(&self.trading_fee_currency);
        let mut fees: BTreeMap<String, Fixed> = BTreeMap::new();
        let mut buy_volume = Fixed::ZERO;
        let mut sell_volume = Fixed::ZERO;
        let mut num_trades = 0usize;

        for trade in trades {
            if trade.symbol != market.symbol {
                if !self.trading_fee_currency.is_empty()
                    && trade.fee_currency == self.trading_fee_currency
                    && !trade.fee.is_zero()
                {
                    let total = fees.entry(trade.fee_currency.clone()).or_default();
                    accumulate(total, trade.fee, "fee total")?;
                }
                continue;
            }

            num_trades += 1;
            match trade.side {
                Side::Buy => accumulate(&mut buy_volume, trade.quantity, "buy volume")?,
                Side::Sell => accumulate(&mut sell_volume, trade.quantity, "sell volume")?,
            }
            if !trade.fee.is_zero() {
                let total = fees.entry(trade.fee_currency.clone()).or_default();
                accumulate(total, trade.fee, "fee total")?;
            }
        }

        let profit = position.add_trades(trades)?;

        let report = AverageCostReport {
            symbol: market.symbol.clone(),
            last_price,
            num_trades,
            buy_volume,
            sell_volume,
            profit: profit.amount,
            unrealized_profit: position.unrealized_profit(last_price)?,
            average_cost: position.average_cost(),
            stock: position.base(),
            fees,
        };
        Ok((report, position))
    }
}

fn accumulate(
    total: &mut Fixed,
    amount: Fixed,
    operation: &'static str,
) -> Result<(), AccountingError> {
    *total = total
        .checked_add(amount)
        .ok_or(AccountingError::Overflow { operation })?;
    Ok(())
}
