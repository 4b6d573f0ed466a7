//! Weighted-average-cost position for one symbol.
//!
//! # State
//! `base` is signed (+long, -short, 0 flat), `quote` is the cumulative cash
//! flow (negative = net spent), `average_cost` is the blended entry price of
//! the side that is currently open.
//!
//! # Transitions
//! Each normalized trade is classified against the current `base`:
//!
//! - [`Decision::Extend`]: flat, or same direction as the open side. Average
//!   cost becomes the size-weighted blend; nothing is realized.
//! - [`Decision::Reduce`]: opposite direction, `quantity <= |base|`. Average
//!   cost is unchanged; profit is realized on `quantity`.
//! - [`Decision::Flip`]: opposite direction, `quantity > |base|`. `|base|`
//!   closes at the pre-trade average cost, the remainder opens the other side
//!   at the trade price.
//!
//! `quote` moves by the trade's signed notional in every case.
//!
//! # Fees in other symbols
//! With a trading fee currency set (see
//! [`Position::with_trading_fee_currency`]), a fee another symbol pays in
//! this market's base asset is applied as a sell of that many units, so the
//! position tracks the same base balance as the FIFO distribution.
//!
//! # Range
//! Every amount update is checked. A trade that would push `base`, `quote`
//! or a profit outside the [`Fixed`] range is rejected with
//! [`AccountingError::Overflow`] and leaves the position unchanged.
//!
//! # Concurrency
//! Single writer per symbol: mutation goes through `&mut self`.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AccountingError;
use crate::fee::{normalize, route_trade, NormalizedTrade};
use crate::fixedpoint::Fixed;
use crate::types::{Market, Side, Trade};

// ---------------------------------------------------------------------------
// Profit events
// ---------------------------------------------------------------------------

/// Profit emitted by a trade. `realized == false` when the trade only
/// opened or extended a position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitEvent {
    pub amount: Fixed,
    pub realized: bool,
}

impl ProfitEvent {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn realized(amount: Fixed) -> Self {
        Self {
            amount,
            realized: true,
        }
    }

    /// Accumulate another event (batch total).
    pub fn merge(self, other: ProfitEvent) -> Result<Self, AccountingError> {
        Ok(Self {
            amount: self
                .amount
                .checked_add(other.amount)
                .ok_or(AccountingError::Overflow {
                    operation: "batch profit total",
                })?,
            realized: self.realized || other.realized,
        })
    }
}

// ---------------------------------------------------------------------------
// Decision + pure transitions
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Extend,
    Reduce,
    Flip,
}

/// Classify a trade of `quantity` on `side` against the signed `base`.
pub fn classify(base: Fixed, side: Side, quantity: Fixed) -> Decision {
    let direction = match side {
        Side::Buy => 1,
        Side::Sell => -1,
    };
    if base.is_zero() || base.signum() == direction {
        Decision::Extend
    } else if quantity <= base.abs() {
        Decision::Reduce
    } else {
        Decision::Flip
    }
}

/// Next `(base, average_cost, profit)` after one trade.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub base: Fixed,
    pub average_cost: Fixed,
    pub profit: ProfitEvent,
}

fn overflow(operation: &'static str) -> AccountingError {
    AccountingError::Overflow { operation }
}

/// Open or extend the current side.
///
/// The blend uses the normalized quote quantity, so a fee folded into either
/// leg of the trade lands in the cost basis.
pub fn extend(
    base: Fixed,
    average_cost: Fixed,
    trade: &NormalizedTrade,
) -> Result<Transition, AccountingError> {
    let held = base.abs();
    let total = held
        .checked_add(trade.quantity)
        .ok_or(overflow("position base"))?;
    let new_base = base
        .checked_add(trade.signed_quantity())
        .ok_or(overflow("position base"))?;
    let average_cost = if total.is_zero() {
        average_cost
    } else {
        average_cost
            .checked_mul(held)
            .and_then(|cost| cost.checked_add(trade.quote_quantity))
            .and_then(|cost| cost.checked_div(total))
            .ok_or(overflow("position cost basis"))?
    };

    Ok(Transition {
        base: new_base,
        average_cost,
        profit: ProfitEvent::none(),
    })
}

/// Close part (or all) of the current side at the trade price.
pub fn reduce(
    base: Fixed,
    average_cost: Fixed,
    trade: &NormalizedTrade,
) -> Result<Transition, AccountingError> {
    let profit = closing_profit(base, average_cost, trade.price, trade.quantity)?;
    Ok(Transition {
        base: base
            .checked_add(trade.signed_quantity())
            .ok_or(overflow("position base"))?,
        average_cost,
        profit: ProfitEvent::realized(profit),
    })
}

/// Close all of `|base|`, then open the remainder on the opposite side.
pub fn flip(
    base: Fixed,
    average_cost: Fixed,
    trade: &NormalizedTrade,
) -> Result<Transition, AccountingError> {
    let closed = base.abs();
    let remainder = trade
        .quantity
        .checked_sub(closed)
        .ok_or(overflow("position base"))?;
    let new_base = match trade.side {
        Side::Buy => remainder,
        Side::Sell => -remainder,
    };
    let profit = closing_profit(base, average_cost, trade.price, closed)?;

    Ok(Transition {
        base: new_base,
        average_cost: trade.price,
        profit: ProfitEvent::realized(profit),
    })
}

fn closing_profit(
    base: Fixed,
    average_cost: Fixed,
    exit_price: Fixed,
    quantity: Fixed,
) -> Result<Fixed, AccountingError> {
    let spread = if base.is_positive() {
        exit_price.checked_sub(average_cost)
    } else {
        average_cost.checked_sub(exit_price)
    };
    spread
        .and_then(|s| s.checked_mul(quantity))
        .ok_or(overflow("realized profit"))
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Read-only copy of a position's scalars.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    pub symbol: String,
    pub base: Fixed,
    pub quote: Fixed,
    pub average_cost: Fixed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    market: Market,
    trading_fee_currency: String,
    base: Fixed,
    quote: Fixed,
    average_cost: Fixed,
}

impl Position {
    pub fn new(market: Market) -> Self {
        Self {
            market,
            trading_fee_currency: String::new(),
            base: Fixed::ZERO,
            quote: Fixed::ZERO,
            average_cost: Fixed::ZERO,
        }
    }

    /// Treat fees other symbols pay in `trading_fee_currency` as sells of
    /// this market when that currency is its base asset, the same rule
    /// [`crate::LotDistribution`] applies.
    pub fn with_trading_fee_currency(mut self, trading_fee_currency: &str) -> Self {
        self.trading_fee_currency = trading_fee_currency.to_string();
        self
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn symbol(&self) -> &str {
        &self.market.symbol
    }

    pub fn base(&self) -> Fixed {
        self.base
    }

    pub fn quote(&self) -> Fixed {
        self.quote
    }

    /// Meaningful only while `base != 0`.
    pub fn average_cost(&self) -> Fixed {
        self.average_cost
    }

    pub fn is_long(&self) -> bool {
        self.base.is_positive()
    }

    pub fn is_short(&self) -> bool {
        self.base.is_negative()
    }

    pub fn is_closed(&self) -> bool {
        self.base.is_zero()
    }

    /// Apply one trade. Trades for other symbols are skipped unless their
    /// fee drains this market's base asset.
    ///
    /// # Errors
    /// Returns [`AccountingError`] for a malformed trade or an amount that
    /// leaves the representable range; the position is not mutated on error.
    pub fn add_trade(&mut self, trade: &Trade) -> Result<ProfitEvent, AccountingError> {
        let Some(routed) = route_trade(trade, &self.market, &self.trading_fee_currency)? else {
            return Ok(ProfitEvent::none());
        };
        let n = normalize(&routed, &self.market)?;
        self.apply(&n)
    }

    /// Apply a batch and return the summed profit event.
    ///
    /// The batch replays on a copy that replaces `self` only once every trade
    /// has applied, so any error leaves the position untouched.
    pub fn add_trades(&mut self, trades: &[Trade]) -> Result<ProfitEvent, AccountingError> {
        let mut batch = Vec::with_capacity(trades.len());
        for t in trades {
            if let Some(routed) = route_trade(t, &self.market, &self.trading_fee_currency)? {
                batch.push(normalize(&routed, &self.market)?);
            }
        }

        let mut next = self.clone();
        let mut total = ProfitEvent::none();
        for n in &batch {
            total = total.merge(next.apply(n)?)?;
        }
        *self = next;
        Ok(total)
    }

    fn apply(&mut self, trade: &NormalizedTrade) -> Result<ProfitEvent, AccountingError> {
        let quote = self
            .quote
            .checked_add(trade.signed_notional())
            .ok_or(overflow("position quote balance"))?;
        if trade.quantity.is_zero() {
            self.quote = quote;
            return Ok(ProfitEvent::none());
        }

        let decision = classify(self.base, trade.side, trade.quantity);
        let next = match decision {
            Decision::Extend => extend(self.base, self.average_cost, trade)?,
            Decision::Reduce => reduce(self.base, self.average_cost, trade)?,
            Decision::Flip => flip(self.base, self.average_cost, trade)?,
        };

        if decision == Decision::Flip {
            debug!(
                symbol = %self.market.symbol,
                from = %self.base,
                to = %next.base,
                price = %trade.price,
                "position flipped"
            );
        }

        self.quote = quote;
        self.base = next.base;
        self.average_cost = next.average_cost;
        Ok(next.profit)
    }

    /// Mark-to-market profit of the open side at `mark`.
    pub fn unrealized_profit(&self, mark: Fixed) -> Result<Fixed, AccountingError> {
        closing_profit(self.base, self.average_cost, mark, self.base.abs())
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            symbol: self.market.symbol.clone(),
            base: self.base,
            quote: self.quote,
            average_cost: self.average_cost,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "POSITION {}: average cost = {}, base = {}, quote = {}",
            self.market.symbol, self.average_cost, self.base, self.quote
        )
    }
}
