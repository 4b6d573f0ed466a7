//! Fee normalization shared by both accounting strategies.
//!
//! Trading fees are folded into the transacted quantity (fee paid in base
//! currency) or into the quote cash flow (fee paid in quote currency) before
//! any accounting rule runs. The normalized value carries no fee, so nothing
//! downstream can count it twice.

use std::borrow::Cow;

use crate::error::AccountingError;
use crate::fixedpoint::Fixed;
use crate::types::{Market, Side, Trade};

/// A trade after fee folding: what actually moved in base and quote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedTrade {
    pub side: Side,
    pub price: Fixed,
    /// Base units received (buy) or given away (sell), fee included.
    pub quantity: Fixed,
    /// Quote units paid (buy) or received (sell), fee included.
    pub quote_quantity: Fixed,
}

impl NormalizedTrade {
    /// +quantity for a buy, -quantity for a sell.
    pub fn signed_quantity(&self) -> Fixed {
        match self.side {
            Side::Buy => self.quantity,
            Side::Sell => -self.quantity,
        }
    }

    /// Cash flow: -cost for a buy, +proceeds for a sell.
    pub fn signed_notional(&self) -> Fixed {
        match self.side {
            Side::Buy => -self.quote_quantity,
            Side::Sell => self.quote_quantity,
        }
    }
}

/// Validate `trade` and fold its fee into quantity or quote cash flow.
///
/// - fee in base currency: a buy nets `quantity - fee`, a sell gives away
///   `quantity + fee`.
/// - fee in quote currency: a buy costs `quote_quantity + fee`, a sell nets
///   `quote_quantity - fee`.
/// - fee in any other currency does not touch this instrument's balances.
pub fn normalize(trade: &Trade, market: &Market) -> Result<NormalizedTrade, AccountingError> {
    trade.validate()?;

    let mut quantity = trade.quantity;
    let mut quote_quantity = trade.quote_quantity;

    if !trade.fee.is_zero() {
        if trade.fee_currency == market.base_currency {
            match trade.side {
                Side::Buy => {
                    if trade.fee > quantity {
                        return Err(AccountingError::FeeExceedsQuantity {
                            fee: trade.fee,
                            quantity,
                        });
                    }
                    quantity -= trade.fee;
                }
                Side::Sell => quantity = add_fee(quantity, trade.fee)?,
            }
        } else if trade.fee_currency == market.quote_currency {
            match trade.side {
                Side::Buy => quote_quantity = add_fee(quote_quantity, trade.fee)?,
                Side::Sell => quote_quantity -= trade.fee,
            }
        }
    }

    Ok(NormalizedTrade {
        side: trade.side,
        price: trade.price,
        quantity,
        quote_quantity,
    })
}

fn add_fee(amount: Fixed, fee: Fixed) -> Result<Fixed, AccountingError> {
    amount.checked_add(fee).ok_or(AccountingError::Overflow {
        operation: "fee-adjusted trade amount",
    })
}

/// `true` when `trade` belongs to another symbol but pays its fee in the
/// base currency of `market`, i.e. the fee drains this instrument's inventory.
pub fn is_cross_symbol_fee(trade: &Trade, market: &Market) -> bool {
    trade.symbol != market.symbol
        && !trade.fee.is_zero()
        && trade.fee_currency == market.base_currency
}

/// Fees paid in `trading_fee_currency` drain a market's inventory only when
/// that currency is the market's base asset.
pub fn fees_drain_inventory(market: &Market, trading_fee_currency: &str) -> bool {
    !trading_fee_currency.is_empty() && trading_fee_currency == market.base_currency
}

/// Reinterpret a cross-symbol trade's fee as a sell of `fee` units on
/// `market`. The trade's own price is kept as the synthetic sell price.
pub fn fee_as_synthetic_sell(trade: &Trade, market: &Market) -> Result<Trade, AccountingError> {
    let quote_quantity = trade
        .price
        .checked_mul(trade.fee)
        .ok_or(AccountingError::Overflow {
            operation: "synthetic fee sell notional",
        })?;
    Ok(Trade {
        id: trade.id,
        symbol: market.symbol.clone(),
        side: Side::Sell,
        price: trade.price,
        quantity: trade.fee,
        quote_quantity,
        fee: Fixed::ZERO,
        fee_currency: String::new(),
        is_buyer: false,
    })
}

/// What `trade` means for `market`: the trade itself, its fee as a
/// synthetic sell, or `None` when it does not touch this market at all.
///
/// Both strategies route through here so they agree on every stream.
pub fn route_trade<'a>(
    trade: &'a Trade,
    market: &Market,
    trading_fee_currency: &str,
) -> Result<Option<Cow<'a, Trade>>, AccountingError> {
    if fees_drain_inventory(market, trading_fee_currency) && is_cross_symbol_fee(trade, market) {
        return fee_as_synthetic_sell(trade, market).map(|t| Some(Cow::Owned(t)));
    }
    if trade.symbol != market.symbol {
        return Ok(None);
    }
    Ok(Some(Cow::Borrowed(trade)))
}
