use serde::{Deserialize, Serialize};

use crate::error::AccountingError;
use crate::fixedpoint::Fixed;

/// BUY or SELL from the trader's point of view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// A single executed trade as delivered by the exchange or backtest feed.
///
/// quantity is in base units, quote_quantity in quote units.
/// fee is an absolute amount in `fee_currency` (>= 0).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    #[serde(default)]
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub price: Fixed,
    pub quantity: Fixed,
    pub quote_quantity: Fixed,
    #[serde(default)]
    pub fee: Fixed,
    #[serde(default)]
    pub fee_currency: String,
    pub is_buyer: bool,
}

impl Trade {
    /// Trade with `quote_quantity = price × quantity` and no fee.
    ///
    /// # Panics
    /// If the notional leaves the `Fixed` range. Feed data arrives through
    /// serde and is range-checked by [`Trade::validate`] instead.
    pub fn new<S: Into<String>>(symbol: S, side: Side, price: Fixed, quantity: Fixed) -> Self {
        Self {
            id: 0,
            symbol: symbol.into(),
            side,
            price,
            quantity,
            quote_quantity: price * quantity,
            fee: Fixed::ZERO,
            fee_currency: String::new(),
            is_buyer: side == Side::Buy,
        }
    }

    pub fn buy<S: Into<String>>(symbol: S, price: Fixed, quantity: Fixed) -> Self {
        Self::new(symbol, Side::Buy, price, quantity)
    }

    pub fn sell<S: Into<String>>(symbol: S, price: Fixed, quantity: Fixed) -> Self {
        Self::new(symbol, Side::Sell, price, quantity)
    }

    pub fn with_fee<S: Into<String>>(mut self, fee: Fixed, currency: S) -> Self {
        self.fee = fee;
        self.fee_currency = currency.into();
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Check the record-level invariants (price > 0, quantity >= 0, fee >= 0,
    /// quote quantity >= 0) and that the trade's notional and fee-adjusted
    /// amounts fit the `Fixed` range.
    pub fn validate(&self) -> Result<(), AccountingError> {
        if self.symbol.trim().is_empty() {
            return Err(AccountingError::EmptySymbol);
        }
        if !self.price.is_positive() {
            return Err(AccountingError::NonPositivePrice { price: self.price });
        }
        if self.quantity.is_negative() {
            return Err(AccountingError::NegativeQuantity {
                quantity: self.quantity,
            });
        }
        if self.fee.is_negative() {
            return Err(AccountingError::NegativeFee { fee: self.fee });
        }
        if self.quote_quantity.is_negative() {
            return Err(AccountingError::NegativeQuoteQuantity {
                quote_quantity: self.quote_quantity,
            });
        }
        // Everything derived from one trade must stay representable.
        if self.price.checked_mul(self.quantity).is_none() {
            return Err(AccountingError::Overflow {
                operation: "trade notional (price x quantity)",
            });
        }
        if self.quantity.checked_add(self.fee).is_none()
            || self.quote_quantity.checked_add(self.fee).is_none()
        {
            return Err(AccountingError::Overflow {
                operation: "fee-adjusted trade amount",
            });
        }
        Ok(())
    }
}

/// Instrument metadata supplied by market configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub symbol: String,
    pub base_currency: String,
    pub quote_currency: String,
}

impl Market {
    pub fn new<S, B, Q>(symbol: S, base_currency: B, quote_currency: Q) -> Self
    where
        S: Into<String>,
        B: Into<String>,
        Q: Into<String>,
    {
        Self {
            symbol: symbol.into(),
            base_currency: base_currency.into(),
            quote_currency: quote_currency.into(),
        }
    }
}
