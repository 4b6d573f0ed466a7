use std::fmt;

use crate::fixedpoint::Fixed;

/// Malformed upstream data rejected at the ingestion boundary.
///
/// Accounting state is never mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountingError {
    /// `Trade.symbol` must be non-empty.
    EmptySymbol,
    /// `Trade.price` must be strictly positive.
    NonPositivePrice { price: Fixed },
    /// `Trade.quantity` must be >= 0.
    NegativeQuantity { quantity: Fixed },
    /// `Trade.fee` must be >= 0.
    NegativeFee { fee: Fixed },
    /// `Trade.quote_quantity` must be >= 0.
    NegativeQuoteQuantity { quote_quantity: Fixed },
    /// A base-currency fee larger than the bought quantity.
    FeeExceedsQuantity { fee: Fixed, quantity: Fixed },
    /// Decimal text that is not a valid 8-decimal amount.
    InvalidDecimal { raw: String },
    /// An input amount outside the representable `Fixed` range.
    OutOfRange { value: String },
    /// A derived amount (notional, balance, running total) would leave the
    /// representable `Fixed` range.
    Overflow { operation: &'static str },
}

impl fmt::Display for AccountingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySymbol => write!(f, "trade invariant: symbol must not be empty"),
            Self::NonPositivePrice { price } => {
                write!(f, "trade invariant: price must be > 0, got {price}")
            }
            Self::NegativeQuantity { quantity } => {
                write!(f, "trade invariant: quantity must be >= 0, got {quantity}")
            }
            Self::NegativeFee { fee } => {
                write!(f, "trade invariant: fee must be >= 0, got {fee}")
            }
            Self::NegativeQuoteQuantity { quote_quantity } => write!(
                f,
                "trade invariant: quote quantity must be >= 0, got {quote_quantity}"
            ),
            Self::FeeExceedsQuantity { fee, quantity } => write!(
                f,
                "trade invariant: base fee {fee} exceeds bought quantity {quantity}"
            ),
            Self::InvalidDecimal { raw } => {
                write!(f, "invalid decimal (max 8 fractional digits): '{raw}'")
            }
            Self::OutOfRange { value } => write!(
                f,
                "amount {value} is outside the representable range (|x| < {})",
                Fixed::MAX
            ),
            Self::Overflow { operation } => {
                write!(f, "amount overflow in {operation}")
            }
        }
    }
}

impl std::error::Error for AccountingError {}
