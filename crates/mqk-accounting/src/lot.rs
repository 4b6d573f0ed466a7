//! Priced inventory lots and the sell-matching policy.
//!
//! # Matching policy
//!
//! A sell is matched against lots in two ordered passes, both walking from
//! the most recently added lot to the oldest:
//!
//! 1. [`MatchPass::Profitable`]: only lots priced strictly below the sell
//!    price (consuming them realizes a gain).
//! 2. [`MatchPass::Any`]: every lot, regardless of price.
//!
//! The order is [`MATCH_POLICY`]. Changing it changes realized PnL.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fixedpoint::Fixed;

/// A discrete priced quantity acquired in one buy (or an unmatched sell
/// remnant when sitting in the pending queue).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub price: Fixed,
    pub quantity: Fixed,
}

impl Lot {
    pub fn new(price: Fixed, quantity: Fixed) -> Self {
        debug_assert!(!quantity.is_negative(), "Lot.quantity must be >= 0");
        Self { price, quantity }
    }

    /// Take up to `quantity` from this lot; returns the amount taken.
    pub fn consume(&mut self, quantity: Fixed) -> Fixed {
        let taken = self.quantity.min(quantity);
        self.quantity -= taken;
        taken
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }
}

impl fmt::Display for Lot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.price, self.quantity)
    }
}

/// Aggregate views over a run of lots.
pub trait LotSlice {
    /// `None` when the total does not fit a `Fixed`.
    fn checked_total_quantity(&self) -> Option<Fixed>;
    /// Total for a run already known to fit (e.g. a distribution's lots).
    ///
    /// # Panics
    /// If the total overflows; use
    /// [`LotSlice::checked_total_quantity`] for arbitrary input.
    fn total_quantity(&self) -> Fixed;
    /// Quantity held in lots priced strictly below `price`.
    fn quantity_below_price(&self, price: Fixed) -> Fixed;
    /// Quantity held in lots priced at or above `price`.
    fn quantity_at_or_above_price(&self, price: Fixed) -> Fixed;
}

impl LotSlice for [Lot] {
    fn checked_total_quantity(&self) -> Option<Fixed> {
        Fixed::checked_sum(self.iter().map(|l| l.quantity))
    }

    fn total_quantity(&self) -> Fixed {
        self.iter().map(|l| l.quantity).sum()
    }

    fn quantity_below_price(&self, price: Fixed) -> Fixed {
        self.iter()
            .filter(|l| l.price < price)
            .map(|l| l.quantity)
            .sum()
    }

    fn quantity_at_or_above_price(&self, price: Fixed) -> Fixed {
        self.iter()
            .filter(|l| l.price >= price)
            .map(|l| l.quantity)
            .sum()
    }
}

/// One sweep of the matcher over the lot sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchPass {
    /// Only lots whose price is below the sell price.
    Profitable,
    /// All lots.
    Any,
}

/// Passes applied to every sell, in order.
pub const MATCH_POLICY: [MatchPass; 2] = [MatchPass::Profitable, MatchPass::Any];

impl MatchPass {
    fn accepts(&self, lot: &Lot, sell: &Lot) -> bool {
        match self {
            MatchPass::Profitable => lot.price < sell.price,
            MatchPass::Any => true,
        }
    }
}

/// Run one pass newest -> oldest, moving quantity out of `lots` and
/// `sell`. Returns the quantity matched by this pass.
pub fn match_pass(lots: &mut [Lot], sell: &mut Lot, pass: MatchPass) -> Fixed {
    let mut matched = Fixed::ZERO;
    for lot in lots.iter_mut().rev() {
        if sell.is_empty() {
            break;
        }
        if lot.is_empty() || !pass.accepts(lot, sell) {
            continue;
        }
        let delta = lot.consume(sell.quantity);
        sell.consume(delta);
        matched += delta;
    }
    matched
}

/// Apply [`MATCH_POLICY`] to `sell`. Whatever remains in `sell` afterwards
/// could not be matched against `lots`.
pub fn match_sell(lots: &mut [Lot], sell: &mut Lot) -> Fixed {
    MATCH_POLICY
        .iter()
        .map(|pass| match_pass(lots, sell, *pass))
        .sum()
}
