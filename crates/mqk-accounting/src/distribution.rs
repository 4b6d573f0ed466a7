//! FIFO lot-inventory distribution for one symbol.
//!
//! Every buy becomes a [`Lot`]; every sell is matched against specific lots
//! with the policy in [`crate::lot`]. A sell that finds no inventory is parked
//! in a pending queue and retried whenever a new lot arrives.
//!
//! # Concurrency
//! Lots and pending sells live behind a single `Mutex`. `stock` appends under
//! the lock and releases it; the pending-sell flush then re-acquires it once
//! and matches every queued sell in place, so no lock is held across a call
//! that locks again. Pending sells never leave the queue while they still
//! hold quantity, so their FIFO order holds with any number of writers.
//!
//! # Range
//! Lot quantities and pending quantities each sum to a representable
//! `Fixed`: `stock` and `consume` refuse anything that would break that, so
//! every read-side total (and every `stats` band, a subset of the total) is
//! computed without overflow.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AccountingError;
use crate::fee::{normalize, route_trade, NormalizedTrade};
use crate::fixedpoint::Fixed;
use crate::lot::{match_sell, Lot, LotSlice};
use crate::types::{Market, Side, Trade};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Inventory bucketed into price bands (derived, recomputed on demand).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionStats {
    /// Band keys (`{:.2}`), ascending by price.
    pub price_levels: Vec<String>,
    pub total_quantity: Fixed,
    pub quantities: BTreeMap<String, Fixed>,
    pub lots: BTreeMap<String, Vec<Lot>>,
}

/// Result of matching one sell: `matched + pending == sell quantity`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConsumeOutcome {
    pub matched: Fixed,
    /// Quantity appended to the pending-sell queue.
    pub pending: Fixed,
}

// ---------------------------------------------------------------------------
// LotDistribution
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Inventory {
    /// Arrival order: oldest first.
    lots: Vec<Lot>,
    pending_sells: VecDeque<Lot>,
}

#[derive(Debug)]
pub struct LotDistribution {
    market: Market,
    trading_fee_currency: String,
    inventory: Mutex<Inventory>,
}

impl LotDistribution {
    pub fn new(market: Market, trading_fee_currency: impl Into<String>) -> Self {
        Self {
            market,
            trading_fee_currency: trading_fee_currency.into(),
            inventory: Mutex::new(Inventory::default()),
        }
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn trading_fee_currency(&self) -> &str {
        &self.trading_fee_currency
    }

    // Every critical section leaves lots and pending sells consistent, so a
    // poisoned lock still guards valid data.
    fn inventory(&self) -> MutexGuard<'_, Inventory> {
        self.inventory.lock().unwrap_or_else(PoisonError::into_inner)
    }


    // -----------------------------------------------------------------------
    // Write surface
    // -----------------------------------------------------------------------

    /// Ingest a batch of trades and return checkpoint indices.
    ///
    /// A checkpoint is the index of a buy that arrives while the inventory
    /// holds no quantity, i.e. the start of a new holding period. Index 0 is
    /// never reported: the first holding period starts implicitly.
    ///
    /// # Errors
    /// Every trade for this symbol is validated and fee-normalized, and the
    /// batch's buys and sells are checked against the inventory's range,
    /// before any state changes; a malformed or unrepresentable trade rejects
    /// the whole batch. A concurrent writer can still exhaust the range
    /// between that check and this batch's writes, in which case the batch
    /// stops at the offending trade with [`AccountingError::Overflow`].
    pub fn add_trades(&self, trades: &[Trade]) -> Result<Vec<usize>, AccountingError> {
        let mut batch: Vec<(usize, NormalizedTrade)> = Vec::with_capacity(trades.len());
        for (idx, raw) in trades.iter().enumerate() {
            if let Some(trade) = route_trade(raw, &self.market, &self.trading_fee_currency)? {
                batch.push((idx, normalize(&trade, &self.market)?));
            }
        }
        self.check_batch_range(&batch)?;

        let mut checkpoints = Vec::new();
        for (idx, n) in batch {
            let lot = Lot::new(n.price, n.quantity);
            match n.side {
                Side::Buy => {
                    if idx > 0 && self.total_quantity().is_zero() {
                        debug!(symbol = %self.market.symbol, idx, "holding period checkpoint");
                        checkpoints.push(idx);
                    }
                    self.stock(lot)?;
                }
                Side::Sell => {
                    self.consume(lot)?;
                }
            }
        }

        self.flush_pending_sells();
        self.squash();

        Ok(checkpoints)
    }

    // Worst case for the batch: every buy lands in `lots` and every sell
    // lands in `pending_sells`.
    fn check_batch_range(&self, batch: &[(usize, NormalizedTrade)]) -> Result<(), AccountingError> {
        let side_total = |side: Side| {
            batch
                .iter()
                .filter(move |(_, n)| n.side == side)
                .map(|(_, n)| n.quantity)
        };

        let inv = self.inventory();
        let lots_fit = Fixed::checked_sum(
            inv.lots
                .iter()
                .map(|l| l.quantity)
                .chain(side_total(Side::Buy)),
        );
        let pending_fit = Fixed::checked_sum(
            inv.pending_sells
                .iter()
                .map(|l| l.quantity)
                .chain(side_total(Side::Sell)),
        );
        if lots_fit.is_none() {
            return Err(AccountingError::Overflow {
                operation: "lot inventory total",
            });
        }
        if pending_fit.is_none() {
            return Err(AccountingError::Overflow {
                operation: "pending sell total",
            });
        }
        Ok(())
    }

    /// Append a lot, then retry pending sells against the new inventory.
    ///
    /// # Errors
    /// [`AccountingError::Overflow`] if the inventory total would leave the
    /// `Fixed` range; nothing is appended in that case.
    pub fn stock(&self, lot: Lot) -> Result<(), AccountingError> {
        {
            let mut inv = self.inventory();
            let fits = inv
                .lots
                .checked_total_quantity()
                .and_then(|t| t.checked_add(lot.quantity));
            if fits.is_none() {
                return Err(AccountingError::Overflow {
                    operation: "lot inventory total",
                });
            }
            inv.lots.push(lot);
        }
        self.flush_pending_sells();
        Ok(())
    }

    /// Match `sell` against inventory; any unmatched remainder is queued.
    ///
    /// # Errors
    /// [`AccountingError::Overflow`] if queueing the remainder would push the
    /// pending total out of the `Fixed` range. The check runs before any lot
    /// is touched, so an error leaves the inventory unchanged.
    pub fn consume(&self, mut sell: Lot) -> Result<ConsumeOutcome, AccountingError> {
        let mut inv = self.inventory();
        let pending_fits = Fixed::checked_sum(
            inv.pending_sells
                .iter()
                .map(|l| l.quantity)
                .chain(std::iter::once(sell.quantity)),
        );
        if pending_fits.is_none() {
            return Err(AccountingError::Overflow {
                operation: "pending sell total",
            });
        }

        let matched = match_sell(&mut inv.lots, &mut sell);
        let pending = sell.quantity;

        if pending.is_positive() {
            debug!(
                symbol = %self.market.symbol,
                price = %sell.price,
                pending = %pending,
                "insufficient inventory, sell deferred"
            );
            inv.pending_sells.push_back(sell);
        }

        Ok(ConsumeOutcome { matched, pending })
    }

    /// Match every pending sell, oldest first, against the current lots.
    ///
    /// No-op while there are no lots or nothing is pending. Sells are matched
    /// in place, so whatever remains keeps its position in the queue.
    pub fn flush_pending_sells(&self) {
        let mut inv = self.inventory();
        if inv.lots.is_empty() || inv.pending_sells.is_empty() {
            return;
        }

        let Inventory {
            lots,
            pending_sells,
        } = &mut *inv;
        for sell in pending_sells.iter_mut() {
            match_sell(lots, sell);
        }
        pending_sells.retain(|sell| !sell.is_empty());
    }

    /// Drop lots that have been fully consumed.
    pub fn squash(&self) {
        self.inventory().lots.retain(|lot| !lot.is_empty());
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// Lots in arrival order (oldest first).
    pub fn lots(&self) -> Vec<Lot> {
        self.inventory().lots.clone()
    }

    /// Unmatched sell remnants in arrival order.
    pub fn pending_sells(&self) -> Vec<Lot> {
        self.inventory().pending_sells.iter().cloned().collect()
    }

    pub fn pending_quantity(&self) -> Fixed {
        self.inventory().pending_sells.iter().map(|s| s.quantity).sum()
    }

    pub fn total_quantity(&self) -> Fixed {
        self.inventory().lots.total_quantity()
    }

    pub fn quantity_below_price(&self, price: Fixed) -> Fixed {
        self.inventory().lots.quantity_below_price(price)
    }

    pub fn quantity_at_or_above_price(&self, price: Fixed) -> Fixed {
        self.inventory().lots.quantity_at_or_above_price(price)
    }

    /// Bucket lots into price bands.
    ///
    /// Band width is `10^(ceil(log10(price)) - max(level, 1))`; each lot's
    /// price is floored to its band. Larger `level` gives finer bands.
    pub fn stats(&self, level: u32) -> DistributionStats {
        let lots = self.lots();

        let mut stats = DistributionStats::default();
        let mut bands: BTreeMap<Fixed, String> = BTreeMap::new();

        for lot in lots {
            let band = price_band(lot.price, level);
            let key = format!("{:.2}", band.to_f64());

            stats.total_quantity += lot.quantity;
            *stats.quantities.entry(key.clone()).or_insert(Fixed::ZERO) += lot.quantity;
            stats.lots.entry(key.clone()).or_default().push(lot);
            bands.insert(band, key);
        }

        for key in bands.into_values() {
            if stats.price_levels.last() != Some(&key) {
                stats.price_levels.push(key);
            }
        }

        stats
    }
}

/// Floor `price` to its band at `level`, computed on raw 1e-8 units so
/// decimal prices like `0.3` do not pick up float error.
pub fn price_band(price: Fixed, level: u32) -> Fixed {
    let raw = price.raw() as i128;
    if raw <= 0 {
        return price;
    }

    // Smallest k with 10^k >= raw, i.e. ceil(log10(price)) + 8.
    let mut k: i64 = 0;
    let mut pow: i128 = 1;
    while pow < raw {
        pow *= 10;
        k += 1;
    }

    let exponent = k - i64::from(level.max(1));
    if exponent <= 0 {
        return price;
    }
    let width = 10i128.pow(exponent as u32);
    Fixed::new(((raw / width) * width) as i64)
}
