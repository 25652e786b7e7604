//! Position and account state tracking
//!
//! Positions advance incrementally from fills and mark prices; the exchange
//! clearinghouse snapshot is the source of truth on reconnect. When the two
//! disagree the snapshot wins and the discrepancy is logged. The tracker
//! never writes back to the exchange and never invents data to paper over a
//! gap.
//!
//! Fills are de-duplicated by venue trade id: after a reconnect the venue
//! replays recent fills on the user channels, and double-applying one would
//! silently corrupt realized PnL.

use crate::connector::Connector;
use crate::decimal::Decimal;
use crate::errors::{HyperfillError, Result};
use crate::types::{Account, Fill, Position, PositionSide, Side, TradingPair};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Aggregated profit and loss across all positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortfolioPnl {
    pub unrealized: Decimal,
    pub realized: Decimal,
    /// `account balance + unrealized`
    pub equity: Decimal,
}

#[derive(Debug, Default)]
struct TrackerState {
    positions: HashMap<TradingPair, Position>,
    account: Account,
    /// Venue trade ids already applied
    processed_fills: HashSet<u64>,
}

/// Fills-driven position tracker with exchange reconciliation
#[derive(Debug, Default)]
pub struct PositionTracker {
    state: Mutex<TrackerState>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one position
    pub fn get(&self, pair: &TradingPair) -> Option<Position> {
        let state = self.state.lock().expect("tracker lock poisoned");
        state.positions.get(pair).cloned()
    }

    /// Snapshots of every tracked position, flat ones included
    pub fn positions(&self) -> Vec<Position> {
        let state = self.state.lock().expect("tracker lock poisoned");
        state.positions.values().cloned().collect()
    }

    pub fn account(&self) -> Account {
        let state = self.state.lock().expect("tracker lock poisoned");
        state.account.clone()
    }

    /// Drop flat positions from the map; returns how many were evicted
    pub fn evict_flat(&self) -> usize {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        let before = state.positions.len();
        state.positions.retain(|_, position| !position.is_flat());
        before - state.positions.len()
    }

    /// Replace tracked state with the exchange snapshot
    ///
    /// Cumulative realized PnL and open timestamps survive the sync; they
    /// are engine-side accounting the venue does not report.
    pub async fn sync(&self, connector: &dyn Connector) -> Result<()> {
        // I/O first, lock second
        let venue_positions = connector.get_positions().await?;
        let venue_account = connector.get_account().await?;

        let mut state = self.state.lock().expect("tracker lock poisoned");
        let mut fresh: HashMap<TradingPair, Position> =
            HashMap::with_capacity(venue_positions.len());

        for mut venue_position in venue_positions {
            if let Some(tracked) = state.positions.get(&venue_position.pair) {
                if tracked.size != venue_position.size || tracked.side != venue_position.side {
                    warn!(
                        pair = %venue_position.pair,
                        tracked_size = %tracked.size,
                        venue_size = %venue_position.size,
                        "position discrepancy, exchange snapshot wins"
                    );
                }
                venue_position.realized_pnl_cumulative = tracked.realized_pnl_cumulative;
                venue_position.opened_at = tracked.opened_at;
            }
            fresh.insert(venue_position.pair.clone(), venue_position);
        }

        for pair in state.positions.keys() {
            if !fresh.contains_key(pair) {
                debug!(%pair, "tracked position absent from snapshot, dropped");
            }
        }

        let realized = state.account.total_realized_pnl;
        state.positions = fresh;
        state.account = venue_account;
        state.account.total_realized_pnl = realized;
        info!(positions = state.positions.len(), "state synced from exchange");
        Ok(())
    }

    /// Revalue one position at a fresh mark price
    pub fn apply_mark_price(&self, pair: &TradingPair, mark: Decimal) -> Result<()> {
        let mut state = self.state.lock().expect("tracker lock poisoned");
        let Some(position) = state.positions.get_mut(pair) else {
            // Marks arrive for every listed instrument; untracked pairs are
            // not an error
            return Ok(());
        };
        if position.is_flat() {
            position.mark_price = Some(mark);
            return Ok(());
        }

        let sign = Decimal::from_int(position.side.sign() as i64);
        let unrealized = mark
            .try_sub(position.entry_price)?
            .try_mul(position.size)?
            .try_mul(sign)?;
        position.mark_price = Some(mark);
        position.unrealized_pnl = unrealized;
        position.return_on_equity = if position.margin_used > Decimal::ZERO {
            Some(unrealized.try_div(position.margin_used)?)
        } else {
            None
        };
        position.updated_at = Utc::now();

        let total = state
            .positions
            .values()
            .map(|p| p.unrealized_pnl)
            .try_fold(Decimal::ZERO, |acc, pnl| acc.try_add(pnl))?;
        state.account.total_unrealized_pnl = total;
        Ok(())
    }

    /// Revalue from a pair → mid map (the `allMids` feed)
    pub fn apply_mark_prices(&self, marks: &HashMap<TradingPair, Decimal>) -> Result<()> {
        for (pair, mark) in marks {
            self.apply_mark_price(pair, *mark)?;
        }
        Ok(())
    }

    /// Apply one execution to the position it touches
    ///
    /// Opening and adding move the size-weighted entry price; reducing
    /// realizes PnL against the unchanged entry. A fill that would reduce
    /// below zero is an upstream bug and fails loudly rather than being
    /// clamped.
    pub fn apply_fill(&self, fill: &Fill) -> Result<()> {
        let mut guard = self.state.lock().expect("tracker lock poisoned");
        let state = &mut *guard;
        if !state.processed_fills.insert(fill.trade_id) {
            debug!(tid = fill.trade_id, "duplicate fill dropped");
            return Ok(());
        }

        let position = state
            .positions
            .entry(fill.pair.clone())
            .or_insert_with(|| Position::flat(fill.pair.clone()));

        let fill_direction = match fill.side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        };

        let realized_delta = if position.is_flat() {
            // Opening
            position.side = fill_direction;
            position.size = fill.size;
            position.entry_price = fill.price;
            position.opened_at = Utc::now();
            Decimal::ZERO
        } else if position.side == fill_direction {
            // Adding: entry becomes the size-weighted mean
            let old_notional = position.size.try_mul(position.entry_price)?;
            let fill_notional = fill.size.try_mul(fill.price)?;
            let new_size = position.size.try_add(fill.size)?;
            position.entry_price = old_notional.try_add(fill_notional)?.try_div(new_size)?;
            position.size = new_size;
            Decimal::ZERO
        } else {
            // Reducing: realize against the entry, entry unchanged
            if fill.size > position.size {
                // Do not clamp; a reduce past zero means upstream state is
                // already wrong
                state.processed_fills.remove(&fill.trade_id);
                return Err(HyperfillError::invariant(format!(
                    "fill {} reduces {} position of {} by {}",
                    fill.trade_id, fill.pair, position.size, fill.size
                )));
            }
            let sign = Decimal::from_int(position.side.sign() as i64);
            let realized = fill
                .price
                .try_sub(position.entry_price)?
                .try_mul(fill.size)?
                .try_mul(sign)?;
            position.size = position.size.try_sub(fill.size)?;
            if position.size.is_zero() {
                position.side = PositionSide::Flat;
                position.entry_price = Decimal::ZERO;
                position.unrealized_pnl = Decimal::ZERO;
                position.return_on_equity = None;
            }
            position.realized_pnl_cumulative =
                position.realized_pnl_cumulative.try_add(realized)?;
            realized
        };

        position.updated_at = Utc::now();
        debug!(
            pair = %fill.pair,
            tid = fill.trade_id,
            size = %fill.size,
            price = %fill.price,
            realized = %realized_delta,
            "fill applied"
        );
        state.account.total_realized_pnl = state
            .account
            .total_realized_pnl
            .try_add(realized_delta)?;
        Ok(())
    }

    /// Aggregate PnL across every tracked position
    pub fn portfolio_pnl(&self) -> Result<PortfolioPnl> {
        let state = self.state.lock().expect("tracker lock poisoned");
        let unrealized = state
            .positions
            .values()
            .map(|p| p.unrealized_pnl)
            .try_fold(Decimal::ZERO, |acc, pnl| acc.try_add(pnl))?;
        let realized = state.account.total_realized_pnl;
        Ok(PortfolioPnl {
            unrealized,
            realized,
            equity: state.account.total_balance.try_add(unrealized)?,
        })
    }
}
