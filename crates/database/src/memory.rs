// In crates/database/src/memory.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use core_types::{DarvasBox, Position, PriceBar, Ticker, Transaction};
use events::EventRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Error, Ledger, PriceSource, Result};

/// Daily bars held in memory, ordered by ticker and date.
#[derive(Debug, Clone, Default)]
pub struct HistoricalStore {
    bars: BTreeMap<Ticker, BTreeMap<NaiveDate, PriceBar>>,
}

impl HistoricalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bars(bars: impl IntoIterator<Item = PriceBar>) -> Self {
        let mut store = Self::new();
        for bar in bars {
            store.insert(bar);
        }
        store
    }

    /// Replaces any bar already stored for the same (ticker, date).
    pub fn insert(&mut self, bar: PriceBar) {
        self.bars
            .entry(bar.ticker.clone())
            .or_default()
            .insert(bar.date, bar);
    }

    pub fn len(&self) -> usize {
        self.bars.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars strictly before `before`, most recent first.
    fn history_before<'a>(
        &'a self,
        ticker: &Ticker,
        before: NaiveDate,
    ) -> impl Iterator<Item = &'a PriceBar> + 'a {
        self.bars
            .get(ticker)
            .into_iter()
            .flat_map(move |series| series.range(..before).rev().map(|(_, bar)| bar))
    }
}

impl PriceSource for HistoricalStore {
    fn bar(&self, ticker: &Ticker, date: NaiveDate) -> Result<Option<PriceBar>> {
        Ok(self.bars.get(ticker).and_then(|s| s.get(&date)).cloned())
    }

    fn earliest_close(&self, ticker: &Ticker) -> Result<Option<(NaiveDate, Decimal)>> {
        Ok(self
            .bars
            .get(ticker)
            .and_then(|s| s.first_key_value())
            .map(|(date, bar)| (*date, bar.close)))
    }

    fn prev_trading_day(&self, ticker: &Ticker, before: NaiveDate) -> Result<Option<NaiveDate>> {
        Ok(self.history_before(ticker, before).next().map(|b| b.date))
    }

    fn prev_close(&self, ticker: &Ticker, before: NaiveDate) -> Result<Option<Decimal>> {
        Ok(self.history_before(ticker, before).next().map(|b| b.close))
    }

    fn recent_closes(&self, ticker: &Ticker, before: NaiveDate, lookback: usize) -> Result<Vec<Decimal>> {
        Ok(self
            .history_before(ticker, before)
            .take(lookback)
            .map(|b| b.close)
            .collect())
    }

    fn recent_volumes(&self, ticker: &Ticker, before: NaiveDate, lookback: usize) -> Result<Vec<Decimal>> {
        Ok(self
            .history_before(ticker, before)
            .filter_map(|b| b.volume)
            .take(lookback)
            .collect())
    }

    fn max_high(&self, ticker: &Ticker, before: NaiveDate, lookback: usize) -> Result<Option<Decimal>> {
        Ok(self
            .history_before(ticker, before)
            .take(lookback)
            .map(|b| b.high)
            .max())
    }

    fn lowest_low_between(&self, ticker: &Ticker, from: NaiveDate, to: NaiveDate) -> Result<Option<Decimal>> {
        if from > to {
            return Ok(None);
        }
        Ok(self
            .bars
            .get(ticker)
            .and_then(|s| s.range(from..=to).map(|(_, b)| b.low).min()))
    }

    fn last_bar(&self, ticker: &Ticker) -> Result<Option<PriceBar>> {
        Ok(self
            .bars
            .get(ticker)
            .and_then(|s| s.last_key_value())
            .map(|(_, bar)| bar.clone()))
    }

    fn tickers(&self) -> Result<Vec<Ticker>> {
        Ok(self.bars.keys().cloned().collect())
    }

    fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        if start > end {
            return Ok(Vec::new());
        }
        let dates: BTreeSet<NaiveDate> = self
            .bars
            .values()
            .flat_map(|s| s.range(start..=end).map(|(date, _)| *date))
            .collect();
        Ok(dates.into_iter().collect())
    }
}

/// A ledger kept entirely in memory.
///
/// It serializes to a single JSON document so the live cycle can persist it
/// between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryLedger {
    wallet_cash: Decimal,
    next_box_id: u64,
    boxes: BTreeMap<Ticker, Vec<DarvasBox>>,
    streaks: BTreeMap<Ticker, u32>,
    heights: BTreeMap<Ticker, Decimal>,
    #[serde(default)]
    loss_pending: BTreeSet<Ticker>,
    positions: BTreeMap<Ticker, Position>,
    transactions: Vec<Transaction>,
    events: Vec<EventRecord>,
}

impl MemoryLedger {
    pub fn new(starting_cash: Decimal) -> Self {
        Self { wallet_cash: starting_cash, next_box_id: 1, ..Default::default() }
    }

    fn active_box_mut(&mut self, ticker: &Ticker) -> Result<&mut DarvasBox> {
        self.boxes
            .get_mut(ticker)
            .and_then(|boxes| boxes.iter_mut().rev().find(|b| b.active))
            .ok_or_else(|| Error::NoActiveBox(ticker.clone()))
    }
}

impl Ledger for MemoryLedger {
    fn active_box(&self, ticker: &Ticker) -> Result<Option<DarvasBox>> {
        Ok(self
            .boxes
            .get(ticker)
            .and_then(|boxes| boxes.iter().rev().find(|b| b.active))
            .cloned())
    }

    fn open_box(&mut self, mut darvas_box: DarvasBox) -> Result<DarvasBox> {
        if let Some(existing) = self.active_box(&darvas_box.ticker)? {
            return Err(Error::ActiveBoxExists { ticker: existing.ticker, box_id: existing.id });
        }
        // A snapshot from an older build may carry a zero counter.
        self.next_box_id = self.next_box_id.max(1);
        darvas_box.id = self.next_box_id;
        darvas_box.active = true;
        darvas_box.end_date = None;
        self.next_box_id += 1;
        self.boxes
            .entry(darvas_box.ticker.clone())
            .or_default()
            .push(darvas_box.clone());
        Ok(darvas_box)
    }

    fn close_active_box(&mut self, ticker: &Ticker, end_date: NaiveDate) -> Result<()> {
        let active = self.active_box_mut(ticker)?;
        active.end_date = Some(end_date);
        active.active = false;
        Ok(())
    }

    fn extend_active_box(&mut self, ticker: &Ticker, end_date: NaiveDate) -> Result<()> {
        self.active_box_mut(ticker)?.end_date = Some(end_date);
        Ok(())
    }

    fn boxes(&self, ticker: &Ticker) -> Result<Vec<DarvasBox>> {
        Ok(self.boxes.get(ticker).cloned().unwrap_or_default())
    }

    fn breakout_streak(&self, ticker: &Ticker) -> Result<u32> {
        Ok(self.streaks.get(ticker).copied().unwrap_or(0))
    }

    fn set_breakout_streak(&mut self, ticker: &Ticker, streak: u32) -> Result<()> {
        self.streaks.insert(ticker.clone(), streak);
        Ok(())
    }

    fn box_height(&self, ticker: &Ticker) -> Result<Option<Decimal>> {
        Ok(self.heights.get(ticker).copied())
    }

    fn set_box_height(&mut self, ticker: &Ticker, height: Decimal) -> Result<()> {
        self.heights.insert(ticker.clone(), height);
        Ok(())
    }

    fn set_loss_pending(&mut self, ticker: &Ticker) -> Result<()> {
        self.loss_pending.insert(ticker.clone());
        Ok(())
    }

    fn take_loss_pending(&mut self, ticker: &Ticker) -> Result<bool> {
        Ok(self.loss_pending.remove(ticker))
    }

    fn position(&self, ticker: &Ticker) -> Result<Option<Position>> {
        Ok(self.positions.get(ticker).cloned())
    }

    fn open_position(&mut self, position: Position) -> Result<()> {
        if self.positions.contains_key(&position.ticker) {
            return Err(Error::PositionExists(position.ticker));
        }
        self.positions.insert(position.ticker.clone(), position);
        Ok(())
    }

    fn set_stop_loss(&mut self, ticker: &Ticker, stop_loss: Decimal) -> Result<()> {
        let position = self
            .positions
            .get_mut(ticker)
            .ok_or_else(|| Error::NoPosition(ticker.clone()))?;
        position.stop_loss = stop_loss;
        Ok(())
    }

    fn close_position(&mut self, ticker: &Ticker) -> Result<Position> {
        self.positions
            .remove(ticker)
            .ok_or_else(|| Error::NoPosition(ticker.clone()))
    }

    fn positions(&self) -> Result<Vec<Position>> {
        Ok(self.positions.values().cloned().collect())
    }

    fn wallet_cash(&self) -> Result<Decimal> {
        Ok(self.wallet_cash)
    }

    fn set_wallet_cash(&mut self, cash: Decimal) -> Result<()> {
        self.wallet_cash = cash;
        Ok(())
    }

    fn record_transaction(&mut self, txn: Transaction) -> Result<()> {
        self.transactions.push(txn);
        Ok(())
    }

    fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.transactions.clone())
    }

    fn log_event(&mut self, event: EventRecord) -> Result<()> {
        self.events.push(event);
        Ok(())
    }

    fn events(&self) -> Result<Vec<EventRecord>> {
        Ok(self.events.clone())
    }
}
