// In crates/strategies/src/darvas.rs

use crate::types::{DarvasSettings, DecisionRequest};
use crate::{Error, Result, Strategy};
use core_types::{round_price, DarvasBox, Decision};
use database::{Ledger, PriceSource};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Open must be within 5% of the lookback high.
const LEADER_PRICE_RATIO: Decimal = dec!(0.95);
/// Previous day's volume must be 30% above the lookback average.
const LEADER_VOLUME_RATIO: Decimal = dec!(1.3);

/// Darvas box breakout rules with a leader-quality gate.
///
/// Each ticker carries one active box sized around an anchor close. Opens
/// above the box count towards a breakout streak; once the streak is long
/// enough and the gate passes, the strategy buys with the broken box's floor
/// as the stop. While holding, every breakout re-anchors the box and raises
/// the stop to the new floor.
#[derive(Debug, Clone)]
pub struct DarvasBreakout {
    settings: DarvasSettings,
}

impl DarvasBreakout {
    pub fn new(settings: DarvasSettings) -> Result<Self> {
        if settings.default_height <= Decimal::ZERO || settings.default_height >= Decimal::ONE {
            return Err(Error::InvalidSettings(format!(
                "default box height must be in (0, 1), got {}",
                settings.default_height
            )));
        }
        if settings.height_increment.is_sign_negative() {
            return Err(Error::InvalidSettings(format!(
                "height increment must not be negative, got {}",
                settings.height_increment
            )));
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &DarvasSettings {
        &self.settings
    }

    /// Reads the ticker's box height, growing it after a losing exit.
    fn current_height(&self, ledger: &mut dyn Ledger, req: &DecisionRequest) -> Result<Decimal> {
        let mut height = ledger
            .box_height(&req.ticker)?
            .unwrap_or(self.settings.default_height);
        if req.loss_occurred && self.settings.height_increment > Decimal::ZERO {
            height += self.settings.height_increment;
            debug!(ticker = %req.ticker, date = %req.trade_date, %height, "Loss carried over; box height raised");
        }
        ledger.set_box_height(&req.ticker, height)?;
        Ok(height)
    }

    /// Closes `current` on the previous trading day and opens a replacement
    /// anchored at the previous close.
    fn roll_box(
        &self,
        prices: &dyn PriceSource,
        ledger: &mut dyn Ledger,
        current: &DarvasBox,
        req: &DecisionRequest,
        height: Decimal,
    ) -> Result<DarvasBox> {
        let end_date = prices
            .prev_trading_day(&req.ticker, req.trade_date)?
            .unwrap_or(current.start_date);
        ledger.close_active_box(&req.ticker, end_date)?;

        let base_close = prices
            .prev_close(&req.ticker, req.trade_date)?
            .unwrap_or(req.open_price);
        let next = ledger.open_box(DarvasBox::anchored(
            req.ticker.clone(),
            req.trade_date,
            base_close,
            height,
        ))?;
        Ok(next)
    }

    /// Relative strength and volume surge over the lookback window.
    fn leader_gate(&self, prices: &dyn PriceSource, req: &DecisionRequest) -> Result<bool> {
        let lookback = self.settings.leader_lookback_days as usize;
        if lookback == 0 {
            return Ok(true);
        }

        let price_ok = match prices.max_high(&req.ticker, req.trade_date, lookback)? {
            Some(max_high) => req.open_price >= LEADER_PRICE_RATIO * max_high,
            None => false,
        };

        let volumes = prices.recent_volumes(&req.ticker, req.trade_date, lookback)?;
        let volume_ok = match volumes.split_first() {
            Some((previous, rest)) if !rest.is_empty() => {
                let average = rest.iter().sum::<Decimal>() / Decimal::from(rest.len());
                *previous >= LEADER_VOLUME_RATIO * average
            }
            _ => false,
        };

        debug!(ticker = %req.ticker, date = %req.trade_date, price_ok, volume_ok, "Leader gate evaluated");
        Ok(price_ok && volume_ok)
    }
}

impl Strategy for DarvasBreakout {
    fn name(&self) -> &'static str {
        "DarvasBreakout"
    }

    fn decide(
        &self,
        prices: &dyn PriceSource,
        ledger: &mut dyn Ledger,
        req: &DecisionRequest,
    ) -> Result<Decision> {
        let ticker = &req.ticker;
        let open = req.open_price;
        let height = self.current_height(ledger, req)?;

        // --- 1. Make sure there is a box to compare against ---
        let darvas_box = match ledger.active_box(ticker)? {
            Some(active) => active,
            None => match prices.earliest_close(ticker)? {
                Some((date, close)) => {
                    ledger.open_box(DarvasBox::anchored(ticker.clone(), date, close, height))?
                }
                None => {
                    ledger.set_breakout_streak(ticker, 0)?;
                    debug!(%ticker, date = %req.trade_date, %open, "NO_OP: no price history to anchor a box");
                    return Ok(Decision::NoOp);
                }
            },
        };

        // --- 2. Holding: only ever raise the stop ---
        if let Some(position) = ledger.position(ticker)?.filter(|p| p.qty > 0) {
            if !darvas_box.is_breakout(open) {
                debug!(%ticker, date = %req.trade_date, %open, "NO_OP: holding, open not above box");
                return Ok(Decision::NoOp);
            }
            let next = self.roll_box(prices, ledger, &darvas_box, req, height)?;
            let new_stop = round_price(next.min_price);
            if new_stop > position.stop_loss {
                debug!(%ticker, date = %req.trade_date, %open, from = %position.stop_loss, to = %new_stop, "UPDATE_STOP_LOSS: price above box");
                return Ok(Decision::UpdateStopLoss { stop_loss: new_stop });
            }
            debug!(%ticker, date = %req.trade_date, %open, %new_stop, current = %position.stop_loss, "NO_OP: new box floor does not raise the stop");
            return Ok(Decision::NoOp);
        }

        // --- 3. Flat: track the box and the breakout streak ---
        if darvas_box.is_breakdown(open) {
            self.roll_box(prices, ledger, &darvas_box, req, height)?;
            ledger.set_breakout_streak(ticker, 0)?;
            debug!(%ticker, date = %req.trade_date, %open, min = %darvas_box.min_price, "NO_OP: open below box; streak reset");
            return Ok(Decision::NoOp);
        }

        if darvas_box.contains(open) {
            ledger.extend_active_box(ticker, req.trade_date)?;
            debug!(%ticker, date = %req.trade_date, %open, "NO_OP: open within box");
            return Ok(Decision::NoOp);
        }

        let streak = ledger.breakout_streak(ticker)?.saturating_add(1);
        let gate_passed = self.leader_gate(prices, req)?;

        if streak >= self.settings.breakout_streak && gate_passed {
            let stop_loss = round_price(darvas_box.min_price);
            ledger.set_breakout_streak(ticker, 0)?;
            self.roll_box(prices, ledger, &darvas_box, req, height)?;
            debug!(%ticker, date = %req.trade_date, %open, streak, %stop_loss, "BUY: breakout confirmed");
            return Ok(Decision::Buy { stop_loss });
        }

        ledger.set_breakout_streak(ticker, streak)?;
        self.roll_box(prices, ledger, &darvas_box, req, height)?;
        let reason = if streak < self.settings.breakout_streak { "streak not met" } else { "leader gate failed" };
        debug!(%ticker, date = %req.trade_date, %open, streak, reason, "NO_OP: breakout not acted on");
        Ok(Decision::NoOp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::{Position, PriceBar, Ticker};
    use database::{HistoricalStore, MemoryLedger};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn bar(d: u32, close: Decimal, volume: Decimal) -> PriceBar {
        PriceBar {
            date: day(d),
            ticker: Ticker::new("X"),
            open: close,
            high: close + dec!(1),
            low: close - dec!(1),
            close,
            volume: Some(volume),
        }
    }

    fn settings(streak: u32, lookback: u32) -> DarvasSettings {
        DarvasSettings {
            leader_lookback_days: lookback,
            breakout_streak: streak,
            default_height: dec!(0.01),
            height_increment: dec!(0.01),
        }
    }

    fn request(d: u32, open: Decimal) -> DecisionRequest {
        DecisionRequest {
            ticker: Ticker::new("X"),
            trade_date: day(d),
            open_price: open,
            loss_occurred: false,
        }
    }

    fn hold(ledger: &mut MemoryLedger, stop_loss: Decimal) {
        ledger
            .open_position(Position {
                ticker: Ticker::new("X"),
                qty: 10,
                buy_price: dec!(102),
                stop_loss,
                buy_date: day(3),
            })
            .unwrap();
    }

    #[test]
    fn breakout_buys_with_box_floor_as_stop() {
        let store = HistoricalStore::from_bars([bar(2, dec!(100), dec!(1000))]);
        let mut ledger = MemoryLedger::new(dec!(1000));
        let engine = DarvasBreakout::new(settings(1, 0)).unwrap();

        let decision = engine.decide(&store, &mut ledger, &request(3, dec!(102))).unwrap();
        assert_eq!(decision, Decision::Buy { stop_loss: dec!(99) });
        assert_eq!(decision.stop_loss().unwrap().to_string(), "99.0000");

        let x = Ticker::new("X");
        assert_eq!(ledger.breakout_streak(&x).unwrap(), 0);
        let boxes = ledger.boxes(&x).unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].end_date, Some(day(2)));
        assert!(!boxes[0].active);
        assert_eq!(boxes[1].start_date, day(3));
        assert_eq!(boxes[1].base_close, dec!(100));
    }

    #[test]
    fn open_within_box_extends_it() {
        let store = HistoricalStore::from_bars([bar(2, dec!(100), dec!(1000))]);
        let mut ledger = MemoryLedger::new(dec!(1000));
        let engine = DarvasBreakout::new(settings(1, 0)).unwrap();

        let decision = engine.decide(&store, &mut ledger, &request(3, dec!(101))).unwrap();
        assert_eq!(decision, Decision::NoOp);
        let active = ledger.active_box(&Ticker::new("X")).unwrap().unwrap();
        assert_eq!(active.end_date, Some(day(3)));
        assert_eq!(active.start_date, day(2));
    }

    #[test]
    fn breakdown_resets_streak_and_reanchors() {
        let store = HistoricalStore::from_bars([
            bar(2, dec!(100), dec!(1000)),
            bar(3, dec!(97), dec!(1000)),
        ]);
        let mut ledger = MemoryLedger::new(dec!(1000));
        let x = Ticker::new("X");
        ledger.set_breakout_streak(&x, 3).unwrap();
        let engine = DarvasBreakout::new(settings(5, 0)).unwrap();

        let decision = engine.decide(&store, &mut ledger, &request(4, dec!(96))).unwrap();
        assert_eq!(decision, Decision::NoOp);
        assert_eq!(ledger.breakout_streak(&x).unwrap(), 0);
        let active = ledger.active_box(&x).unwrap().unwrap();
        assert_eq!(active.base_close, dec!(97));
        assert_eq!(active.start_date, day(4));
        assert_eq!(ledger.boxes(&x).unwrap()[0].end_date, Some(day(3)));
    }

    #[test]
    fn streak_must_be_met_before_buying() {
        let store = HistoricalStore::from_bars([
            bar(2, dec!(100), dec!(1000)),
            bar(3, dec!(102), dec!(1000)),
        ]);
        let mut ledger = MemoryLedger::new(dec!(1000));
        let engine = DarvasBreakout::new(settings(2, 0)).unwrap();
        let x = Ticker::new("X");

        let first = engine.decide(&store, &mut ledger, &request(3, dec!(102))).unwrap();
        assert_eq!(first, Decision::NoOp);
        assert_eq!(ledger.breakout_streak(&x).unwrap(), 1);

        // The rolled box is anchored at 100, so 104 is a second breakout.
        let second = engine.decide(&store, &mut ledger, &request(4, dec!(104))).unwrap();
        assert_eq!(second, Decision::Buy { stop_loss: dec!(99) });
        assert_eq!(ledger.breakout_streak(&x).unwrap(), 0);
    }

    #[test]
    fn holding_breakout_ratchets_stop_up_only() {
        let store = HistoricalStore::from_bars([
            bar(2, dec!(100), dec!(1000)),
            bar(3, dec!(104), dec!(1000)),
        ]);
        let engine = DarvasBreakout::new(settings(1, 0)).unwrap();

        let mut ledger = MemoryLedger::new(dec!(1000));
        hold(&mut ledger, dec!(99));
        let raised = engine.decide(&store, &mut ledger, &request(4, dec!(105))).unwrap();
        assert_eq!(raised, Decision::UpdateStopLoss { stop_loss: dec!(102.96) });

        let mut ledger = MemoryLedger::new(dec!(1000));
        hold(&mut ledger, dec!(103));
        let kept = engine.decide(&store, &mut ledger, &request(4, dec!(105))).unwrap();
        assert_eq!(kept, Decision::NoOp);
        // The box still rolls even when the stop stays put.
        assert_eq!(ledger.active_box(&Ticker::new("X")).unwrap().unwrap().base_close, dec!(104));
    }

    #[test]
    fn holding_inside_box_is_a_no_op() {
        let store = HistoricalStore::from_bars([bar(2, dec!(100), dec!(1000))]);
        let engine = DarvasBreakout::new(settings(1, 0)).unwrap();
        let mut ledger = MemoryLedger::new(dec!(1000));
        hold(&mut ledger, dec!(99));

        assert_eq!(engine.decide(&store, &mut ledger, &request(3, dec!(95))).unwrap(), Decision::NoOp);
        assert_eq!(ledger.boxes(&Ticker::new("X")).unwrap().len(), 1);
    }

    #[test]
    fn missing_history_resets_streak() {
        let store = HistoricalStore::new();
        let mut ledger = MemoryLedger::new(dec!(1000));
        let x = Ticker::new("X");
        ledger.set_breakout_streak(&x, 2).unwrap();
        let engine = DarvasBreakout::new(settings(1, 0)).unwrap();

        assert_eq!(engine.decide(&store, &mut ledger, &request(3, dec!(10))).unwrap(), Decision::NoOp);
        assert_eq!(ledger.breakout_streak(&x).unwrap(), 0);
        assert!(ledger.active_box(&x).unwrap().is_none());
    }

    #[test]
    fn loss_carry_widens_the_next_box() {
        let store = HistoricalStore::from_bars([bar(2, dec!(100), dec!(1000))]);
        let mut ledger = MemoryLedger::new(dec!(1000));
        let engine = DarvasBreakout::new(settings(1, 0)).unwrap();
        let x = Ticker::new("X");

        let mut req = request(3, dec!(101.5));
        req.loss_occurred = true;
        // With a 2% box, 101.5 is inside [98, 102].
        assert_eq!(engine.decide(&store, &mut ledger, &req).unwrap(), Decision::NoOp);
        assert_eq!(ledger.box_height(&x).unwrap(), Some(dec!(0.02)));
        assert_eq!(ledger.active_box(&x).unwrap().unwrap().max_price, dec!(102));

        // The height persists without further losses.
        engine.decide(&store, &mut ledger, &request(4, dec!(101))).unwrap();
        assert_eq!(ledger.box_height(&x).unwrap(), Some(dec!(0.02)));
    }

    fn gated_store(previous_volume: Decimal) -> HistoricalStore {
        HistoricalStore::from_bars([
            bar(2, dec!(100), dec!(1000)),
            bar(3, dec!(100), dec!(1000)),
            bar(4, dec!(100), dec!(1000)),
            bar(5, dec!(100), previous_volume),
        ])
    }

    #[test]
    fn leader_gate_requires_volume_surge() {
        let engine = DarvasBreakout::new(settings(1, 3)).unwrap();

        let mut ledger = MemoryLedger::new(dec!(1000));
        let quiet = engine.decide(&gated_store(dec!(1200)), &mut ledger, &request(6, dec!(102))).unwrap();
        assert_eq!(quiet, Decision::NoOp);
        assert_eq!(ledger.breakout_streak(&Ticker::new("X")).unwrap(), 1);

        let mut ledger = MemoryLedger::new(dec!(1000));
        let surge = engine.decide(&gated_store(dec!(2000)), &mut ledger, &request(6, dec!(102))).unwrap();
        assert_eq!(surge, Decision::Buy { stop_loss: dec!(99) });
    }

    #[test]
    fn leader_gate_requires_open_near_lookback_high() {
        let mut spike = bar(4, dec!(100), dec!(1000));
        spike.high = dec!(120);
        let store = HistoricalStore::from_bars([
            bar(2, dec!(100), dec!(1000)),
            bar(3, dec!(100), dec!(1000)),
            spike,
            bar(5, dec!(100), dec!(2000)),
        ]);
        let engine = DarvasBreakout::new(settings(1, 3)).unwrap();
        let mut ledger = MemoryLedger::new(dec!(1000));

        // Volume surges, but 102 is below 95% of the 120 high.
        let decision = engine.decide(&store, &mut ledger, &request(6, dec!(102))).unwrap();
        assert_eq!(decision, Decision::NoOp);
        assert_eq!(ledger.breakout_streak(&Ticker::new("X")).unwrap(), 1);

        // An open at 114 clears the price half of the gate.
        let mut ledger = MemoryLedger::new(dec!(1000));
        let decision = engine.decide(&store, &mut ledger, &request(6, dec!(114))).unwrap();
        assert_eq!(decision, Decision::Buy { stop_loss: dec!(99) });
    }

    #[test]
    fn rejects_out_of_range_height() {
        let mut bad = settings(1, 0);
        bad.default_height = dec!(1.5);
        assert!(matches!(DarvasBreakout::new(bad), Err(Error::InvalidSettings(_))));
    }
}
