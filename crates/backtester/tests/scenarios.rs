use backtester::{BacktestSettings, Backtester, Error};
use chrono::NaiveDate;
use core_types::{Decision, PriceBar, Ticker, TxnType};
use database::{HistoricalStore, Ledger, MemoryLedger, PriceSource};
use events::{EventLevel, LedgerEvent};
use proptest::prelude::*;
use risk::{FeeSchedule, SimpleRiskManager, SimpleRiskSettings};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use strategies::{DarvasBreakout, DarvasSettings, DecisionRequest};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(u64::from(d))
}

fn bar(ticker: &str, d: u32, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> PriceBar {
    PriceBar {
        date: day(d),
        ticker: Ticker::new(ticker),
        open,
        high,
        low,
        close,
        volume: Some(dec!(1000)),
    }
}

fn backtester(starting_cash: Decimal) -> Backtester {
    let strategy = DarvasBreakout::new(DarvasSettings {
        leader_lookback_days: 0,
        breakout_streak: 1,
        default_height: dec!(0.01),
        height_increment: dec!(0.01),
    })
    .unwrap();
    let risk_manager = SimpleRiskManager::new(SimpleRiskSettings {
        max_invest_per_stock: dec!(10000),
        fees: FeeSchedule::default(),
    });
    Backtester::new(
        Box::new(strategy),
        Box::new(risk_manager),
        BacktestSettings { starting_cash, capital_gains_tax_rate: dec!(0.2) },
    )
}

#[test]
fn breakout_buy_then_stop_out_at_the_stop() {
    let store = HistoricalStore::from_bars([
        bar("X", 1, dec!(100), dec!(100), dec!(100), dec!(100)),
        bar("X", 2, dec!(102), dec!(103), dec!(101), dec!(102)),
        bar("X", 3, dec!(97), dec!(98), dec!(96), dec!(97)),
    ]);
    let mut ledger = MemoryLedger::new(dec!(100000));

    backtester(dec!(100000))
        .run(&store, &mut ledger, &[], day(1), day(3))
        .unwrap();

    let txns = ledger.transactions().unwrap();
    assert_eq!(txns.len(), 2);
    assert_eq!(txns[0].txn_type, TxnType::Buy);
    assert_eq!(txns[0].price, dec!(102));
    assert_eq!(txns[0].qty, 97);
    assert_eq!(txns[1].txn_type, TxnType::Sell);
    assert_eq!(txns[1].price, dec!(99));
    assert_eq!(txns[1].qty, 97);

    let x = Ticker::new("X");
    assert!(ledger.position(&x).unwrap().is_none());
    // The losing exit is carried into the next decision.
    assert!(ledger.take_loss_pending(&x).unwrap());

    let events = ledger.events().unwrap();
    assert!(matches!(events[0].event, LedgerEvent::Bought { stop_loss, .. } if stop_loss == dec!(99)));
    assert!(matches!(events[1].event, LedgerEvent::StopLossTriggered { low, .. } if low == dec!(96)));
    assert!(matches!(events[2].event, LedgerEvent::Sold { pnl, .. } if pnl < Decimal::ZERO));
}

#[test]
fn breakout_while_holding_raises_the_stop() {
    let store = HistoricalStore::from_bars([
        bar("X", 1, dec!(100), dec!(100), dec!(100), dec!(100)),
        bar("X", 2, dec!(102), dec!(104), dec!(101), dec!(104)),
        bar("X", 3, dec!(106), dec!(107), dec!(105), dec!(106)),
    ]);
    let mut ledger = MemoryLedger::new(dec!(100000));

    let report = backtester(dec!(100000))
        .run(&store, &mut ledger, &[], day(1), day(3))
        .unwrap();

    let position = ledger.position(&Ticker::new("X")).unwrap().unwrap();
    assert_eq!(position.stop_loss, dec!(102.96));
    assert!(ledger.events().unwrap().iter().any(|e| matches!(
        e.event,
        LedgerEvent::StopLossUpdated { from, to } if from == dec!(99) && to == dec!(102.96)
    )));

    // Marked at the last close of 106.
    assert_eq!(report.positions[0].last_close, Some(dec!(106)));
    assert_eq!(report.open_position_value, dec!(106) * Decimal::from(position.qty));
}

#[test]
fn insufficient_cash_is_a_warning() {
    let store = HistoricalStore::from_bars([
        bar("X", 1, dec!(100), dec!(100), dec!(100), dec!(100)),
        bar("X", 2, dec!(102), dec!(103), dec!(101), dec!(102)),
    ]);
    let mut ledger = MemoryLedger::new(dec!(50));

    let report = backtester(dec!(50))
        .run(&store, &mut ledger, &[], day(1), day(2))
        .unwrap();

    assert!(ledger.transactions().unwrap().is_empty());
    let events = ledger.events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, EventLevel::Warning);
    assert_eq!(report.wallet_cash, dec!(50));
    assert_eq!(report.total_return_pct, Decimal::ZERO);
    assert_eq!(report.return_on_starting_cash, Decimal::ZERO);
}

#[test]
fn inverted_range_is_rejected() {
    let store = HistoricalStore::new();
    let mut ledger = MemoryLedger::new(dec!(1000));
    let result = backtester(dec!(1000)).run(&store, &mut ledger, &[], day(5), day(1));
    assert!(matches!(result, Err(Error::InvalidRange { .. })));
}

/// A deterministic zig-zag series with occasional gaps down.
/// Returns the same decision every day.
struct Scripted(Decision);

impl strategies::Strategy for Scripted {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn decide(
        &self,
        _prices: &dyn PriceSource,
        _ledger: &mut dyn Ledger,
        _request: &DecisionRequest,
    ) -> strategies::Result<Decision> {
        Ok(self.0)
    }
}

fn scripted(decision: Decision) -> Backtester {
    let risk_manager = SimpleRiskManager::new(SimpleRiskSettings {
        max_invest_per_stock: dec!(10000),
        fees: FeeSchedule::default(),
    });
    Backtester::new(
        Box::new(Scripted(decision)),
        Box::new(risk_manager),
        BacktestSettings { starting_cash: dec!(1000), capital_gains_tax_rate: dec!(0.2) },
    )
}

#[test]
fn sell_while_flat_aborts_with_an_error_event() {
    let store = HistoricalStore::from_bars([bar("X", 1, dec!(100), dec!(101), dec!(99), dec!(100))]);
    let mut ledger = MemoryLedger::new(dec!(1000));

    let result = scripted(Decision::Sell { price: dec!(100) }).run(&store, &mut ledger, &[], day(1), day(1));

    assert!(matches!(result, Err(Error::NoPositionToSell { ref ticker, date }) if ticker.as_str() == "X" && date == day(1)));
    let events = ledger.events().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, EventLevel::Error);
    assert_eq!((events[0].date, events[0].ticker.as_str()), (day(1), "X"));
    assert!(ledger.transactions().unwrap().is_empty());
    assert_eq!(ledger.wallet_cash().unwrap(), dec!(1000));
}

#[test]
fn stop_update_while_flat_is_a_warning() {
    let store = HistoricalStore::from_bars([
        bar("X", 1, dec!(100), dec!(101), dec!(99), dec!(100)),
        bar("X", 2, dec!(100), dec!(101), dec!(99), dec!(100)),
    ]);
    let mut ledger = MemoryLedger::new(dec!(1000));
    let before = ledger.clone();

    scripted(Decision::UpdateStopLoss { stop_loss: dec!(98) })
        .run(&store, &mut ledger, &[], day(1), day(2))
        .unwrap();

    let events = ledger.events().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.level == EventLevel::Warning));
    assert!(matches!(events[0].event, LedgerEvent::Warning { .. }));
    assert!(ledger.positions().unwrap().is_empty());
    assert!(ledger.transactions().unwrap().is_empty());
    assert_eq!(ledger.wallet_cash().unwrap(), before.wallet_cash().unwrap());
}

fn synthetic_store() -> HistoricalStore {
    let mut bars = Vec::new();
    for (t, ticker) in ["AAA", "BBB", "CCC"].into_iter().enumerate() {
        let mut close = dec!(100) + Decimal::from(t * 7);
        for d in 1..=60u32 {
            let step = Decimal::from((d * 37 + t as u32 * 11) % 9) - dec!(3.5);
            let open = close + step / dec!(2);
            close = (open + step).max(dec!(1));
            let high = open.max(close) + dec!(1);
            let low = open.min(close) - dec!(1.5);
            bars.push(bar(ticker, d, open, high, low, close));
        }
    }
    HistoricalStore::from_bars(bars)
}

#[test]
fn replays_are_identical() {
    let store = synthetic_store();
    let run = || {
        let mut ledger = MemoryLedger::new(dec!(100000));
        let mut report = backtester(dec!(100000))
            .run(&store, &mut ledger, &[], day(1), day(60))
            .unwrap();
        report.duration_ms = 0;
        (report, ledger)
    };

    let (first_report, first_ledger) = run();
    let (second_report, second_ledger) = run();
    assert_eq!(first_report, second_report);
    assert_eq!(first_ledger, second_ledger);
    assert_eq!(first_report.tickers_simulated, 3);
}

#[test]
fn ticker_filter_limits_the_run() {
    let store = synthetic_store();
    let mut ledger = MemoryLedger::new(dec!(100000));
    let report = backtester(dec!(100000))
        .run(&store, &mut ledger, &[Ticker::new("BBB")], day(1), day(60))
        .unwrap();
    assert_eq!(report.tickers_simulated, 1);
    assert!(ledger.transactions().unwrap().iter().all(|t| t.ticker.as_str() == "BBB"));
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn ledger_invariants_hold_for_any_series(moves in prop::collection::vec(-40i64..40, 2..60)) {
        let mut close = dec!(100);
        let mut bars = Vec::new();
        for (i, m) in moves.iter().enumerate() {
            let open = (close + Decimal::new(*m, 1)).max(dec!(1));
            close = (open + Decimal::new(-*m / 2, 1)).max(dec!(1));
            let high = open.max(close) + dec!(0.5);
            let low = (open.min(close) - dec!(0.5)).max(dec!(0.5));
            bars.push(bar("X", i as u32 + 1, open, high, low, close));
        }
        let store = HistoricalStore::from_bars(bars);
        let mut ledger = MemoryLedger::new(dec!(100000));
        backtester(dec!(100000))
            .run(&store, &mut ledger, &[], day(1), day(moves.len() as u32))
            .unwrap();

        let x = Ticker::new("X");
        let boxes = ledger.boxes(&x).unwrap();
        prop_assert!(boxes.iter().filter(|b| b.active).count() <= 1);
        for b in &boxes {
            prop_assert!(b.min_price <= b.max_price);
        }

        for event in ledger.events().unwrap() {
            if let LedgerEvent::StopLossUpdated { from, to } = event.event {
                prop_assert!(to > from);
            }
        }

        prop_assert!(ledger.wallet_cash().unwrap() >= Decimal::ZERO);
        let buys = ledger.transactions().unwrap().iter().filter(|t| t.txn_type == TxnType::Buy).count();
        let sells = ledger.transactions().unwrap().iter().filter(|t| t.txn_type == TxnType::Sell).count();
        prop_assert!(buys == sells || buys == sells + 1);
    }
}
