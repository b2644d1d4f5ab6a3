// In crates/analytics/src/engine.rs

use crate::types::{PerformanceReport, PositionDetail, ReportInput, RoundTrip, TxnSummary};
use core_types::{Ticker, Transaction, TxnType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// The engine responsible for calculating performance metrics from the final ledger.
#[derive(Default)]
pub struct AnalyticsEngine;

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs every SELL with the latest BUY of the same ticker on or before it.
    /// A SELL with no such BUY is ignored.
    pub fn round_trips(&self, transactions: &[Transaction]) -> Vec<RoundTrip> {
        let mut last_buy: HashMap<&Ticker, &Transaction> = HashMap::new();
        let mut trips = Vec::new();

        for txn in transactions {
            match txn.txn_type {
                TxnType::Buy => {
                    last_buy.insert(&txn.ticker, txn);
                }
                TxnType::Sell => {
                    let Some(buy) = last_buy.get(&txn.ticker).filter(|b| b.date <= txn.date) else {
                        continue;
                    };
                    trips.push(RoundTrip {
                        ticker: txn.ticker.clone(),
                        buy_date: buy.date,
                        sell_date: txn.date,
                        qty: txn.qty,
                        buy_price: buy.price,
                        sell_price: txn.price,
                        pnl: (txn.price - buy.price) * Decimal::from(txn.qty),
                    });
                }
            }
        }

        trips
    }

    /// Calculates the full report.
    pub fn calculate(&self, input: &ReportInput<'_>) -> PerformanceReport {
        let mut report = PerformanceReport::new();
        report.starting_cash = input.starting_cash;
        report.wallet_cash = input.wallet_cash;
        report.tickers_simulated = input.tickers_simulated;
        report.duration_ms = u64::try_from(input.duration.as_millis()).unwrap_or(u64::MAX);

        // --- 1. Open positions, marked at the last known close ---
        for position in input.positions {
            let last_close = input.last_closes.get(&position.ticker).copied();
            let mark = last_close.unwrap_or(Decimal::ZERO);
            let qty = Decimal::from(position.qty);
            let market_value = mark * qty;
            report.positions.push(PositionDetail {
                ticker: position.ticker.clone(),
                qty: position.qty,
                buy_price: position.buy_price,
                stop_loss: position.stop_loss,
                last_close,
                market_value,
                unrealized_pnl: market_value - position.cost_basis(),
            });
            report.open_position_value += market_value;
            report.invested_cost_basis += position.cost_basis();
        }
        report.portfolio_value = report.wallet_cash + report.open_position_value;

        // --- 2. Transaction summary ---
        for txn_type in [TxnType::Buy, TxnType::Sell] {
            let matching = input.transactions.iter().filter(|t| t.txn_type == txn_type);
            report.transactions.push(TxnSummary {
                txn_type,
                count: matching.clone().count(),
                total_value: matching.map(Transaction::value).sum(),
            });
        }

        // --- 3. Realized gains and round trips ---
        let trips = self.round_trips(input.transactions);
        report.realized_gains = trips.iter().map(|t| t.pnl).sum();
        report.round_trips = trips.len() as u32;
        report.winning_trips = trips.iter().filter(|t| t.pnl > dec!(0)).count() as u32;
        report.gross_profit = trips.iter().map(|t| t.pnl).filter(|p| *p > dec!(0)).sum();
        report.gross_loss = trips.iter().map(|t| t.pnl).filter(|p| *p < dec!(0)).sum::<Decimal>().abs();
        if report.round_trips > 0 {
            report.win_rate = (report.winning_trips as f64 / report.round_trips as f64) * 100.0;
        }

        // --- 4. Tax and returns ---
        if report.realized_gains > dec!(0) {
            report.capital_gains_tax = report.realized_gains * input.capital_gains_tax_rate;
        }
        report.after_tax_value = report.portfolio_value - report.capital_gains_tax;
        report.total_return = report.after_tax_value - report.invested_cost_basis;
        if report.invested_cost_basis > dec!(0) {
            report.total_return_pct = (report.total_return / report.invested_cost_basis * dec!(100)).round_dp(2);
        }
        report.return_on_starting_cash = report.after_tax_value - report.starting_cash;
        if report.starting_cash > dec!(0) {
            report.return_on_starting_cash_pct =
                (report.return_on_starting_cash / report.starting_cash * dec!(100)).round_dp(2);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::Position;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn txn(d: u32, ticker: &str, txn_type: TxnType, price: Decimal, qty: u64) -> Transaction {
        Transaction { date: day(d), ticker: Ticker::new(ticker), txn_type, price, qty }
    }

    #[test]
    fn sells_match_the_latest_prior_buy() {
        let txns = vec![
            txn(1, "A", TxnType::Buy, dec!(100), 10),
            txn(3, "A", TxnType::Sell, dec!(110), 10),
            txn(5, "A", TxnType::Buy, dec!(120), 5),
            txn(7, "A", TxnType::Sell, dec!(115), 5),
        ];
        let trips = AnalyticsEngine::new().round_trips(&txns);
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].pnl, dec!(100));
        assert_eq!(trips[1].buy_price, dec!(120));
        assert_eq!(trips[1].pnl, dec!(-25));
    }

    #[test]
    fn report_taxes_only_positive_gains() {
        let txns = vec![
            txn(1, "A", TxnType::Buy, dec!(100), 10),
            txn(3, "A", TxnType::Sell, dec!(110), 10),
            txn(4, "B", TxnType::Buy, dec!(50), 4),
        ];
        let positions = vec![Position {
            ticker: Ticker::new("B"),
            qty: 4,
            buy_price: dec!(50),
            stop_loss: dec!(45),
            buy_date: day(4),
        }];
        let mut last_closes = BTreeMap::new();
        last_closes.insert(Ticker::new("B"), dec!(55));

        let report = AnalyticsEngine::new().calculate(&ReportInput {
            starting_cash: dec!(1000),
            wallet_cash: dec!(900),
            capital_gains_tax_rate: dec!(0.2),
            transactions: &txns,
            positions: &positions,
            last_closes: &last_closes,
            tickers_simulated: 2,
            duration: Duration::from_millis(1500),
        });

        assert_eq!(report.open_position_value, dec!(220));
        assert_eq!(report.portfolio_value, dec!(1120));
        assert_eq!(report.invested_cost_basis, dec!(200));
        assert_eq!(report.positions[0].unrealized_pnl, dec!(20));
        assert_eq!(report.realized_gains, dec!(100));
        assert_eq!(report.capital_gains_tax, dec!(20));
        assert_eq!(report.after_tax_value, dec!(1100));
        assert_eq!(report.total_return, dec!(900));
        assert_eq!(report.total_return_pct, dec!(450));
        assert_eq!(report.return_on_starting_cash, dec!(100));
        assert_eq!(report.return_on_starting_cash_pct, dec!(10));
        assert_eq!(report.round_trips, 1);
        assert_eq!(report.win_rate, 100.0);
        assert_eq!(report.transactions[0].count, 2);
        assert_eq!(report.transactions[0].total_value, dec!(1200));
        assert_eq!(report.duration_ms, 1500);
    }

    #[test]
    fn losses_are_not_taxed() {
        let txns = vec![
            txn(1, "A", TxnType::Buy, dec!(100), 10),
            txn(2, "A", TxnType::Sell, dec!(90), 10),
        ];
        let report = AnalyticsEngine::new().calculate(&ReportInput {
            starting_cash: dec!(1000),
            wallet_cash: dec!(900),
            capital_gains_tax_rate: dec!(0.2),
            transactions: &txns,
            positions: &[],
            last_closes: &BTreeMap::new(),
            tickers_simulated: 1,
            duration: Duration::ZERO,
        });
        assert_eq!(report.realized_gains, dec!(-100));
        assert_eq!(report.capital_gains_tax, dec!(0));
        assert_eq!(report.gross_loss, dec!(100));
        // Nothing is left invested, so there is no base for the return percentage.
        assert_eq!(report.total_return, dec!(900));
        assert_eq!(report.total_return_pct, dec!(0));
        assert_eq!(report.return_on_starting_cash_pct, dec!(-10));
    }

    #[test]
    fn positions_without_a_close_are_marked_at_zero() {
        let positions = vec![Position {
            ticker: Ticker::new("C"),
            qty: 10,
            buy_price: dec!(20),
            stop_loss: dec!(18),
            buy_date: day(1),
        }];
        let report = AnalyticsEngine::new().calculate(&ReportInput {
            starting_cash: dec!(1000),
            wallet_cash: dec!(800),
            capital_gains_tax_rate: dec!(0.2),
            transactions: &[],
            positions: &positions,
            last_closes: &BTreeMap::new(),
            tickers_simulated: 1,
            duration: Duration::ZERO,
        });
        assert_eq!(report.positions[0].last_close, None);
        assert_eq!(report.open_position_value, dec!(0));
        assert_eq!(report.positions[0].unrealized_pnl, dec!(-200));
        assert_eq!(report.portfolio_value, dec!(800));
        assert_eq!(report.total_return, dec!(600));
        assert_eq!(report.total_return_pct, dec!(300));
    }
}
