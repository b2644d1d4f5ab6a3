// In crates/engine/src/lib.rs

pub mod reconciler;
pub mod types;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use core_types::{Decision, PlanKind, PlannedOrder, Position, Ticker, Transaction, TxnType};
use database::{Ledger, PriceSource};
use events::{EventRecord, LedgerEvent};
use execution::MarketGateway;
use risk::RiskManager;
use rust_decimal::Decimal;
use strategies::{DecisionRequest, Strategy};

pub use reconciler::reconcile_stop_losses;
pub use types::ExecutionSummary;

/// Runs one day of the live cycle: plan tonight, execute at tomorrow's open.
pub struct Planner {
    strategy: Box<dyn Strategy>,
    risk_manager: Box<dyn RiskManager>,
    gateway: Box<dyn MarketGateway>,
}

impl Planner {
    pub fn new(
        strategy: Box<dyn Strategy>,
        risk_manager: Box<dyn RiskManager>,
        gateway: Box<dyn MarketGateway>,
    ) -> Self {
        Self { strategy, risk_manager, gateway }
    }

    /// Decides the orders for the trading day after `today`.
    ///
    /// On a trading day, stops that fired at the gateway are settled first so
    /// that their losses feed the next box. Returns an empty plan when
    /// tomorrow is not a trading day.
    pub async fn plan(
        &self,
        prices: &dyn PriceSource,
        ledger: &mut dyn Ledger,
        tickers: &[Ticker],
        today: NaiveDate,
    ) -> Result<Vec<PlannedOrder>> {
        tracing::info!(gateway = self.gateway.name(), %today, tickers = tickers.len(), "Planning next session...");

        if self.gateway.is_trading_day(today).await? {
            let closed = reconcile_stop_losses(&*self.gateway, ledger, today).await?;
            if closed > 0 {
                tracing::info!(closed, %today, "Settled triggered stop-losses.");
            }
        }

        let Some(tomorrow) = today.succ_opt() else {
            bail!("no trading day follows {today}");
        };
        if !self.gateway.is_trading_day(tomorrow).await? {
            tracing::info!(%tomorrow, "Market closed tomorrow. Nothing to plan.");
            return Ok(Vec::new());
        }

        // Cash already earmarked by earlier BUYs in this plan.
        let mut available = ledger.wallet_cash()?;
        let mut plans = Vec::new();
        for ticker in tickers {
            let outcome = self.plan_ticker(prices, ledger, ticker, tomorrow, &mut available).await;
            match outcome {
                Ok(Some(order)) => plans.push(order),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(%ticker, date = %tomorrow, error = %e, "Planning aborted");
                    ledger.log_event(EventRecord::error(tomorrow, ticker.clone(), e.to_string()))?;
                    return Err(e);
                }
            }
        }

        tracing::info!(%tomorrow, orders = plans.len(), "Trading plan ready.");
        Ok(plans)
    }

    async fn plan_ticker(
        &self,
        prices: &dyn PriceSource,
        ledger: &mut dyn Ledger,
        ticker: &Ticker,
        date: NaiveDate,
        available: &mut Decimal,
    ) -> Result<Option<PlannedOrder>> {
        let Some(open_price) = self.gateway.opening_price(ticker, date).await? else {
            tracing::warn!(%ticker, %date, "No opening quote. Skipping.");
            return Ok(None);
        };

        let request = DecisionRequest {
            ticker: ticker.clone(),
            trade_date: date,
            open_price,
            loss_occurred: ledger.take_loss_pending(ticker)?,
        };
        let decision = self
            .strategy
            .decide(prices, ledger, &request)
            .with_context(|| format!("deciding {ticker} for {date}"))?;
        tracing::debug!(%ticker, %date, %open_price, %decision, "Decision");

        match decision {
            Decision::NoOp => Ok(None),
            Decision::Buy { stop_loss } => {
                let held = ledger.position(ticker)?;
                let order = match self.risk_manager.size_buy(open_price, stop_loss, *available, held.as_ref()) {
                    Ok(Some(order)) => order,
                    Ok(None) => {
                        let message = format!("Insufficient wallet cash ({:.2}) to buy at {:.2}", available, open_price);
                        ledger.record_event(EventRecord::warning(date, ticker.clone(), message))?;
                        return Ok(None);
                    }
                    Err(risk::Error::Vetoed { reason }) => {
                        ledger.record_event(EventRecord::warning(date, ticker.clone(), reason))?;
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                };
                *available -= order.total_cost;
                Ok(Some(PlannedOrder {
                    date,
                    ticker: ticker.clone(),
                    kind: PlanKind::Buy,
                    qty: Some(order.qty),
                    stop_loss,
                }))
            }
            Decision::UpdateStopLoss { stop_loss } => Ok(Some(PlannedOrder {
                date,
                ticker: ticker.clone(),
                kind: PlanKind::UpdateStopLoss,
                qty: None,
                stop_loss,
            })),
            // Exits only happen through resting stops at the broker.
            Decision::Sell { price } => {
                let message = format!("Discretionary SELL at {:.2} is not placed live", price);
                ledger.record_event(EventRecord::warning(date, ticker.clone(), message))?;
                Ok(None)
            }
        }
    }

    /// Places a trading plan through the gateway and books the fills.
    pub async fn execute(
        &self,
        ledger: &mut dyn Ledger,
        date: NaiveDate,
        plans: &[PlannedOrder],
    ) -> Result<ExecutionSummary> {
        tracing::info!(gateway = self.gateway.name(), %date, orders = plans.len(), "Executing trading plan...");
        let mut summary = ExecutionSummary::default();
        for order in plans {
            let result = match order.kind {
                PlanKind::Buy => self.execute_buy(ledger, date, order).await,
                PlanKind::UpdateStopLoss => self.execute_stop_update(ledger, date, order).await,
            };
            match result {
                Ok(true) if order.kind == PlanKind::Buy => summary.buys += 1,
                Ok(true) => summary.stop_updates += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    tracing::error!(ticker = %order.ticker, %date, error = %e, "Execution aborted");
                    ledger.log_event(EventRecord::error(date, order.ticker.clone(), e.to_string()))?;
                    return Err(e);
                }
            }
        }
        tracing::info!(?summary, "Trading plan executed.");
        Ok(summary)
    }

    async fn execute_buy(&self, ledger: &mut dyn Ledger, date: NaiveDate, order: &PlannedOrder) -> Result<bool> {
        let ticker = &order.ticker;
        let Some(qty) = order.qty.filter(|q| *q > 0) else {
            bail!("BUY for {ticker} on {date} carries no quantity");
        };
        if ledger.position(ticker)?.is_some() {
            ledger.record_event(EventRecord::warning(date, ticker.clone(), "BUY skipped: position already open"))?;
            return Ok(false);
        }

        let fill = self.gateway.buy(ticker, qty, date).await?;
        let wallet_cash = ledger.wallet_cash()? - fill.total_cost;
        if wallet_cash < Decimal::ZERO {
            bail!("fill for {ticker} costs {:.2}, more than the wallet holds", fill.total_cost);
        }
        ledger.set_wallet_cash(wallet_cash)?;
        ledger.open_position(Position {
            ticker: ticker.clone(),
            qty: fill.qty,
            buy_price: fill.price,
            stop_loss: order.stop_loss,
            buy_date: date,
        })?;
        ledger.record_transaction(Transaction {
            date,
            ticker: ticker.clone(),
            txn_type: TxnType::Buy,
            price: fill.price,
            qty: fill.qty,
        })?;
        ledger.record_event(EventRecord::new(
            date,
            ticker.clone(),
            LedgerEvent::Bought {
                qty: fill.qty,
                price: fill.price,
                fees: fill.fees,
                total_cost: fill.total_cost,
                stop_loss: order.stop_loss,
                wallet_cash,
            },
        ))?;

        self.gateway
            .update_stop_loss(ticker, fill.qty, order.stop_loss)
            .await
            .with_context(|| format!("placing the initial stop-loss for {ticker}"))?;
        Ok(true)
    }

    async fn execute_stop_update(&self, ledger: &mut dyn Ledger, date: NaiveDate, order: &PlannedOrder) -> Result<bool> {
        let ticker = &order.ticker;
        let Some(position) = ledger.position(ticker)?.filter(|p| p.qty > 0) else {
            let message = format!("No position to move the stop-loss to {:.4}", order.stop_loss);
            ledger.record_event(EventRecord::warning(date, ticker.clone(), message))?;
            return Ok(false);
        };
        if order.stop_loss <= position.stop_loss {
            tracing::debug!(%ticker, current = %position.stop_loss, planned = %order.stop_loss, "Stop already at or above plan.");
            return Ok(false);
        }

        self.gateway.update_stop_loss(ticker, position.qty, order.stop_loss).await?;
        ledger.set_stop_loss(ticker, order.stop_loss)?;
        ledger.record_event(EventRecord::new(
            date,
            ticker.clone(),
            LedgerEvent::StopLossUpdated { from: position.stop_loss, to: order.stop_loss },
        ))?;
        Ok(true)
    }
}
