// In crates/engine/src/reconciler.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use core_types::{Transaction, TxnType};
use database::Ledger;
use events::{EventRecord, LedgerEvent};
use execution::MarketGateway;
use rust_decimal::Decimal;

/// Brings the ledger in line with stop-losses that fired at the gateway.
///
/// Each triggered stop closes its position, credits the net proceeds and, on a
/// loss, flags the ticker so its next box is sized up. Returns the number of
/// positions closed.
pub async fn reconcile_stop_losses(
    gateway: &dyn MarketGateway,
    ledger: &mut dyn Ledger,
    as_of: NaiveDate,
) -> Result<usize> {
    let mut closed = 0;
    for position in ledger.positions()? {
        let status = gateway
            .stop_loss_status(&position, as_of)
            .await
            .with_context(|| format!("checking the stop-loss of {}", position.ticker))?;
        if !status.triggered {
            continue;
        }

        let price = status.price.unwrap_or(position.stop_loss);
        let net_proceeds = status.amount.unwrap_or_else(|| price * Decimal::from(position.qty));
        let gross = price * Decimal::from(position.qty);
        let pnl = net_proceeds - position.cost_basis();
        let wallet_cash = ledger.wallet_cash()? + net_proceeds;

        ledger.record_event(EventRecord::new(
            as_of,
            position.ticker.clone(),
            LedgerEvent::StopLossTriggered { stop_loss: position.stop_loss, low: price },
        ))?;
        ledger.set_wallet_cash(wallet_cash)?;
        ledger.close_position(&position.ticker)?;
        ledger.record_transaction(Transaction {
            date: as_of,
            ticker: position.ticker.clone(),
            txn_type: TxnType::Sell,
            price,
            qty: position.qty,
        })?;
        if pnl < Decimal::ZERO {
            ledger.set_loss_pending(&position.ticker)?;
        }
        ledger.record_event(EventRecord::new(
            as_of,
            position.ticker.clone(),
            LedgerEvent::Sold {
                qty: position.qty,
                price,
                fees: gross - net_proceeds,
                net_proceeds,
                pnl,
                wallet_cash,
            },
        ))?;
        closed += 1;
    }
    Ok(closed)
}
