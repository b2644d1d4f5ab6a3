// --- Ledger Event Structures ---

use chrono::NaiveDate;
use core_types::Ticker;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventLevel::Info => "INFO",
            EventLevel::Warning => "WARNING",
            EventLevel::Error => "ERROR",
        })
    }
}

/// Everything the simulator or the live planner did to the ledger.
/// `tag` and `content` are used by serde for clean JSON representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum LedgerEvent {
    Bought {
        qty: u64,
        price: Decimal,
        fees: Decimal,
        total_cost: Decimal,
        stop_loss: Decimal,
        wallet_cash: Decimal,
    },
    Sold {
        qty: u64,
        price: Decimal,
        fees: Decimal,
        net_proceeds: Decimal,
        pnl: Decimal,
        wallet_cash: Decimal,
    },
    StopLossTriggered {
        stop_loss: Decimal,
        low: Decimal,
    },
    StopLossUpdated {
        from: Decimal,
        to: Decimal,
    },
    Warning {
        message: String,
    },
    Error {
        message: String,
    },
}

impl LedgerEvent {
    pub fn level(&self) -> EventLevel {
        match self {
            LedgerEvent::Warning { .. } => EventLevel::Warning,
            LedgerEvent::Error { .. } => EventLevel::Error,
            _ => EventLevel::Info,
        }
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEvent::Bought { qty, price, fees, total_cost, stop_loss, wallet_cash } => write!(
                f,
                "BUY: {} shares at {:.2}, fees: {:.2}, total cost: {:.2}, stop-loss: {:.2}, wallet cash: {:.2}",
                qty, price, fees, total_cost, stop_loss, wallet_cash
            ),
            LedgerEvent::Sold { qty, price, fees, net_proceeds, pnl, wallet_cash } => write!(
                f,
                "SELL: {} shares at {:.2}, fees: {:.2}, net proceeds: {:.2}, P&L: {:.2}, wallet cash: {:.2}",
                qty, price, fees, net_proceeds, pnl, wallet_cash
            ),
            LedgerEvent::StopLossTriggered { stop_loss, low } => {
                write!(f, "Stop-loss triggered at {:.2} (day low {:.2})", stop_loss, low)
            }
            LedgerEvent::StopLossUpdated { from, to } => {
                write!(f, "Updated stop-loss from {:.2} to {:.2}", from, to)
            }
            LedgerEvent::Warning { message } | LedgerEvent::Error { message } => f.write_str(message),
        }
    }
}

/// One row of the append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: NaiveDate,
    pub ticker: Ticker,
    pub level: EventLevel,
    pub event: LedgerEvent,
}

impl EventRecord {
    pub fn new(date: NaiveDate, ticker: Ticker, event: LedgerEvent) -> Self {
        Self { date, ticker, level: event.level(), event }
    }

    pub fn warning(date: NaiveDate, ticker: Ticker, message: impl Into<String>) -> Self {
        Self::new(date, ticker, LedgerEvent::Warning { message: message.into() })
    }

    pub fn error(date: NaiveDate, ticker: Ticker, message: impl Into<String>) -> Self {
        Self::new(date, ticker, LedgerEvent::Error { message: message.into() })
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}: {}", self.level, self.date, self.ticker, self.event)
    }
}
