// In crates/database/src/lib.rs

use analytics::PerformanceReport;
use app_config::DatabaseSettings;
use chrono::NaiveDate;
use core_types::{PlanKind, PlannedOrder, PriceBar, Ticker};
use rust_decimal::Decimal;
use sqlx::{PgPool, postgres::PgPoolOptions};

pub mod error;
pub mod ledger;
pub mod memory;
pub mod source;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use memory::{HistoricalStore, MemoryLedger};
pub use source::PriceSource;

/// The key under which the live cycle keeps its ledger snapshot.
pub const LIVE_LEDGER: &str = "live";

/// A wrapper around the `sqlx` connection pool.
#[derive(Debug, Clone)]
pub struct Db(PgPool);

/// Establishes a connection pool to the PostgreSQL database and runs migrations.
pub async fn connect(settings: &DatabaseSettings) -> Result<Db> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.url)
        .await?;

    // Run database migrations. This ensures the database schema is up-to-date.
    sqlx::migrate!("../../migrations").run(&pool).await?;

    Ok(Db(pool))
}

type BarRow = (NaiveDate, String, Decimal, Decimal, Decimal, Decimal, Option<Decimal>);
type PlanRow = (NaiveDate, String, String, Option<i64>, Decimal);

impl Db {
    /// Inserts daily bars, ignoring any (ticker, date) already stored.
    pub async fn insert_price_bars(&self, bars: &[PriceBar]) -> Result<u64> {
        let mut tx = self.0.begin().await.map_err(Error::OperationFailed)?;
        let mut inserted = 0;

        for bar in bars {
            let result = sqlx::query(
                r#"
                INSERT INTO price_bars (trade_date, ticker, open, high, low, close, volume)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (ticker, trade_date) DO NOTHING
                "#,
            )
            .bind(bar.date)
            .bind(bar.ticker.as_str())
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .execute(&mut *tx)
            .await
            .map_err(Error::OperationFailed)?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(Error::OperationFailed)?;
        tracing::debug!(rows = inserted, "Inserted price bars");

        Ok(inserted)
    }

    /// Loads every bar up to and including `until`. An empty `tickers` slice
    /// loads all tickers.
    pub async fn load_price_bars(&self, tickers: &[Ticker], until: NaiveDate) -> Result<HistoricalStore> {
        let symbols: Vec<&str> = tickers.iter().map(Ticker::as_str).collect();
        let rows: Vec<BarRow> = sqlx::query_as(
            r#"
            SELECT trade_date, ticker, open, high, low, close, volume
            FROM price_bars
            WHERE trade_date <= $1
              AND (cardinality($2::text[]) = 0 OR ticker = ANY($2))
            ORDER BY ticker, trade_date
            "#,
        )
        .bind(until)
        .bind(symbols)
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        tracing::info!(rows = rows.len(), %until, "Loaded price history");

        Ok(HistoricalStore::from_bars(rows.into_iter().map(
            |(date, ticker, open, high, low, close, volume)| PriceBar {
                date,
                ticker: Ticker::new(ticker),
                open,
                high,
                low,
                close,
                volume,
            },
        )))
    }

    /// Returns the stored ledger snapshot, if one has been saved.
    pub async fn load_ledger(&self, name: &str) -> Result<Option<MemoryLedger>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT document FROM ledger_snapshots WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.0)
                .await
                .map_err(Error::OperationFailed)?;

        row.map(|(document,)| serde_json::from_value(document).map_err(Error::from))
            .transpose()
    }

    pub async fn save_ledger(&self, name: &str, ledger: &MemoryLedger) -> Result<()> {
        let document = serde_json::to_value(ledger)?;
        sqlx::query(
            r#"
            INSERT INTO ledger_snapshots (name, document, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (name) DO UPDATE SET document = EXCLUDED.document, updated_at = now()
            "#,
        )
        .bind(name)
        .bind(document)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;
        Ok(())
    }

    /// Replaces the plan stored for `date` with `orders`.
    pub async fn save_trading_plan(&self, date: NaiveDate, orders: &[PlannedOrder]) -> Result<()> {
        let mut tx = self.0.begin().await.map_err(Error::OperationFailed)?;

        sqlx::query("DELETE FROM trading_plans WHERE plan_date = $1")
            .bind(date)
            .execute(&mut *tx)
            .await
            .map_err(Error::OperationFailed)?;

        for order in orders {
            sqlx::query(
                r#"
                INSERT INTO trading_plans (plan_date, ticker, order_type, qty, stop_loss)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.date)
            .bind(order.ticker.as_str())
            .bind(order.kind.as_str())
            .bind(order.qty.map(|q| q as i64))
            .bind(order.stop_loss)
            .execute(&mut *tx)
            .await
            .map_err(Error::OperationFailed)?;
        }

        tx.commit().await.map_err(Error::OperationFailed)?;
        Ok(())
    }

    /// Fails with [`Error::Corrupt`] on an order type this build does not know.
    pub async fn load_trading_plan(&self, date: NaiveDate) -> Result<Vec<PlannedOrder>> {
        let rows: Vec<PlanRow> = sqlx::query_as(
            r#"
            SELECT plan_date, ticker, order_type, qty, stop_loss
            FROM trading_plans
            WHERE plan_date = $1
            ORDER BY id
            "#,
        )
        .bind(date)
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        rows.into_iter()
            .map(|(date, ticker, order_type, qty, stop_loss)| {
                Ok(PlannedOrder {
                    date,
                    ticker: Ticker::new(ticker),
                    kind: order_type.parse::<PlanKind>()?,
                    qty: qty.map(|q| q.max(0) as u64),
                    stop_loss,
                })
            })
            .collect()
    }

    /// Stores a finished backtest report and returns its row id.
    pub async fn save_simulation_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        report: &PerformanceReport,
    ) -> Result<i64> {
        let document = serde_json::to_value(report)?;
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO simulation_reports (start_date, end_date, portfolio_value, total_return_pct, report)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(report.portfolio_value)
        .bind(report.total_return_pct)
        .bind(document)
        .fetch_one(&self.0)
        .await
        .map_err(Error::OperationFailed)?;
        Ok(id)
    }
}
