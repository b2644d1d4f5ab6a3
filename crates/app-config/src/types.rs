// In crates/app-config/src/types.rs

use core_types::Ticker;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;

use crate::{Error, Result};

/// Converts a float read from a config file into a `Decimal`.
pub(crate) fn to_decimal(name: &'static str, value: f64) -> Result<Decimal> {
    Decimal::from_f64(value).ok_or(Error::InvalidDecimal { name, value })
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Credentials and endpoint of the live broker.
    pub broker: BrokerSettings,
    /// Settings for the database connection.
    pub database: DatabaseSettings,
    pub simulation: SimulationSettings,
    pub strategy: StrategySettings,
    /// Overrides for the default fee schedule.
    pub fees: Option<FeeSettings>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
    /// Route `plan`/`execute` through the broker instead of the historical replay.
    #[serde(default)]
    pub live_trading_enabled: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BrokerSettings {
    pub api_key: String,
    pub secret_key: String,
    pub rest_base_url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The connection URL for the PostgreSQL database.
    pub url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SimulationSettings {
    pub starting_cash: f64,
    pub max_invest_per_stock: f64,
    pub capital_gains_tax_rate: f64,
}

impl SimulationSettings {
    pub fn starting_cash(&self) -> Result<Decimal> {
        to_decimal("simulation.starting_cash", self.starting_cash)
    }

    pub fn max_invest_per_stock(&self) -> Result<Decimal> {
        to_decimal("simulation.max_invest_per_stock", self.max_invest_per_stock)
    }

    pub fn capital_gains_tax_rate(&self) -> Result<Decimal> {
        to_decimal("simulation.capital_gains_tax_rate", self.capital_gains_tax_rate)
    }
}

/// Numeric parameters of the Darvas breakout rules.
#[derive(Deserialize, Debug, Clone)]
pub struct StrategySettings {
    pub breakout_streak: u32,
    /// Box height as a fraction of the anchor close, e.g. 0.01 for 1%.
    pub default_height_pct: f64,
    /// Added to a ticker's box height after a losing exit.
    pub height_increment_pct: f64,
    #[serde(default)]
    pub leader_lookback_days: u32,
}

impl StrategySettings {
    pub fn default_height(&self) -> Result<Decimal> {
        to_decimal("strategy.default_height_pct", self.default_height_pct)
    }

    pub fn height_increment(&self) -> Result<Decimal> {
        to_decimal("strategy.height_increment_pct", self.height_increment_pct)
    }
}

/// Every rate is a fraction of trade value; `None` keeps the built-in rate.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct FeeSettings {
    pub brokerage_rate: Option<f64>,
    pub brokerage_min: Option<f64>,
    pub brokerage_max: Option<f64>,
    pub stt_rate: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub stamp_duty_rate: Option<f64>,
}

impl FeeSettings {
    /// Resolves each override to a decimal, keyed by its setting name.
    pub fn overrides(&self) -> Result<Vec<(&'static str, Decimal)>> {
        let fields = [
            ("brokerage_rate", self.brokerage_rate),
            ("brokerage_min", self.brokerage_min),
            ("brokerage_max", self.brokerage_max),
            ("stt_rate", self.stt_rate),
            ("turnover_rate", self.turnover_rate),
            ("stamp_duty_rate", self.stamp_duty_rate),
        ];
        fields
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| to_decimal(name, v).map(|d| (name, d))))
            .collect()
    }
}

// --- Structs for watchlist.toml ---

#[derive(Deserialize, Debug, Clone)]
pub struct Watchlist {
    #[serde(rename = "tickers", default)]
    pub entries: Vec<WatchlistEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WatchlistEntry {
    pub symbol: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool { true }

impl Watchlist {
    /// The enabled tickers, in file order.
    pub fn tickers(&self) -> Vec<Ticker> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| Ticker::new(e.symbol.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchlist_skips_disabled_entries() {
        let watchlist: Watchlist = toml::from_str(
            r#"
            [[tickers]]
            symbol = "INFY"

            [[tickers]]
            symbol = "TCS"
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(watchlist.tickers(), vec![Ticker::new("INFY")]);
    }

    #[test]
    fn fee_overrides_only_list_present_fields() {
        let fees = FeeSettings { brokerage_max: Some(25.0), ..Default::default() };
        let overrides = fees.overrides().unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].0, "brokerage_max");
        assert_eq!(overrides[0].1, Decimal::from(25));
    }

    #[test]
    fn non_finite_settings_are_rejected() {
        let sim = SimulationSettings {
            starting_cash: f64::NAN,
            max_invest_per_stock: 500.0,
            capital_gains_tax_rate: 0.2,
        };
        assert!(matches!(sim.starting_cash(), Err(Error::InvalidDecimal { .. })));
    }
}
