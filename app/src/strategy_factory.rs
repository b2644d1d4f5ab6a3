// In app/src/strategy_factory.rs

use anyhow::Result;
use app_config::Settings;
use risk::{FeeSchedule, SimpleRiskManager, SimpleRiskSettings};
use strategies::{DarvasBreakout, DarvasSettings};

/// Builds the Darvas strategy from the `[strategy]` section.
pub fn create_strategy(settings: &Settings) -> Result<DarvasBreakout> {
    let strategy = &settings.strategy;
    Ok(DarvasBreakout::new(DarvasSettings {
        leader_lookback_days: strategy.leader_lookback_days,
        breakout_streak: strategy.breakout_streak,
        default_height: strategy.default_height()?,
        height_increment: strategy.height_increment()?,
    })?)
}

/// The default schedule with any `[fees]` overrides applied.
pub fn create_fee_schedule(settings: &Settings) -> Result<FeeSchedule> {
    match &settings.fees {
        Some(fees) => Ok(FeeSchedule::default().with_overrides(fees.overrides()?)?),
        None => Ok(FeeSchedule::default()),
    }
}

pub fn create_risk_manager(settings: &Settings) -> Result<SimpleRiskManager> {
    Ok(SimpleRiskManager::new(SimpleRiskSettings {
        max_invest_per_stock: settings.simulation.max_invest_per_stock()?,
        fees: create_fee_schedule(settings)?,
    }))
}
