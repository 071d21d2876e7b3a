use std::env;

use chrono::Duration;
use csl_common::Money;
use log::*;
use settlement_engine::{risk::RiskConfig, TierConfig};

const DEFAULT_CSL_HOST: &str = "127.0.0.1";
const DEFAULT_CSL_PORT: u16 = 8460;
const DEFAULT_HOLD_WINDOW_DAYS: i64 = 14;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The return window applied to newly created commissions.
    pub hold_window: Duration,
    /// How often the background sweep worker runs.
    pub sweep_interval_secs: u64,
    /// Risk weights and gating thresholds. These gate money release, so they are configuration,
    /// not code.
    pub risk: RiskConfig,
    /// Partner tier-upgrade thresholds.
    pub tiers: TierConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CSL_HOST.to_string(),
            port: DEFAULT_CSL_PORT,
            database_url: String::default(),
            hold_window: Duration::days(DEFAULT_HOLD_WINDOW_DAYS),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            risk: RiskConfig::default(),
            tiers: TierConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CSL_HOST").ok().unwrap_or_else(|| DEFAULT_CSL_HOST.into());
        let port = env::var("CSL_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for CSL_PORT. {e} Using the default, {DEFAULT_CSL_PORT}, instead.");
                    DEFAULT_CSL_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CSL_PORT);
        let database_url = env::var("CSL_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CSL_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let hold_window = Duration::days(env_i64("CSL_HOLD_WINDOW_DAYS", DEFAULT_HOLD_WINDOW_DAYS));
        let sweep_interval_secs =
            env_i64("CSL_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS as i64).max(1) as u64;
        let risk = risk_config_from_env();
        let tiers = tier_config_from_env();
        Self { host, port, database_url, hold_window, sweep_interval_secs, risk, tiers }
    }
}

/// The risk policy defaults, with the two gating thresholds overridable from the environment.
fn risk_config_from_env() -> RiskConfig {
    let defaults = RiskConfig::default();
    RiskConfig {
        hold_threshold: env_i64("CSL_RISK_HOLD_THRESHOLD", defaults.hold_threshold),
        block_threshold: env_i64("CSL_RISK_BLOCK_THRESHOLD", defaults.block_threshold),
        ..defaults
    }
}

fn tier_config_from_env() -> TierConfig {
    let defaults = TierConfig::default();
    TierConfig {
        agent_min_orders: env_i64("CSL_AGENT_MIN_ORDERS", defaults.agent_min_orders),
        agent_min_revenue: Money::from(env_i64("CSL_AGENT_MIN_REVENUE", defaults.agent_min_revenue.value())),
        leader_min_orders: env_i64("CSL_LEADER_MIN_ORDERS", defaults.leader_min_orders),
        leader_min_revenue: Money::from(env_i64("CSL_LEADER_MIN_REVENUE", defaults.leader_min_revenue.value())),
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    match env::var(name) {
        Ok(s) => s.parse::<i64>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let config = ServerConfig::default();
        assert_eq!(config.hold_window, Duration::days(14));
        assert_eq!(config.risk.hold_threshold, 40);
        assert_eq!(config.risk.block_threshold, 60);
        assert_eq!(config.sweep_interval_secs, 300);
    }
}
