//! Per-strategy circuit breakers and the global kill switch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

fn default_max_loss_percent() -> f64 {
    5.0
}

fn default_max_drawdown_percent() -> f64 {
    10.0
}

fn default_max_volatility() -> f64 {
    0.3
}

fn default_max_daily_trades() -> u32 {
    100
}

fn default_cooling_minutes() -> i64 {
    30
}

/// Trip thresholds. A metric at or above its threshold trips the breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Loss in percent of capital.
    #[serde(default = "default_max_loss_percent")]
    pub max_loss_percent: f64,
    /// Drawdown in percent.
    #[serde(default = "default_max_drawdown_percent")]
    pub max_drawdown_percent: f64,
    /// Annualized volatility as a fraction.
    #[serde(default = "default_max_volatility")]
    pub max_volatility: f64,
    /// Trades per day.
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
    /// Minutes a tripped breaker stays halted.
    #[serde(default = "default_cooling_minutes")]
    pub cooling_period_minutes: i64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_loss_percent: default_max_loss_percent(),
            max_drawdown_percent: default_max_drawdown_percent(),
            max_volatility: default_max_volatility(),
            max_daily_trades: default_max_daily_trades(),
            cooling_period_minutes: default_cooling_minutes(),
        }
    }
}

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerStatus {
    /// Trading allowed.
    #[default]
    Active,
    /// Tripped; trading halted until the cooling period ends.
    Triggered,
    /// Checks bypassed.
    Disabled,
}

/// Live metrics for one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StrategyMetrics {
    /// Current loss in percent.
    #[serde(default)]
    pub loss_percent: f64,
    /// Current drawdown in percent.
    #[serde(default)]
    pub drawdown_percent: f64,
    /// Annualized volatility.
    #[serde(default)]
    pub volatility: f64,
    /// Trades so far today.
    #[serde(default)]
    pub daily_trades: u32,
}

/// Per-strategy breaker bookkeeping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BreakerState {
    /// Current status.
    pub status: BreakerStatus,
    /// Time of the last trip.
    pub triggered_at: Option<DateTime<Utc>>,
    /// Reason for the last trip.
    pub reason: Option<String>,
    /// Number of trips.
    pub trip_count: u64,
}

/// Outcome of a breaker check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerDecision {
    /// True if trading must stop.
    pub halted: bool,
    /// Why trading stopped.
    pub reason: Option<String>,
}

impl BreakerDecision {
    fn proceed() -> Self {
        Self {
            halted: false,
            reason: None,
        }
    }

    fn halt(reason: impl Into<String>) -> Self {
        Self {
            halted: true,
            reason: Some(reason.into()),
        }
    }
}

/// Global emergency stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitch {
    /// Operator who pulled the switch.
    pub activated_by: String,
    /// Stated reason.
    pub reason: String,
    /// Activation time.
    pub activated_at: DateTime<Utc>,
}

/// Circuit breakers keyed by strategy name.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    states: BTreeMap<String, BreakerState>,
    kill_switch: Option<KillSwitch>,
}

impl CircuitBreaker {
    /// Creates a breaker set with the given thresholds.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            states: BTreeMap::new(),
            kill_switch: None,
        }
    }

    /// Thresholds in use.
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Checks a strategy's metrics and updates its state.
    pub fn check(
        &mut self,
        strategy: &str,
        metrics: &StrategyMetrics,
        now: DateTime<Utc>,
    ) -> BreakerDecision {
        if let Some(switch) = &self.kill_switch {
            return BreakerDecision::halt(format!("Kill switch active: {}", switch.reason));
        }

        let cooling_minutes = self.config.cooling_period_minutes;
        let state = self.states.entry(strategy.to_string()).or_default();

        match state.status {
            BreakerStatus::Disabled => return BreakerDecision::proceed(),
            BreakerStatus::Triggered => {
                if let Some(at) = state.triggered_at {
                    if (now - at).num_minutes() < cooling_minutes {
                        return BreakerDecision::halt("Circuit breaker cooling period active");
                    }
                }
            }
            BreakerStatus::Active => {}
        }

        match trip_reason(&self.config, metrics) {
            Some(reason) => {
                state.status = BreakerStatus::Triggered;
                state.triggered_at = Some(now);
                state.reason = Some(reason.clone());
                state.trip_count += 1;
                error!(strategy, reason = %reason, "circuit breaker triggered");
                BreakerDecision::halt(reason)
            }
            None => {
                if state.status == BreakerStatus::Triggered {
                    info!(strategy, "circuit breaker re-armed after cooling period");
                }
                state.status = BreakerStatus::Active;
                BreakerDecision::proceed()
            }
        }
    }

    /// Returns a strategy to Active and clears its trip.
    pub fn reset(&mut self, strategy: &str) {
        let state = self.states.entry(strategy.to_string()).or_default();
        state.status = BreakerStatus::Active;
        state.triggered_at = None;
        state.reason = None;
        info!(strategy, "circuit breaker reset");
    }

    /// Bypasses checks for a strategy.
    pub fn disable(&mut self, strategy: &str) {
        self.states.entry(strategy.to_string()).or_default().status = BreakerStatus::Disabled;
        warn!(strategy, "circuit breaker disabled");
    }

    /// Re-enables checks for a disabled strategy.
    pub fn enable(&mut self, strategy: &str) {
        let state = self.states.entry(strategy.to_string()).or_default();
        if state.status == BreakerStatus::Disabled {
            state.status = BreakerStatus::Active;
        }
    }

    /// Current status; strategies never checked are Active.
    #[must_use]
    pub fn status(&self, strategy: &str) -> BreakerStatus {
        self.states
            .get(strategy)
            .map_or(BreakerStatus::Active, |s| s.status)
    }

    /// Full state of a strategy.
    #[must_use]
    pub fn state(&self, strategy: &str) -> Option<&BreakerState> {
        self.states.get(strategy)
    }

    /// Pulls the kill switch, halting every strategy.
    pub fn activate_kill_switch(
        &mut self,
        user: impl Into<String>,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        let switch = KillSwitch {
            activated_by: user.into(),
            reason: reason.into(),
            activated_at: now,
        };
        error!(user = %switch.activated_by, reason = %switch.reason, "kill switch activated");
        self.kill_switch = Some(switch);
    }

    /// Releases the kill switch, returning its record.
    pub fn release_kill_switch(&mut self) -> Option<KillSwitch> {
        let released = self.kill_switch.take();
        if released.is_some() {
            warn!("kill switch released");
        }
        released
    }

    /// Active kill switch, if any.
    #[must_use]
    pub fn kill_switch(&self) -> Option<&KillSwitch> {
        self.kill_switch.as_ref()
    }
}

fn trip_reason(config: &CircuitBreakerConfig, metrics: &StrategyMetrics) -> Option<String> {
    if metrics.loss_percent >= config.max_loss_percent {
        return Some(format!("Loss threshold exceeded: {}%", metrics.loss_percent));
    }
    if metrics.drawdown_percent >= config.max_drawdown_percent {
        return Some(format!(
            "Drawdown threshold exceeded: {}%",
            metrics.drawdown_percent
        ));
    }
    if metrics.volatility >= config.max_volatility {
        return Some(format!("Volatility threshold exceeded: {}", metrics.volatility));
    }
    if metrics.daily_trades >= config.max_daily_trades {
        return Some(format!("Daily trade limit exceeded: {}", metrics.daily_trades));
    }
    None
}
