//! Volatility, Sharpe ratio, drawdown, downside deviation and beta.

use bastion_core::types::TRADING_DAYS_PER_YEAR;
use bastion_core::ReturnSeries;
use tracing::{debug, warn};

use super::{ensure_len, mean, sample_covariance, sample_std, sample_variance};
use crate::error::{RiskError, RiskResult};

/// Default lookback window for volatility, in trading days.
pub const DEFAULT_VOLATILITY_WINDOW: usize = 252;

/// Standard deviation of the most recent `window` returns.
pub fn daily_volatility(returns: &[f64], window: usize) -> RiskResult<f64> {
    let start = returns.len().saturating_sub(window);
    let recent = &returns[start..];
    ensure_len(recent, 2)?;
    Ok(sample_std(recent))
}

/// Annualized volatility: [`daily_volatility`] scaled by √252.
pub fn volatility(returns: &[f64], window: usize) -> RiskResult<f64> {
    Ok(daily_volatility(returns, window)? * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Annualized Sharpe ratio over a daily risk-free rate of `risk_free_rate / 252`.
///
/// # Errors
///
/// `InsufficientData` below two returns, `DivisionByZero` for a flat sample.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> RiskResult<f64> {
    ensure_len(returns, 2)?;
    let std = sample_std(returns);
    if std == 0.0 {
        return Err(RiskError::division_by_zero("sharpe ratio"));
    }
    let excess = mean(returns) - risk_free_rate / TRADING_DAYS_PER_YEAR;
    Ok(excess / std * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Maximum drawdown of the compounded return path.
///
/// Reported as the most negative `cum / running_max - 1`, so a 20%
/// peak-to-trough decline is `-0.20`.
pub fn max_drawdown(returns: &[f64]) -> RiskResult<f64> {
    ensure_len(returns, 1)?;

    let mut cumulative = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;

    for r in returns {
        cumulative *= 1.0 + r;
        peak = peak.max(cumulative);
        worst = worst.min(cumulative / peak - 1.0);
    }

    Ok(worst)
}

/// Sample standard deviation of the negative returns (daily semi-deviation).
///
/// Zero when fewer than two returns are negative.
pub fn downside_deviation(returns: &[f64]) -> RiskResult<f64> {
    ensure_len(returns, 2)?;
    let negatives: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if negatives.len() < 2 {
        return Ok(0.0);
    }
    Ok(sample_std(&negatives))
}

/// Beta of equal-length asset and market samples.
pub fn beta_from_samples(asset: &[f64], market: &[f64]) -> RiskResult<f64> {
    let covariance = sample_covariance(asset, market)?;
    let market_variance = sample_variance(market);
    if market_variance == 0.0 {
        return Err(RiskError::division_by_zero("beta market variance"));
    }
    Ok(covariance / market_variance)
}

/// Beta of `asset` against `market` over their common dates.
pub fn beta(asset: &ReturnSeries, market: &ReturnSeries) -> RiskResult<f64> {
    let (a, m): (Vec<f64>, Vec<f64>) = asset
        .iter()
        .filter_map(|(date, r)| market.get(date).map(|mr| (r, mr)))
        .unzip();

    debug!(common_dates = a.len(), "aligned asset and market returns for beta");
    beta_from_samples(&a, &m)
}

/// [`volatility`], logging failures and returning 0.0.
#[must_use]
pub fn volatility_or_default(returns: &[f64], window: usize) -> f64 {
    volatility(returns, window).unwrap_or_else(|e| {
        warn!(error = %e, "volatility unavailable, using 0.0");
        0.0
    })
}

/// [`daily_volatility`], logging failures and returning 0.0.
#[must_use]
pub fn daily_volatility_or_default(returns: &[f64], window: usize) -> f64 {
    daily_volatility(returns, window).unwrap_or_else(|e| {
        warn!(error = %e, "daily volatility unavailable, using 0.0");
        0.0
    })
}

/// [`sharpe_ratio`], logging failures and returning 0.0.
#[must_use]
pub fn sharpe_ratio_or_default(returns: &[f64], risk_free_rate: f64) -> f64 {
    sharpe_ratio(returns, risk_free_rate).unwrap_or_else(|e| {
        warn!(error = %e, "sharpe ratio unavailable, using 0.0");
        0.0
    })
}

/// [`max_drawdown`], logging failures and returning 0.0.
#[must_use]
pub fn max_drawdown_or_default(returns: &[f64]) -> f64 {
    max_drawdown(returns).unwrap_or_else(|e| {
        warn!(error = %e, "max drawdown unavailable, using 0.0");
        0.0
    })
}

/// [`downside_deviation`], logging failures and returning 0.0.
#[must_use]
pub fn downside_deviation_or_default(returns: &[f64]) -> f64 {
    downside_deviation(returns).unwrap_or_else(|e| {
        warn!(error = %e, "downside deviation unavailable, using 0.0");
        0.0
    })
}

/// [`beta`], logging failures and returning 1.0.
#[must_use]
pub fn beta_or_default(asset: &ReturnSeries, market: &ReturnSeries) -> f64 {
    beta(asset, market).unwrap_or_else(|e| {
        warn!(error = %e, "beta unavailable, using 1.0");
        1.0
    })
}
