//! Correlation-aware portfolio VaR.

use std::collections::BTreeMap;
use std::fmt;

use bastion_core::{Portfolio, Symbol};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregation::{align_returns, ReturnMap};
use crate::error::{RiskError, RiskResult};
use crate::stats::{
    correlation_matrix, covariance_from_correlation, ensure_confidence, parametric_var_or_default,
    portfolio_variance, sample_std, z_score, MIN_VAR_OBSERVATIONS,
};

/// How the portfolio VaR total was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortfolioVaRMethod {
    /// `z · √(wᵀ Σ w) · gross value` over the correlation matrix.
    Correlated,
    /// Sum of per-instrument parametric VaRs (ignores diversification).
    SumOfComponents,
}

/// Portfolio VaR with its per-instrument components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioVaR {
    /// Portfolio VaR in currency.
    pub total: f64,
    /// Method used for the total.
    pub method: PortfolioVaRMethod,
    /// Confidence level.
    pub confidence_level: f64,
    /// Stand-alone parametric VaR per instrument.
    pub components: BTreeMap<Symbol, f64>,
}

impl PortfolioVaR {
    /// Sum of stand-alone component VaRs.
    #[must_use]
    pub fn undiversified(&self) -> f64 {
        self.components.values().sum()
    }

    /// Reduction from diversification (zero for the fallback method).
    #[must_use]
    pub fn diversification_benefit(&self) -> f64 {
        self.undiversified() - self.total
    }
}

impl fmt::Display for PortfolioVaR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VaR({:.0}%, {:?}): ${:.2}",
            self.confidence_level * 100.0,
            self.method,
            self.total
        )
    }
}

/// Computes portfolio VaR in currency.
///
/// With `use_correlation` and at least two instruments with aligned data,
/// volatilities and pairwise correlations form the covariance matrix and
/// `VaR = z(c) · √(wᵀ Σ w) · gross value`. Otherwise, or with fewer than
/// [`MIN_VAR_OBSERVATIONS`] aligned dates, the total falls back to the sum of
/// component parametric VaRs.
pub fn portfolio_var(
    portfolio: &Portfolio,
    returns: &ReturnMap,
    confidence: f64,
    use_correlation: bool,
) -> RiskResult<PortfolioVaR> {
    ensure_confidence(confidence)?;
    let gross = portfolio.gross_value();
    if gross == 0.0 {
        return Err(RiskError::InvalidInput("portfolio has zero gross value".to_string()));
    }

    let components: BTreeMap<Symbol, f64> = portfolio
        .iter()
        .filter_map(|(symbol, value)| {
            returns.get(symbol).map(|series| {
                let var = parametric_var_or_default(series.values(), confidence, value);
                (symbol.clone(), var)
            })
        })
        .collect();

    let fallback = |reason: &str| {
        debug!(reason, "portfolio VaR using sum of components");
        PortfolioVaR {
            total: components.values().sum(),
            method: PortfolioVaRMethod::SumOfComponents,
            confidence_level: confidence,
            components: components.clone(),
        }
    };

    if !use_correlation {
        return Ok(fallback("correlation disabled"));
    }

    let aligned = match align_returns(portfolio.symbols(), returns) {
        Ok(aligned) if aligned.columns.len() < 2 => {
            return Ok(fallback("fewer than two aligned instruments"))
        }
        Ok(aligned) if aligned.len() < MIN_VAR_OBSERVATIONS => {
            return Ok(fallback("too few aligned observations"))
        }
        Ok(aligned) => aligned,
        Err(e) => {
            warn!(error = %e, "cannot align returns for correlated VaR");
            return Ok(fallback("alignment failed"));
        }
    };

    let columns: Vec<&[f64]> = aligned.columns.values().map(Vec::as_slice).collect();
    let volatilities: Vec<f64> = columns.iter().map(|c| sample_std(c)).collect();
    let weights: Vec<f64> = aligned
        .symbols()
        .map(|s| portfolio.position(s.as_str()) / gross)
        .collect();

    let correlation = correlation_matrix(&columns)?;
    let covariance = covariance_from_correlation(&volatilities, &correlation)?;
    let variance = portfolio_variance(&weights, &covariance)?.max(0.0);
    let total = z_score(confidence)? * variance.sqrt() * gross;

    debug!(total, instruments = weights.len(), "correlated portfolio VaR");

    Ok(PortfolioVaR {
        total,
        method: PortfolioVaRMethod::Correlated,
        confidence_level: confidence,
        components,
    })
}
