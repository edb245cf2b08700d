//! Portfolio return aggregation.
//!
//! Combines signed position weights with per-instrument return series:
//!
//! 1. weights = position / gross value
//! 2. series of held instruments are aligned on the intersection of their dates
//! 3. portfolio return at t = Σ wᵢ · rᵢ(t)
//!
//! Held instruments without a return series contribute nothing to the
//! aggregated path but still count toward the gross value.

use std::collections::BTreeMap;

use bastion_core::{Portfolio, ReturnSeries, Symbol};
use chrono::NaiveDate;
use tracing::debug;

use crate::error::{RiskError, RiskResult};

/// Per-instrument return series keyed by symbol.
pub type ReturnMap = BTreeMap<Symbol, ReturnSeries>;

/// Return columns aligned on a common date index.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedReturns {
    /// Common dates in ascending order.
    pub dates: Vec<NaiveDate>,
    /// One column per included instrument, indexed like `dates`.
    pub columns: BTreeMap<Symbol, Vec<f64>>,
}

impl AlignedReturns {
    /// Number of aligned observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Returns true if there are no common dates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Symbols of the included instruments.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.columns.keys()
    }

    /// Column for `symbol`.
    #[must_use]
    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.columns.get(symbol).map(Vec::as_slice)
    }
}

/// Aligns the series of `symbols` onto the intersection of their dates.
///
/// Symbols with no series (or an empty one) are skipped.
///
/// # Errors
///
/// `Alignment` if no symbol has data or the intersection is empty.
pub fn align_returns<'a>(
    symbols: impl IntoIterator<Item = &'a Symbol>,
    returns: &ReturnMap,
) -> RiskResult<AlignedReturns> {
    let included: Vec<(&Symbol, &ReturnSeries)> = symbols
        .into_iter()
        .filter_map(|s| returns.get(s).filter(|r| !r.is_empty()).map(|r| (s, r)))
        .collect();

    let Some((_, first)) = included.first() else {
        return Err(RiskError::Alignment(
            "no return data for any held instrument".to_string(),
        ));
    };

    let dates: Vec<NaiveDate> = first
        .dates()
        .iter()
        .copied()
        .filter(|d| included.iter().all(|(_, series)| series.contains(*d)))
        .collect();

    if dates.is_empty() {
        return Err(RiskError::Alignment(format!(
            "no common dates across {} instruments",
            included.len()
        )));
    }

    let columns = included
        .iter()
        .map(|(symbol, series)| {
            let column = dates.iter().map(|d| series.get(*d).unwrap_or(0.0)).collect();
            ((*symbol).clone(), column)
        })
        .collect();

    debug!(
        instruments = included.len(),
        observations = dates.len(),
        "aligned return series"
    );

    Ok(AlignedReturns { dates, columns })
}

/// Weighted portfolio return series over the aligned date index.
///
/// # Errors
///
/// `Alignment` for a zero-value portfolio or when series share no dates.
pub fn portfolio_returns(portfolio: &Portfolio, returns: &ReturnMap) -> RiskResult<ReturnSeries> {
    let gross = portfolio.gross_value();
    if gross == 0.0 {
        return Err(RiskError::Alignment(
            "portfolio has zero gross value".to_string(),
        ));
    }

    let aligned = align_returns(portfolio.symbols(), returns)?;
    let mut totals = vec![0.0; aligned.len()];

    for (symbol, column) in &aligned.columns {
        let weight = portfolio.position(symbol.as_str()) / gross;
        for (total, r) in totals.iter_mut().zip(column) {
            *total += weight * r;
        }
    }

    Ok(ReturnSeries::new(aligned.dates.into_iter().zip(totals).collect())?)
}

/// Herfindahl-Hirschman concentration index: Σ (|pᵢ| / gross)².
///
/// Ranges over (0, 1]; zero for an empty or zero-value portfolio.
#[must_use]
pub fn herfindahl_index(portfolio: &Portfolio) -> f64 {
    let gross = portfolio.gross_value();
    if gross == 0.0 {
        return 0.0;
    }
    portfolio
        .iter()
        .map(|(_, value)| (value.abs() / gross).powi(2))
        .sum()
}
