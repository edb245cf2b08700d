//! CSV input loaders.
//!
//! - positions: `symbol,value` (signed position value)
//! - returns: `date,symbol,return` (one row per instrument per day)
//! - sectors: `symbol,sector`

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use bastion_core::{MarketData, Portfolio, ReturnSeries, Symbol};
use bastion_risk::aggregation::ReturnMap;

use crate::error::{CliError, CliResult};

#[derive(Debug, Deserialize)]
struct PositionRow {
    symbol: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct ReturnRow {
    date: NaiveDate,
    symbol: String,
    #[serde(rename = "return")]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct SectorRow {
    symbol: String,
    sector: String,
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> CliResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| CliError::input(path, e.to_string()))?;

    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.map_err(|e| CliError::input(path, format!("row {}: {e}", i + 1))))
        .collect()
}

/// Loads signed position values. Repeated symbols are summed.
pub fn load_positions(path: &Path) -> CliResult<Portfolio> {
    let rows: Vec<PositionRow> = read_rows(path)?;
    let mut portfolio = Portfolio::new();

    for row in rows {
        if !row.value.is_finite() {
            return Err(CliError::input(
                path,
                format!("non-finite value for {}", row.symbol),
            ));
        }
        let current = portfolio.position(&row.symbol);
        portfolio.insert(row.symbol, current + row.value);
    }

    debug!(path = %path.display(), positions = portfolio.len(), "loaded positions");
    Ok(portfolio)
}

/// Loads per-instrument return series.
pub fn load_returns(path: &Path) -> CliResult<ReturnMap> {
    let rows: Vec<ReturnRow> = read_rows(path)?;
    let mut grouped: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();

    for row in rows {
        grouped.entry(row.symbol).or_default().push((row.date, row.value));
    }

    let returns = grouped
        .into_iter()
        .map(|(symbol, observations)| {
            ReturnSeries::new(observations)
                .map(|series| (Symbol::new(symbol.as_str()), series))
                .map_err(|e| CliError::input(path, format!("{symbol}: {e}")))
        })
        .collect::<CliResult<ReturnMap>>()?;

    debug!(path = %path.display(), instruments = returns.len(), "loaded returns");
    Ok(returns)
}

/// Loads the sector map.
pub fn load_sectors(path: &Path) -> CliResult<MarketData> {
    let rows: Vec<SectorRow> = read_rows(path)?;
    Ok(MarketData::with_sectors(
        rows.into_iter().map(|row| (row.symbol, row.sector)),
    ))
}

/// Loads the sector map when a path is given.
pub fn load_optional_sectors(path: Option<&Path>) -> CliResult<Option<MarketData>> {
    path.map(load_sectors).transpose()
}
