//! Date-indexed return series.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Ordered daily returns for one instrument, indexed by date.
///
/// Dates are unique and strictly increasing. Gaps between dates are allowed.
/// The series is immutable once constructed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<(NaiveDate, f64)>", into = "Vec<(NaiveDate, f64)>")]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ReturnSeries {
    /// Creates a series from `(date, return)` observations.
    ///
    /// Observations are sorted by date first; duplicate dates and non-finite
    /// returns are rejected.
    pub fn new(mut observations: Vec<(NaiveDate, f64)>) -> CoreResult<Self> {
        observations.sort_by_key(|(date, _)| *date);

        let mut dates = Vec::with_capacity(observations.len());
        let mut values = Vec::with_capacity(observations.len());

        for (date, value) in observations {
            if !value.is_finite() {
                return Err(CoreError::non_finite(format!("return on {date}"), value));
            }
            if dates.last() == Some(&date) {
                return Err(CoreError::invalid_series(format!("duplicate date {date}")));
            }
            dates.push(date);
            values.push(value);
        }

        Ok(Self { dates, values })
    }

    /// Creates a series of consecutive calendar days starting at `start`.
    pub fn from_values(start: NaiveDate, values: &[f64]) -> CoreResult<Self> {
        let observations = values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), *v))
            .collect();
        Self::new(observations)
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the series holds no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The observation dates in ascending order.
    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The returns in date order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Looks up the return on `date`.
    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Returns true if the series has an observation on `date`.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    /// The most recent `window` returns (or all of them if shorter).
    #[must_use]
    pub fn tail(&self, window: usize) -> &[f64] {
        let start = self.values.len().saturating_sub(window);
        &self.values[start..]
    }

    /// First observation date.
    #[must_use]
    pub fn start(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Last observation date.
    #[must_use]
    pub fn end(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Iterates over `(date, return)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }
}

impl TryFrom<Vec<(NaiveDate, f64)>> for ReturnSeries {
    type Error = CoreError;

    fn try_from(observations: Vec<(NaiveDate, f64)>) -> Result<Self, Self::Error> {
        Self::new(observations)
    }
}

impl From<ReturnSeries> for Vec<(NaiveDate, f64)> {
    fn from(series: ReturnSeries) -> Self {
        series.dates.into_iter().zip(series.values).collect()
    }
}
