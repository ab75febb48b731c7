use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::DailyObservation;

#[derive(Debug, Error, PartialEq)]
#[error("unknown time range: {0} (expected full, 3m, 6m or 9m)")]
pub struct InvalidRange(pub String);

/// Time-range selector shared by the yearly comparison charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum TimeRange {
    #[default]
    Full,
    LastMonths(u32),
}

/// Which year of a comparison a sequence belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSide {
    Current,
    Previous,
}

/// Inclusive date window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl TimeRange {
    pub const OPTIONS: [TimeRange; 4] = [
        TimeRange::Full,
        TimeRange::LastMonths(3),
        TimeRange::LastMonths(6),
        TimeRange::LastMonths(9),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Full => "full",
            TimeRange::LastMonths(3) => "3m",
            TimeRange::LastMonths(6) => "6m",
            TimeRange::LastMonths(_) => "9m",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Full => "Todo el año",
            TimeRange::LastMonths(3) => "Últimos 3 meses",
            TimeRange::LastMonths(6) => "Últimos 6 meses",
            TimeRange::LastMonths(_) => "Últimos 9 meses",
        }
    }

    /// Number of x-axis ticks the chart should aim for
    pub fn tick_amount(&self) -> Option<u32> {
        match self {
            TimeRange::Full => Some(12),
            TimeRange::LastMonths(3) => None,
            TimeRange::LastMonths(n) => Some(*n),
        }
    }

    /// Window for one side of the comparison, `None` for the full year.
    ///
    /// The current window runs from the first day of the month `n - 1` months
    /// before `reference` through `reference`. The previous window covers the
    /// same months one year earlier and ends on the last day of the shifted
    /// reference month.
    pub fn window(&self, side: WindowSide, reference: NaiveDate) -> Option<DateWindow> {
        let months = match self {
            TimeRange::Full => return None,
            TimeRange::LastMonths(n) => *n,
        };

        let (anchor, end) = match side {
            WindowSide::Current => (reference, reference),
            WindowSide::Previous => {
                let anchor = reference.checked_sub_months(Months::new(12))?;
                (anchor, last_day_of_month(anchor)?)
            }
        };

        let start = anchor
            .with_day(1)?
            .checked_sub_months(Months::new(months.saturating_sub(1)))?;

        Some(DateWindow { start, end })
    }

    /// Keep the observations inside this range's window, preserving order.
    /// `Full` returns the input unchanged.
    pub fn apply(
        &self,
        observations: &[DailyObservation],
        side: WindowSide,
        reference: NaiveDate,
    ) -> Vec<DailyObservation> {
        match self.window(side, reference) {
            None => observations.to_vec(),
            Some(window) => observations
                .iter()
                .filter(|o| window.contains(o.date))
                .copied()
                .collect(),
        }
    }
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

impl FromStr for TimeRange {
    type Err = InvalidRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(TimeRange::Full),
            "3m" => Ok(TimeRange::LastMonths(3)),
            "6m" => Ok(TimeRange::LastMonths(6)),
            "9m" => Ok(TimeRange::LastMonths(9)),
            other => Err(InvalidRange(other.to_string())),
        }
    }
}

impl TryFrom<String> for TimeRange {
    type Error = InvalidRange;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for TimeRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
