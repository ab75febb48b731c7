pub(crate) mod align;
pub(crate) mod daily;
pub(crate) mod range;
pub(crate) mod sample;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

pub use align::{SeriesInput, YearComparison, align, compare_years, compare_years_grouped};
pub use daily::{DayWindow, ZoneDay, daily_chart, daily_chart_by_zone};
pub use range::{DateWindow, InvalidRange, TimeRange, WindowSide};
pub use sample::overview;

const MONTH_LABELS: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

/// Fixed palette used when several entities share one chart
pub const PALETTE: [&str; 8] = [
    "#2db2ac", // Teal
    "#a74044", // Red
    "#f59e0b", // Amber
    "#8b5cf6", // Violet
    "#10b981", // Emerald
    "#ef4444",
    "#06b6d4", // Cyan
    "#f97316", // Orange
];

/// One reporting day of one series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub value: f64,
}

impl DailyObservation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }

    pub fn month_day(&self) -> MonthDay {
        MonthDay::from_date(self.date)
    }
}

/// Identity of one plotted line, e.g. ("SIN", 2025)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SeriesKey {
    pub entity: String,
    pub year: i32,
}

impl SeriesKey {
    pub fn new(entity: impl Into<String>, year: i32) -> Self {
        Self {
            entity: entity.into(),
            year,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entity.is_empty() {
            write!(f, "{}", self.year)
        } else {
            write!(f, "{} {}", self.entity, self.year)
        }
    }
}

/// Calendar position with the year stripped. Ordering is (month, day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    /// Spanish axis label: "Ene 1", "Feb 15"
    pub fn label(&self) -> String {
        let month = MONTH_LABELS
            .get(self.month.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("?");
        format!("{} {}", month, self.day)
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// One x-axis position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub key: MonthDay,
    pub label: String,
}

impl Category {
    pub fn new(key: MonthDay) -> Self {
        Self {
            label: key.label(),
            key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: SeriesKey,
    pub name: String,
    pub color: &'static str,
    /// Drawn dashed when several entities share the chart
    pub previous_year: bool,
    /// Parallel to the chart categories; `None` is a gap
    pub data: Vec<Option<f64>>,
}

/// Categories plus one data array per series, all of the same length
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AlignedChart {
    pub categories: Vec<Category>,
    pub series: Vec<Series>,
}

impl AlignedChart {
    pub fn labels(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Mean of the non-gap values of a series
    pub fn average(&self, series_index: usize) -> Option<f64> {
        let series = self.series.get(series_index)?;
        let values: Vec<f64> = series.data.iter().flatten().copied().collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Parse a backend `Fecha` value. Accepts `YYYY-MM-DD` with an optional time part.
pub fn parse_fecha(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// The year a sequence covers, taken from its first observation
pub fn year_of(observations: &[DailyObservation], fallback: i32) -> i32 {
    observations
        .first()
        .map(|o| o.date.year())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_day_label() {
        let md = MonthDay::from_date(NaiveDate::from_ymd_opt(2025, 2, 15).unwrap());
        assert_eq!(md.label(), "Feb 15");
        assert_eq!(md.to_string(), "02-15");

        let md = MonthDay::from_date(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(md.label(), "Dic 1");
    }

    #[test]
    fn test_month_day_ordering() {
        let jan31 = MonthDay { month: 1, day: 31 };
        let feb1 = MonthDay { month: 2, day: 1 };
        let feb10 = MonthDay { month: 2, day: 10 };
        assert!(jan31 < feb1);
        assert!(feb1 < feb10);
    }

    #[test]
    fn test_parse_fecha() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        assert_eq!(parse_fecha("2025-01-03"), Some(expected));
        assert_eq!(parse_fecha("2025-01-03T00:00:00"), Some(expected));
        assert_eq!(parse_fecha("2025-01-03T10:00:00Z"), Some(expected));
        assert_eq!(parse_fecha("03/01/2025"), None);
        assert_eq!(parse_fecha("2025-13-01"), None);
    }

    #[test]
    fn test_series_key_display() {
        assert_eq!(SeriesKey::new("", 2025).to_string(), "2025");
        assert_eq!(SeriesKey::new("SIN", 2024).to_string(), "SIN 2024");
    }

    #[test]
    fn test_year_of_falls_back_on_empty() {
        assert_eq!(year_of(&[], 2026), 2026);
        let obs = [DailyObservation::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            1.0,
        )];
        assert_eq!(year_of(&obs, 2026), 2024);
    }

    #[test]
    fn test_average_skips_gaps() {
        let chart = AlignedChart {
            categories: vec![],
            series: vec![Series {
                key: SeriesKey::new("", 2025),
                name: "2025".to_string(),
                color: PALETTE[0],
                previous_year: false,
                data: vec![Some(10.0), None, Some(20.0)],
            }],
        };
        assert_eq!(chart.average(0), Some(15.0));
        assert_eq!(chart.average(1), None);
    }
}
