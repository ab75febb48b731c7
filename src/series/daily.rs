use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

use super::range::InvalidRange;
use super::{AlignedChart, Category, DailyObservation, MonthDay, PALETTE, Series, SeriesKey, year_of};

/// Day window used by the month-to-date charts: everything, or the last N days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DayWindow {
    #[default]
    Full,
    LastDays(usize),
}

impl DayWindow {
    /// Windows offered by the chart page
    pub const OPTIONS: [DayWindow; 3] = [
        DayWindow::Full,
        DayWindow::LastDays(7),
        DayWindow::LastDays(15),
    ];

    pub fn label(&self) -> String {
        match self {
            DayWindow::Full => "Mes completo".to_string(),
            DayWindow::LastDays(n) => format!("Últimos {n} días"),
        }
    }

    pub fn apply<T: Clone>(&self, points: &[T]) -> Vec<T> {
        match self {
            DayWindow::Full => points.to_vec(),
            DayWindow::LastDays(n) => points[points.len().saturating_sub(*n)..].to_vec(),
        }
    }

    pub fn as_param(&self) -> String {
        match self {
            DayWindow::Full => "full".to_string(),
            DayWindow::LastDays(n) => format!("{n}d"),
        }
    }
}

impl FromStr for DayWindow {
    type Err = InvalidRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "full" {
            return Ok(DayWindow::Full);
        }
        s.strip_suffix('d')
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map(DayWindow::LastDays)
            .ok_or_else(|| InvalidRange(s.to_string()))
    }
}

impl TryFrom<String> for DayWindow {
    type Error = InvalidRange;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One day of per-zone averages
#[derive(Debug, Clone)]
pub struct ZoneDay {
    pub date: NaiveDate,
    pub values: HashMap<String, f64>,
}

fn day_category(date: NaiveDate) -> Category {
    Category {
        key: MonthDay::from_date(date),
        label: format!("Día {}", date.day()),
    }
}

/// Single-series month-to-date chart labelled "Día N"
pub fn daily_chart(
    name: &str,
    observations: &[DailyObservation],
    window: DayWindow,
    reference: NaiveDate,
) -> AlignedChart {
    let points = window.apply(observations);
    let key = SeriesKey::new(name, year_of(&points, reference.year()));

    AlignedChart {
        categories: points.iter().map(|o| day_category(o.date)).collect(),
        series: vec![Series {
            key,
            name: name.to_string(),
            color: PALETTE[0],
            previous_year: false,
            data: points.iter().map(|o| Some(o.value)).collect(),
        }],
    }
}

/// One series per zone over the month's days. A zone missing on a day is a gap.
pub fn daily_chart_by_zone(
    days: &[ZoneDay],
    zones: &[&str],
    window: DayWindow,
    reference: NaiveDate,
) -> AlignedChart {
    let days = window.apply(days);
    let year = days.first().map(|d| d.date.year()).unwrap_or(reference.year());

    let series = zones
        .iter()
        .enumerate()
        .map(|(i, zone)| Series {
            key: SeriesKey::new(*zone, year),
            name: zone.to_string(),
            color: PALETTE[i % PALETTE.len()],
            previous_year: false,
            data: days.iter().map(|d| d.values.get(*zone).copied()).collect(),
        })
        .collect();

    AlignedChart {
        categories: days.iter().map(|d| day_category(d.date)).collect(),
        series,
    }
}
