use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeSet, HashMap};

use super::range::{TimeRange, WindowSide};
use super::{AlignedChart, Category, DailyObservation, MonthDay, PALETTE, Series, SeriesKey, year_of};

/// One sequence to be aligned, with the presentation attributes of its line
#[derive(Debug, Clone)]
pub struct SeriesInput {
    pub key: SeriesKey,
    pub name: String,
    pub color: &'static str,
    pub previous_year: bool,
    pub observations: Vec<DailyObservation>,
}

/// Current and previous year observations of one entity (system, zone,
/// gerencia or reserve type)
#[derive(Debug, Clone, Default)]
pub struct YearComparison {
    pub entity: String,
    pub current: Vec<DailyObservation>,
    pub previous: Vec<DailyObservation>,
}

impl YearComparison {
    pub fn new(
        entity: impl Into<String>,
        current: Vec<DailyObservation>,
        previous: Vec<DailyObservation>,
    ) -> Self {
        Self {
            entity: entity.into(),
            current,
            previous,
        }
    }
}

/// Build the shared category axis and one value array per input.
///
/// Categories are the sorted union of every input's month-days. Each output
/// array has exactly one slot per category; a slot without an observation is
/// `None`. When an input repeats a month-day the first observation wins.
pub fn align(inputs: &[SeriesInput]) -> AlignedChart {
    let keys: BTreeSet<MonthDay> = inputs
        .iter()
        .flat_map(|input| input.observations.iter().map(|o| o.month_day()))
        .collect();

    let categories: Vec<Category> = keys.into_iter().map(Category::new).collect();

    let series = inputs
        .iter()
        .map(|input| {
            let mut by_key: HashMap<MonthDay, usize> =
                HashMap::with_capacity(input.observations.len());
            for (i, obs) in input.observations.iter().enumerate() {
                by_key.entry(obs.month_day()).or_insert(i);
            }

            let data = categories
                .iter()
                .map(|c| by_key.get(&c.key).map(|&i| input.observations[i].value))
                .collect();

            Series {
                key: input.key.clone(),
                name: input.name.clone(),
                color: input.color,
                previous_year: input.previous_year,
                data,
            }
        })
        .collect();

    AlignedChart { categories, series }
}

/// Two-series chart of one entity, current year against the previous one.
/// Series are named after their years.
pub fn compare_years(
    comparison: &YearComparison,
    range: TimeRange,
    reference: NaiveDate,
) -> AlignedChart {
    let (current, previous) = year_inputs(comparison, range, reference, 0);
    align(&[
        SeriesInput {
            name: current.key.year.to_string(),
            ..current
        },
        SeriesInput {
            name: previous.key.year.to_string(),
            ..previous
        },
    ])
}

/// Chart with two series per entity on one shared axis. Each entity takes the
/// next palette color; its previous-year line is flagged for dashed drawing.
pub fn compare_years_grouped(
    comparisons: &[YearComparison],
    range: TimeRange,
    reference: NaiveDate,
) -> AlignedChart {
    let inputs: Vec<SeriesInput> = comparisons
        .iter()
        .enumerate()
        .flat_map(|(i, comparison)| {
            let (current, previous) = year_inputs(comparison, range, reference, i);
            [current, previous]
        })
        .collect();

    align(&inputs)
}

fn year_inputs(
    comparison: &YearComparison,
    range: TimeRange,
    reference: NaiveDate,
    entity_index: usize,
) -> (SeriesInput, SeriesInput) {
    let color = PALETTE[entity_index % PALETTE.len()];
    let current_year = year_of(&comparison.current, reference.year());
    let previous_year = year_of(&comparison.previous, reference.year() - 1);

    let current_key = SeriesKey::new(comparison.entity.clone(), current_year);
    let previous_key = SeriesKey::new(comparison.entity.clone(), previous_year);

    (
        SeriesInput {
            name: current_key.to_string(),
            key: current_key,
            color,
            previous_year: false,
            observations: range.apply(&comparison.current, WindowSide::Current, reference),
        },
        SeriesInput {
            name: previous_key.to_string(),
            key: previous_key,
            color,
            previous_year: true,
            observations: range.apply(&comparison.previous, WindowSide::Previous, reference),
        },
    )
}
