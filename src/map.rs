//! Hover state and tooltips of the demand map.

use serde::Serialize;
use std::collections::HashMap;

use crate::market::regions::{GERENCIAS, Gerencia};
use crate::market::responses::{GerenciaDemand, HourlyDemandComparison};

pub const DEFAULT_FILL: &str = "#949994";
pub const HOVER_FILL: &str = "#003300";

/// Tooltip is drawn this far right of and below the pointer
const CURSOR_OFFSET: f64 = 10.0;

/// Map region of a gerencia
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: &'static str,
    pub name: &'static str,
}

impl From<&'static Gerencia> for Region {
    fn from(g: &'static Gerencia) -> Self {
        Self {
            id: g.id,
            name: g.name,
        }
    }
}

pub fn regions() -> Vec<Region> {
    GERENCIAS.iter().map(Region::from).collect()
}

pub fn get_region(id: &str) -> Option<Region> {
    let id = id.trim().to_uppercase();
    GERENCIAS.iter().find(|g| g.id == id).map(Region::from)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    /// Up only when strictly above the reference
    pub fn of(latest: f64, reference: f64) -> Self {
        if latest > reference {
            Trend::Up
        } else {
            Trend::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tooltip {
    Data {
        gerencia: String,
        fecha: String,
        today_average: f64,
        previous_week_average: Option<f64>,
        maximum: f64,
        minimum: f64,
        trend: Trend,
    },
    NoData {
        region: String,
    },
}

/// Latest-day and previous-week demand records keyed by upper-cased gerencia
#[derive(Debug, Clone, Default)]
pub struct RegionLookup {
    latest: HashMap<String, GerenciaDemand>,
    previous_week: HashMap<String, GerenciaDemand>,
}

fn index(records: &[GerenciaDemand]) -> HashMap<String, GerenciaDemand> {
    let mut by_region = HashMap::with_capacity(records.len());
    for record in records {
        by_region.insert(record.gerencia.trim().to_uppercase(), record.clone());
    }
    by_region
}

impl RegionLookup {
    pub fn from_comparison(data: &HourlyDemandComparison) -> Self {
        Self {
            latest: index(&data.latest_day_records),
            previous_week: index(&data.previous_week_day_records),
        }
    }

    pub fn latest(&self, region_id: &str) -> Option<&GerenciaDemand> {
        self.latest.get(&region_id.to_uppercase())
    }

    pub fn previous_week(&self, region_id: &str) -> Option<&GerenciaDemand> {
        self.previous_week.get(&region_id.to_uppercase())
    }

    pub fn tooltip(&self, region_id: &str) -> Tooltip {
        let Some(current) = self.latest(region_id) else {
            let region = get_region(region_id)
                .map(|r| r.name.to_string())
                .unwrap_or_else(|| region_id.to_string());
            return Tooltip::NoData { region };
        };

        let previous = self.previous_week(region_id).map(|r| r.promedio_demanda);
        Tooltip::Data {
            gerencia: current.gerencia.clone(),
            fecha: current.fecha.clone(),
            today_average: current.promedio_demanda,
            previous_week_average: previous,
            maximum: current.maximo_demanda,
            minimum: current.minimo_demanda,
            trend: Trend::of(current.promedio_demanda, previous.unwrap_or(0.0)),
        }
    }

    /// Tooltip of every known region, in table order
    pub fn tooltips(&self) -> Vec<(Region, Tooltip)> {
        regions()
            .into_iter()
            .map(|r| (r, self.tooltip(r.id)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Hover {
    region: &'static str,
    x: f64,
    y: f64,
}

/// At most one region is hovered at a time
#[derive(Debug, Clone, Default)]
pub struct MapHover {
    current: Option<Hover>,
}

impl MapHover {
    pub fn enter(&mut self, region: &'static str, x: f64, y: f64) {
        self.current = Some(Hover { region, x, y });
    }

    pub fn leave(&mut self) {
        self.current = None;
    }

    pub fn hovered(&self) -> Option<&'static str> {
        self.current.map(|h| h.region)
    }

    pub fn fill(&self, region: &str) -> &'static str {
        match self.hovered() {
            Some(hovered) if hovered == region => HOVER_FILL,
            _ => DEFAULT_FILL,
        }
    }

    /// Where the tooltip is anchored
    pub fn cursor(&self) -> Option<(f64, f64)> {
        self.current
            .map(|h| (h.x + CURSOR_OFFSET, h.y + CURSOR_OFFSET))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gerencia: &str, promedio: f64) -> GerenciaDemand {
        GerenciaDemand {
            fecha: "2025-10-15".to_string(),
            gerencia: gerencia.to_string(),
            maximo_demanda: promedio + 100.0,
            minimo_demanda: promedio - 100.0,
            promedio_demanda: promedio,
        }
    }

    fn comparison() -> HourlyDemandComparison {
        HourlyDemandComparison {
            latest_date: "2025-10-15".to_string(),
            previous_week_date: "2025-10-08".to_string(),
            latest_day_records: vec![record("Noreste", 7000.0), record("CENTRAL", 9000.0)],
            previous_week_day_records: vec![record("NORESTE", 6500.0)],
        }
    }

    #[test]
    fn test_tooltip_with_previous_week() {
        let lookup = RegionLookup::from_comparison(&comparison());
        match lookup.tooltip("NORESTE") {
            Tooltip::Data {
                today_average,
                previous_week_average,
                trend,
                ..
            } => {
                assert_eq!(today_average, 7000.0);
                assert_eq!(previous_week_average, Some(6500.0));
                assert_eq!(trend, Trend::Up);
            }
            other => panic!("unexpected tooltip: {other:?}"),
        }
    }

    #[test]
    fn test_tooltip_without_previous_week() {
        let lookup = RegionLookup::from_comparison(&comparison());
        let Tooltip::Data {
            previous_week_average,
            trend,
            ..
        } = lookup.tooltip("central")
        else {
            panic!("expected data");
        };
        assert_eq!(previous_week_average, None);
        assert_eq!(trend, Trend::Up);
    }

    #[test]
    fn test_tooltip_no_data() {
        let lookup = RegionLookup::from_comparison(&comparison());
        assert_eq!(
            lookup.tooltip("PENINSULAR"),
            Tooltip::NoData {
                region: "Peninsular".to_string()
            }
        );
        assert_eq!(lookup.tooltips().len(), 9);
    }

    #[test]
    fn test_equal_average_is_down() {
        assert_eq!(Trend::of(10.0, 10.0), Trend::Down);
    }

    #[test]
    fn test_hover_is_exclusive() {
        let mut hover = MapHover::default();
        assert_eq!(hover.fill("NORTE"), DEFAULT_FILL);

        hover.enter("NORTE", 5.0, 7.0);
        hover.enter("CENTRAL", 20.0, 30.0);
        assert_eq!(hover.fill("NORTE"), DEFAULT_FILL);
        assert_eq!(hover.fill("CENTRAL"), HOVER_FILL);
        assert_eq!(hover.cursor(), Some((30.0, 40.0)));

        hover.leave();
        assert_eq!(hover.hovered(), None);
        assert_eq!(hover.cursor(), None);
    }
}
