//! Home page widgets. Every widget loads on its own; a failing endpoint only
//! affects the widget that reads it.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::map::{Region, RegionLookup, Tooltip};
use crate::market::responses::{
    AbsolutePeakResponse, HourlyDemandComparison, LatestPml, LatestPnd, MedicionesResponse,
    MonthlyAveragePml, PmlExtremesResponse, ServiciosAverageResponse, TransferCapacityResponse,
    YearPeak,
};
use crate::market::{Market, MarketClient, Sistema};

const MONTHS: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

/// Load state of one widget
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum Widget<T> {
    Ready(T),
    Empty,
    Failed { message: String },
}

impl<T> Widget<T> {
    /// `Ok(None)` is a successful fetch without anything to show
    pub fn from_result<E: fmt::Display>(result: Result<Option<T>, E>) -> Self {
        match result {
            Ok(Some(data)) => Widget::Ready(data),
            Ok(None) => Widget::Empty,
            Err(e) => Widget::Failed {
                message: format!("Error cargando datos: {}", e),
            },
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Widget::Ready(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Relative change of the latest value against the one before it, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricChange {
    pub percent: f64,
    pub direction: Direction,
}

impl MetricChange {
    pub fn between(latest: f64, previous: Option<f64>) -> Self {
        let raw = match previous {
            Some(p) if p != 0.0 => latest * 100.0 / p - 100.0,
            _ => 0.0,
        };
        Self {
            percent: (raw * 100.0).round() / 100.0,
            direction: if raw < 0.0 {
                Direction::Down
            } else {
                Direction::Up
            },
        }
    }

    /// Badge text, magnitude only; the arrow carries the sign
    pub fn badge(&self) -> String {
        format!("{:.2}%", self.percent.abs())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub label: &'static str,
    pub value: f64,
    pub fecha: String,
    pub change: MetricChange,
}

impl MetricCard {
    /// Newest-first rows; the first two drive the change badge
    fn from_latest(label: &'static str, rows: &[(String, f64)]) -> Option<Self> {
        let (fecha, value) = rows.first()?;
        Some(Self {
            label,
            value: *value,
            fecha: fecha.clone(),
            change: MetricChange::between(*value, rows.get(1).map(|(_, v)| *v)),
        })
    }

    pub fn pml(rows: &[LatestPml]) -> Option<Self> {
        let rows: Vec<_> = rows.iter().map(|r| (r.fecha.clone(), r.promedio)).collect();
        Self::from_latest("PML MDA", &rows)
    }

    pub fn pnd(rows: &[LatestPnd]) -> Option<Self> {
        let rows: Vec<_> = rows.iter().map(|r| (r.fecha.clone(), r.promedio)).collect();
        Self::from_latest("PND MDA", &rows)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub label: String,
    pub value: f64,
}

/// Monthly average PML up to the reference month, oldest first
pub fn monthly_points(rows: &[MonthlyAveragePml], today: NaiveDate) -> Vec<MonthlyPoint> {
    let current = (today.year(), today.month());
    let mut rows: Vec<&MonthlyAveragePml> = rows
        .iter()
        .filter(|r| (1..=12).contains(&r.month) && (r.year, r.month) <= current)
        .collect();
    rows.sort_by_key(|r| (r.year, r.month));

    rows.into_iter()
        .map(|r| MonthlyPoint {
            label: format!("{} {}", MONTHS[(r.month - 1) as usize], r.year),
            value: r.monthly_average_pml,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakCard {
    pub year: i32,
    pub peak_mw: f64,
    pub fecha: String,
    /// "HH:00"
    pub hora: String,
    pub sistema: String,
}

impl From<&YearPeak> for PeakCard {
    fn from(peak: &YearPeak) -> Self {
        Self {
            year: peak.year,
            peak_mw: peak.peak_demand_mwh,
            fecha: peak.fecha.clone(),
            hora: format!("{:02}:00", peak.hora),
            sistema: peak.sistema.clone(),
        }
    }
}

/// Absolute demand peak of this year against last year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakComparison {
    pub current: PeakCard,
    pub previous: PeakCard,
    pub change: MetricChange,
}

impl From<&AbsolutePeakResponse> for PeakComparison {
    fn from(response: &AbsolutePeakResponse) -> Self {
        let peaks = &response.absolute_peak_comparison;
        Self {
            current: PeakCard::from(&peaks.current_year),
            previous: PeakCard::from(&peaks.previous_year),
            change: MetricChange::between(
                peaks.current_year.peak_demand_mwh,
                Some(peaks.previous_year.peak_demand_mwh),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReserveCard {
    pub average_price: f64,
    pub start_date: String,
    pub end_date: String,
    pub market: String,
    pub sistema: String,
}

impl From<&ServiciosAverageResponse> for ReserveCard {
    fn from(response: &ServiciosAverageResponse) -> Self {
        let data = &response.data;
        Self {
            average_price: data.average_price,
            start_date: data.start_date.clone(),
            end_date: data.end_date.clone(),
            market: data.market.clone(),
            sistema: data.sistema.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremePoint {
    pub precio: f64,
    pub fecha: String,
    pub hora: u32,
    pub sistema: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremesCard {
    pub market: String,
    pub max: ExtremePoint,
    pub min: ExtremePoint,
}

impl From<&PmlExtremesResponse> for ExtremesCard {
    fn from(response: &PmlExtremesResponse) -> Self {
        let point = |e: &crate::market::responses::PmlExtreme| ExtremePoint {
            precio: e.precio_mwh,
            fecha: e.fecha_operacion.clone(),
            hora: e.hora_operacion,
            sistema: e.sistema.clone(),
        };
        Self {
            market: response.data.market.clone(),
            max: point(&response.data.max),
            min: point(&response.data.min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRow {
    pub origin: String,
    pub enlace: String,
    pub fecha: String,
    pub importacion: f64,
    pub exportacion: f64,
}

pub fn transfer_rows(response: &TransferCapacityResponse) -> Vec<TransferRow> {
    response
        .data
        .iter()
        .map(|t| TransferRow {
            origin: t.origin().to_string(),
            enlace: t.enlace.clone(),
            fecha: t.fecha_operacion.clone(),
            importacion: t.importacion,
            exportacion: t.exportacion,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionShare {
    pub gerencia: String,
    pub promedio: f64,
    /// Share of the SIN total, in percent
    pub share: f64,
}

/// Latest-day demand per gerencia plus the map tooltips built from it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionDemand {
    pub latest_date: String,
    /// Day the tooltips compare against
    pub previous_week_date: String,
    /// Sum of the gerencia averages
    pub sin_total: f64,
    pub regions: Vec<RegionShare>,
    pub tooltips: Vec<(Region, Tooltip)>,
}

impl RegionDemand {
    pub fn from_comparison(data: &HourlyDemandComparison) -> Option<Self> {
        if data.latest_day_records.is_empty() {
            return None;
        }
        let sin_total = sin_total(data);
        let regions = data
            .latest_day_records
            .iter()
            .map(|r| RegionShare {
                gerencia: r.gerencia.clone(),
                promedio: r.promedio_demanda,
                share: if sin_total > 0.0 {
                    (r.promedio_demanda / sin_total * 100.0).round()
                } else {
                    0.0
                },
            })
            .collect();

        Some(Self {
            latest_date: data.latest_date.clone(),
            previous_week_date: data.previous_week_date.clone(),
            sin_total,
            regions,
            tooltips: RegionLookup::from_comparison(data).tooltips(),
        })
    }
}

pub fn sin_total(data: &HourlyDemandComparison) -> f64 {
    data.latest_day_records
        .iter()
        .map(|r| r.promedio_demanda)
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicionesCard {
    pub count: usize,
    pub total_mw: f64,
    pub latest: String,
}

impl MedicionesCard {
    pub fn from_response(response: &MedicionesResponse) -> Option<Self> {
        if response.data.is_empty() {
            return None;
        }
        let latest = response
            .data
            .iter()
            .map(|m| m.fecha_medicion.as_str())
            .max()
            .unwrap_or_default()
            .to_string();
        Some(Self {
            count: response.data.len(),
            total_mw: response.data.iter().map(|m| m.mw_promedio_er).sum(),
            latest,
        })
    }
}

/// Every widget of the home page
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub pml: Widget<MetricCard>,
    pub pnd: Widget<MetricCard>,
    pub monthly_pml: Widget<Vec<MonthlyPoint>>,
    pub demand_peak: Widget<PeakComparison>,
    pub reserve_average: Widget<ReserveCard>,
    pub pml_extremes: Widget<ExtremesCard>,
    pub transfer_capacity: Widget<Vec<TransferRow>>,
    pub regions: Widget<RegionDemand>,
    pub mediciones: Widget<MedicionesCard>,
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

impl Dashboard {
    pub async fn load(client: &MarketClient, today: NaiveDate) -> Self {
        let (pml, pnd, monthly, peaks, reserve, extremes, transfer, hourly, mediciones) = tokio::join!(
            client.latest_average_pml_mda(),
            client.latest_average_pnd_mda(),
            client.monthly_average_pml_mda(),
            client.demand_absolute_peak_comparison(),
            client.servicios_current_month_average(Market::Mda, Sistema::Sin),
            client.pml_current_month_extremes(Market::Mda),
            client.transfer_capacity(),
            client.hourly_demand_comparison(),
            client.latest_mediciones(),
        );

        Self {
            pml: Widget::from_result(pml.map(|rows| MetricCard::pml(&rows))),
            pnd: Widget::from_result(pnd.map(|rows| MetricCard::pnd(&rows))),
            monthly_pml: Widget::from_result(
                monthly.map(|rows| non_empty(monthly_points(&rows, today))),
            ),
            demand_peak: Widget::from_result(peaks.map(|r| Some(PeakComparison::from(&r)))),
            reserve_average: Widget::from_result(reserve.map(|r| Some(ReserveCard::from(&r)))),
            pml_extremes: Widget::from_result(extremes.map(|r| Some(ExtremesCard::from(&r)))),
            transfer_capacity: Widget::from_result(
                transfer.map(|r| non_empty(transfer_rows(&r))),
            ),
            regions: Widget::from_result(hourly.map(|d| RegionDemand::from_comparison(&d))),
            mediciones: Widget::from_result(
                mediciones.map(|r| MedicionesCard::from_response(&r)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketError;
    use crate::market::responses::GerenciaDemand;
    use crate::market::testing::spawn_backend;

    #[test]
    fn test_metric_change() {
        let change = MetricChange::between(110.0, Some(100.0));
        assert_eq!(change.percent, 10.0);
        assert_eq!(change.direction, Direction::Up);

        let change = MetricChange::between(1000.0, Some(1200.0));
        assert_eq!(change.percent, -16.67);
        assert_eq!(change.direction, Direction::Down);
        assert_eq!(change.badge(), "16.67%");

        let change = MetricChange::between(1000.0, None);
        assert_eq!(change.percent, 0.0);
        assert_eq!(change.direction, Direction::Up);
        assert_eq!(MetricChange::between(5.0, Some(0.0)).percent, 0.0);
    }

    #[test]
    fn test_widget_from_result() {
        let ready: Widget<u32> = Widget::from_result(Ok::<_, MarketError>(Some(3)));
        assert_eq!(ready, Widget::Ready(3));

        let empty: Widget<u32> = Widget::from_result(Ok::<_, MarketError>(None));
        assert_eq!(empty, Widget::Empty);

        let failed: Widget<u32> = Widget::from_result(Err(MarketError::Status {
            endpoint: "/api/v1/x".to_string(),
            status: 503,
        }));
        assert_eq!(
            failed,
            Widget::Failed {
                message: "Error cargando datos: /api/v1/x answered with status 503".to_string()
            }
        );
    }

    #[test]
    fn test_widget_serializes_state_tag() {
        let json = serde_json::to_value(Widget::Ready(vec![1, 2])).unwrap();
        assert_eq!(json["state"], "ready");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        let json = serde_json::to_value(Widget::<u32>::Empty).unwrap();
        assert_eq!(json["state"], "empty");
    }

    #[test]
    fn test_monthly_points_sorted_and_bounded() {
        let rows = vec![
            MonthlyAveragePml { year: 2025, month: 11, monthly_average_pml: 5.0 },
            MonthlyAveragePml { year: 2025, month: 2, monthly_average_pml: 2.0 },
            MonthlyAveragePml { year: 2024, month: 12, monthly_average_pml: 1.0 },
        ];
        let today = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();
        let labels: Vec<String> = monthly_points(&rows, today)
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, vec!["Dic 2024", "Feb 2025"]);
    }

    #[test]
    fn test_region_demand_shares() {
        let record = |g: &str, p: f64| GerenciaDemand {
            fecha: "2025-10-15".into(),
            gerencia: g.into(),
            maximo_demanda: p,
            minimo_demanda: p,
            promedio_demanda: p,
        };
        let data = HourlyDemandComparison {
            latest_date: "2025-10-15".into(),
            previous_week_date: "2025-10-08".into(),
            latest_day_records: vec![record("NORTE", 250.0), record("CENTRAL", 750.0)],
            previous_week_day_records: vec![],
        };

        let demand = RegionDemand::from_comparison(&data).unwrap();
        assert_eq!(demand.sin_total, 1000.0);
        assert_eq!(demand.regions[0].share, 25.0);
        assert_eq!(demand.previous_week_date, "2025-10-08");
        assert_eq!(demand.tooltips.len(), 9);
    }

    #[test]
    fn test_transfer_rows_keep_operation_date() {
        let response: TransferCapacityResponse = serde_json::from_str(
            r#"{"data": [{
                "Enlace": "MEXICALI - SAN LUIS",
                "FechaOperacion": "2025-10-16",
                "Transferencia_Disponible_Exportacion": 120.0,
                "Transferencia_Disponible_Importacion": 80.0
            }]}"#,
        )
        .unwrap();
        let rows = transfer_rows(&response);
        assert_eq!(rows[0].origin, "MEXICALI");
        assert_eq!(rows[0].fecha, "2025-10-16");
        assert_eq!(rows[0].importacion, 80.0);
    }

    #[tokio::test]
    async fn test_failures_stay_local() {
        let base = spawn_backend(vec![
            (
                "/api/v1/mda_mtr/latest_average_pml_mda",
                r#"[{"Fecha": "2025-10-15", "Promedio_PML": 1100.0},
                    {"Fecha": "2025-10-14", "Promedio_PML": 1000.0}]"#,
            ),
            (
                "/api/v1/capacidad_transferencia/capacidad_transferencia_by_day_ahead",
                r#"{"message": "ok", "data": []}"#,
            ),
        ])
        .await;
        let client = MarketClient::new(base);
        let today = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();

        let dashboard = Dashboard::load(&client, today).await;

        let pml = dashboard.pml.ready().unwrap();
        assert_eq!(pml.change.percent, 10.0);
        assert_eq!(dashboard.transfer_capacity, Widget::Empty);
        assert!(matches!(dashboard.pnd, Widget::Failed { .. }));
        assert!(matches!(dashboard.demand_peak, Widget::Failed { .. }));
    }
}
