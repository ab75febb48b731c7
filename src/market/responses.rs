//! Response bodies of the market REST API, one type per endpoint.
//!
//! Field names follow the backend verbatim. Collections default to empty so
//! that a partially populated response reads as "no data" instead of failing.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::warn;

use crate::series::{DailyObservation, ZoneDay, parse_fecha};

/// A row carrying one date and one value
pub trait DailyRow {
    fn fecha(&self) -> &str;
    fn value(&self) -> Option<f64>;
}

/// Convert rows into observations, dropping rows whose date does not parse
/// or whose value is missing
pub fn to_observations<R: DailyRow>(rows: &[R]) -> Vec<DailyObservation> {
    let mut skipped = 0usize;
    let observations: Vec<DailyObservation> = rows
        .iter()
        .filter_map(|row| match (parse_fecha(row.fecha()), row.value()) {
            (Some(date), Some(value)) if value.is_finite() => {
                Some(DailyObservation::new(date, value))
            }
            _ => {
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        warn!(skipped, total = rows.len(), "dropped malformed daily rows");
    }
    observations
}

macro_rules! daily_row {
    ($ty:ty, $date:ident, $value:ident) => {
        impl DailyRow for $ty {
            fn fecha(&self) -> &str {
                &self.$date
            }

            fn value(&self) -> Option<f64> {
                self.$value
            }
        }
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateRange {
    pub start: String,
}

// --- PML yearly comparison -------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PmlYearlyResponse {
    pub data: PmlYearlyData,
}

#[derive(Debug, Deserialize)]
pub struct PmlYearlyData {
    #[serde(default)]
    pub sistema: String,
    #[serde(rename = "currentYearData", default)]
    pub current_year_data: Vec<PmlDay>,
    #[serde(rename = "previousYearData", default)]
    pub previous_year_data: Vec<PmlDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PmlDay {
    #[serde(rename = "Fecha")]
    pub fecha: String,
    #[serde(rename = "AvgPML")]
    pub avg_pml: Option<f64>,
}

daily_row!(PmlDay, fecha, avg_pml);

// --- Reserve services yearly comparison ------------------------------------

#[derive(Debug, Deserialize)]
pub struct ServiciosYearlyResponse {
    pub data: ServiciosYearlyData,
}

#[derive(Debug, Deserialize)]
pub struct ServiciosYearlyData {
    /// Per reserve type, in the order the backend lists them
    #[serde(default, deserialize_with = "in_document_order")]
    pub comparison: Vec<(String, ReserveComparison)>,
}

impl ServiciosYearlyData {
    pub fn reserve_types(&self) -> Vec<String> {
        self.comparison.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn reserve(&self, name: &str) -> Option<&ReserveComparison> {
        self.comparison
            .iter()
            .find(|(reserve, _)| reserve == name)
            .map(|(_, data)| data)
    }
}

/// Read a JSON object as key/value pairs without reordering the keys
fn in_document_order<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct Pairs<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for Pairs<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map keyed by reserve type")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(Pairs(PhantomData))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveComparison {
    #[serde(rename = "currentYearData", default)]
    pub current_year_data: Vec<ReserveDay>,
    #[serde(rename = "previousYearData", default)]
    pub previous_year_data: Vec<ReserveDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveDay {
    #[serde(rename = "Fecha")]
    pub fecha: String,
    #[serde(rename = "AvgPrecioReserva")]
    pub avg_precio_reserva: Option<f64>,
}

daily_row!(ReserveDay, fecha, avg_precio_reserva);

// --- Demand ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DemandPeakComparisonResponse {
    #[serde(rename = "currentYearData", default)]
    pub current_year_data: Vec<DemandPeakDay>,
    #[serde(rename = "previousYearData", default)]
    pub previous_year_data: Vec<DemandPeakDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemandPeakDay {
    #[serde(rename = "Fecha")]
    pub fecha: String,
    #[serde(rename = "MaxDemanda_MWh")]
    pub max_demanda_mwh: Option<f64>,
    /// Hour of the daily peak
    #[serde(rename = "Hora")]
    pub hora: Option<u32>,
}

daily_row!(DemandPeakDay, fecha, max_demanda_mwh);

#[derive(Debug, Deserialize)]
pub struct RealDemandResponse {
    #[serde(rename = "currentYearData", default)]
    pub current_year_data: Vec<RealDemandDay>,
    #[serde(rename = "previousYearData", default)]
    pub previous_year_data: Vec<RealDemandDay>,
    #[serde(rename = "dateRanges")]
    pub date_ranges: Option<YearRanges>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YearRanges {
    #[serde(rename = "currentYear")]
    pub current_year: DateRange,
    #[serde(rename = "previousYear")]
    pub previous_year: DateRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealDemandDay {
    #[serde(rename = "Fecha")]
    pub fecha: String,
    #[serde(rename = "MaxDemandaHoraria_MWh")]
    pub max_demanda_horaria_mwh: Option<f64>,
}

daily_row!(RealDemandDay, fecha, max_demanda_horaria_mwh);

#[derive(Debug, Deserialize)]
pub struct AbsolutePeakResponse {
    pub absolute_peak_comparison: AbsolutePeakComparison,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbsolutePeakComparison {
    #[serde(rename = "currentYear")]
    pub current_year: YearPeak,
    #[serde(rename = "previousYear")]
    pub previous_year: YearPeak,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YearPeak {
    pub fecha: String,
    pub hora: u32,
    #[serde(rename = "peak_demand_MWh")]
    pub peak_demand_mwh: f64,
    pub sistema: String,
    pub year: i32,
}

/// Latest-day and previous-week demand per gerencia
#[derive(Debug, Clone, Deserialize)]
pub struct HourlyDemandComparison {
    pub latest_date: String,
    pub previous_week_date: String,
    #[serde(default)]
    pub latest_day_records: Vec<GerenciaDemand>,
    #[serde(default)]
    pub previous_week_day_records: Vec<GerenciaDemand>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GerenciaDemand {
    #[serde(rename = "Fecha")]
    pub fecha: String,
    #[serde(rename = "Gerencia")]
    pub gerencia: String,
    #[serde(rename = "Maximo_Demanda")]
    pub maximo_demanda: f64,
    #[serde(rename = "Minimo_Demanda")]
    pub minimo_demanda: f64,
    #[serde(rename = "Promedio_Demanda")]
    pub promedio_demanda: f64,
}

// --- Month-to-date charts --------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PmlMonthOverMonthResponse {
    pub data: PmlMonthOverMonth,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PmlMonthOverMonth {
    pub current_month_overall_average: f64,
    pub previous_month_average: f64,
    pub percentage_change: f64,
    /// "positive" or "negative"
    pub trend: String,
    #[serde(default)]
    pub current_month_daily_averages: Vec<PmlDailyAverage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PmlDailyAverage {
    pub date: String,
    pub average_pml: Option<f64>,
}

daily_row!(PmlDailyAverage, date, average_pml);

#[derive(Debug, Deserialize)]
pub struct ServiciosDailyResponse {
    #[serde(default)]
    pub data: Vec<ServiciosDailyAverage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiciosDailyAverage {
    pub date: String,
    pub daily_average_price: Option<f64>,
}

daily_row!(ServiciosDailyAverage, date, daily_average_price);

#[derive(Debug, Deserialize)]
pub struct PndZonesResponse {
    pub data: PndZonesData,
}

#[derive(Debug, Deserialize)]
pub struct PndZonesData {
    #[serde(default)]
    pub averages_by_day: Vec<PndDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PndDay {
    pub date: String,
    #[serde(default)]
    pub zones: HashMap<String, Option<f64>>,
}

/// Convert every day that carries a parseable date, logging the ones dropped
pub fn to_zone_days(days: &[PndDay]) -> Vec<ZoneDay> {
    let zone_days: Vec<ZoneDay> = days.iter().filter_map(PndDay::to_zone_day).collect();
    let skipped = days.len() - zone_days.len();
    if skipped > 0 {
        warn!(skipped, total = days.len(), "dropped malformed zone days");
    }
    zone_days
}

impl PndDay {
    pub fn to_zone_day(&self) -> Option<ZoneDay> {
        let date = parse_fecha(&self.date)?;
        let values = self
            .zones
            .iter()
            .filter_map(|(zone, value)| value.map(|v| (zone.clone(), v)))
            .collect();
        Some(ZoneDay { date, values })
    }
}

// --- Cards -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ServiciosAverageResponse {
    pub data: ServiciosAverage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiciosAverage {
    pub average_price: f64,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
    pub market: String,
    pub sistema: String,
}

#[derive(Debug, Deserialize)]
pub struct PmlExtremesResponse {
    pub data: PmlExtremes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PmlExtremes {
    pub market: String,
    pub max: PmlExtreme,
    pub min: PmlExtreme,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PmlExtreme {
    #[serde(rename = "FechaOperacion")]
    pub fecha_operacion: String,
    #[serde(rename = "HoraOperacion")]
    pub hora_operacion: u32,
    #[serde(rename = "PrecioMarginalLocal_MWh")]
    pub precio_mwh: f64,
    #[serde(rename = "Sistema")]
    pub sistema: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestPml {
    #[serde(rename = "Fecha")]
    pub fecha: String,
    #[serde(rename = "Promedio_PML")]
    pub promedio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestPnd {
    #[serde(rename = "Fecha")]
    pub fecha: String,
    #[serde(rename = "Promedio_PND")]
    pub promedio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyAveragePml {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Monthly_Average_PML")]
    pub monthly_average_pml: f64,
}

#[derive(Debug, Deserialize)]
pub struct TransferCapacityResponse {
    #[serde(default)]
    pub data: Vec<TransferCapacity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferCapacity {
    /// Link name, "<origin> - <destination>"
    #[serde(rename = "Enlace")]
    pub enlace: String,
    #[serde(rename = "FechaOperacion")]
    pub fecha_operacion: String,
    #[serde(rename = "Transferencia_Disponible_Exportacion")]
    pub exportacion: f64,
    #[serde(rename = "Transferencia_Disponible_Importacion")]
    pub importacion: f64,
}

impl TransferCapacity {
    /// Origin end of the link, as shown on the chart axis
    pub fn origin(&self) -> &str {
        self.enlace.split('-').next().unwrap_or_default().trim()
    }
}

#[derive(Debug, Deserialize)]
pub struct MedicionesResponse {
    #[serde(default)]
    pub data: Vec<Medicion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Medicion {
    #[serde(rename = "FechaMedicion")]
    pub fecha_medicion: String,
    #[serde(rename = "MW_Promedio_ER")]
    pub mw_promedio_er: f64,
}
