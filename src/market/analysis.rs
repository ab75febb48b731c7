use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::regions::PND_ZONES;
use super::responses::{DemandPeakDay, to_observations, to_zone_days};
use super::{GerenciaFilter, Market, MarketClient, MarketError, Sistema};
use crate::series::{
    AlignedChart, DailyObservation, DayWindow, MonthDay, TimeRange, YearComparison, compare_years,
    compare_years_grouped, daily_chart, daily_chart_by_zone, overview, parse_fecha, year_of,
};

/// Charts the dashboard knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    PmlYearly,
    ServiciosYearly,
    ServiciosYearlyAll,
    DemandYearly,
    RealDemand,
    PmlDaily,
    ServiciosDaily,
    PndZones,
}

impl ChartKind {
    pub const ALL: [ChartKind; 8] = [
        ChartKind::PmlYearly,
        ChartKind::ServiciosYearly,
        ChartKind::ServiciosYearlyAll,
        ChartKind::DemandYearly,
        ChartKind::RealDemand,
        ChartKind::PmlDaily,
        ChartKind::ServiciosDaily,
        ChartKind::PndZones,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ChartKind::PmlYearly => "pml-yearly",
            ChartKind::ServiciosYearly => "servicios-yearly",
            ChartKind::ServiciosYearlyAll => "servicios-yearly-all",
            ChartKind::DemandYearly => "demand-yearly",
            ChartKind::RealDemand => "real-demand",
            ChartKind::PmlDaily => "pml-daily",
            ChartKind::ServiciosDaily => "servicios-daily",
            ChartKind::PndZones => "pnd-zones",
        }
    }

    /// Month-to-date charts, filtered by a day window instead of a time range
    pub fn is_daily(&self) -> bool {
        matches!(
            self,
            ChartKind::PmlDaily | ChartKind::ServiciosDaily | ChartKind::PndZones
        )
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::PmlYearly => "PML: comparación anual",
            ChartKind::ServiciosYearly => "Servicios conexos: comparación anual",
            ChartKind::ServiciosYearlyAll => "Servicios conexos: todas las reservas",
            ChartKind::DemandYearly => "Demanda máxima diaria",
            ChartKind::RealDemand => "Demanda real balance",
            ChartKind::PmlDaily => "PML diario del mes",
            ChartKind::ServiciosDaily => "Servicios conexos diario",
            ChartKind::PndZones => "PND por zona",
        }
    }
}

impl FromStr for ChartKind {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| MarketError::InvalidParameter(format!("chart {s}")))
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Filter selections of one chart
#[derive(Debug, Clone, Default)]
pub struct ChartRequest {
    pub market: Market,
    pub sistema: Sistema,
    pub gerencia: GerenciaFilter,
    pub reserve: Option<String>,
    pub range: TimeRange,
    pub days: DayWindow,
}

/// A chart ready to be drawn, exported, or summarized
#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub title: String,
    pub subtitle: String,
    pub unit: &'static str,
    pub chart: AlignedChart,
    /// Thinned copy for the overview strip
    pub overview: AlignedChart,
    /// Per-series mean of the displayed values
    pub averages: Vec<Option<f64>>,
    /// Hour of the daily peak, parallel to `chart.series` (demand charts only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub peak_hours: Vec<Vec<Option<u32>>>,
    /// Alternatives for the chart's entity selector (reserve types)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub tick_amount: Option<u32>,
    #[serde(skip)]
    pub csv_prefix: &'static str,
    #[serde(skip)]
    pub csv_params: Vec<String>,
}

impl ChartView {
    fn new(
        title: String,
        subtitle: String,
        unit: &'static str,
        chart: AlignedChart,
        csv_prefix: &'static str,
    ) -> Self {
        let averages = (0..chart.series.len()).map(|i| chart.average(i)).collect();
        Self {
            title,
            subtitle,
            unit,
            overview: overview(&chart),
            averages,
            chart,
            peak_hours: Vec::new(),
            options: Vec::new(),
            tick_amount: None,
            csv_prefix,
            csv_params: Vec::new(),
        }
    }

    fn with_csv_params<I: IntoIterator<Item = String>>(mut self, params: I) -> Self {
        self.csv_params = params.into_iter().collect();
        self
    }

    fn with_ticks(mut self, range: TimeRange) -> Self {
        self.tick_amount = range.tick_amount();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.chart.is_empty()
    }

    /// Year of the first and second series, for "2025 vs 2024" headings
    fn years(chart: &AlignedChart) -> (i32, i32) {
        let current = chart.series.first().map(|s| s.key.year).unwrap_or_default();
        let previous = chart.series.get(1).map(|s| s.key.year).unwrap_or_default();
        (current, previous)
    }
}

impl MarketClient {
    /// Build any chart from its kind and filter selections
    pub async fn chart(
        &self,
        kind: ChartKind,
        request: &ChartRequest,
        today: NaiveDate,
    ) -> Result<ChartView, MarketError> {
        match kind {
            ChartKind::PmlYearly => {
                self.pml_yearly_chart(request.market, request.sistema, request.range, today)
                    .await
            }
            ChartKind::ServiciosYearly => {
                self.servicios_yearly_chart(
                    request.market,
                    request.sistema,
                    request.reserve.as_deref(),
                    request.range,
                    today,
                )
                .await
            }
            ChartKind::ServiciosYearlyAll => {
                self.servicios_yearly_grouped_chart(
                    request.market,
                    request.sistema,
                    request.range,
                    today,
                )
                .await
            }
            ChartKind::DemandYearly => {
                self.demand_yearly_chart(&request.gerencia, request.range, today)
                    .await
            }
            ChartKind::RealDemand => self.real_demand_chart(today).await,
            ChartKind::PmlDaily => self.pml_daily_chart(request.market, request.days, today).await,
            ChartKind::ServiciosDaily => {
                self.servicios_daily_chart(request.market, request.sistema, request.days, today)
                    .await
            }
            ChartKind::PndZones => self.pnd_zone_chart(request.market, request.days, today).await,
        }
    }

    /// Daily average PML, current year against the previous one
    pub async fn pml_yearly_chart(
        &self,
        market: Market,
        sistema: Sistema,
        range: TimeRange,
        today: NaiveDate,
    ) -> Result<ChartView, MarketError> {
        let response = self.pml_yearly_comparison(market, sistema).await?;
        let entity = if response.data.sistema.is_empty() {
            sistema.to_string()
        } else {
            response.data.sistema.clone()
        };

        let comparison = YearComparison::new(
            entity.clone(),
            to_observations(&response.data.current_year_data),
            to_observations(&response.data.previous_year_data),
        );
        let chart = compare_years(&comparison, range, today);
        let (current, previous) = ChartView::years(&chart);

        Ok(ChartView::new(
            format!(
                "Promedio Diario PML: {} vs {} ({})",
                current,
                previous,
                market.as_str().to_uppercase()
            ),
            format!("Comparación anual del PML por sistema - {}", entity),
            "$/MWh",
            chart,
            "pml_yearly",
        )
        .with_ticks(range)
        .with_csv_params([market.to_string(), sistema.to_string(), range.to_string()]))
    }

    /// Reserve-service prices for one reserve type. Without a requested type
    /// the first one reported is used.
    pub async fn servicios_yearly_chart(
        &self,
        market: Market,
        sistema: Sistema,
        reserve: Option<&str>,
        range: TimeRange,
        today: NaiveDate,
    ) -> Result<ChartView, MarketError> {
        let response = self.servicios_yearly_comparison(market, sistema).await?;
        let options = response.data.reserve_types();

        let selected = reserve
            .map(str::to_string)
            .or_else(|| options.first().cloned())
            .unwrap_or_default();

        let comparison = match response.data.reserve(&selected) {
            Some(data) => YearComparison::new(
                selected.clone(),
                to_observations(&data.current_year_data),
                to_observations(&data.previous_year_data),
            ),
            None => YearComparison::new(selected.clone(), Vec::new(), Vec::new()),
        };
        let chart = compare_years(&comparison, range, today);
        let (current, previous) = ChartView::years(&chart);

        let mut view = ChartView::new(
            format!(
                "Promedio Diario: {} vs {} ({})",
                current,
                previous,
                market.as_str().to_uppercase()
            ),
            format!(
                "Comparación anual de {} por sistema - {}",
                if selected.is_empty() {
                    "servicios conexos"
                } else {
                    selected.as_str()
                },
                sistema
            ),
            "$/MWh",
            chart,
            "servicios_yearly",
        )
        .with_ticks(range)
        .with_csv_params([selected, market.to_string(), sistema.to_string()]);
        view.options = options;
        Ok(view)
    }

    /// Every reserve type of a system on one chart, two lines per type
    pub async fn servicios_yearly_grouped_chart(
        &self,
        market: Market,
        sistema: Sistema,
        range: TimeRange,
        today: NaiveDate,
    ) -> Result<ChartView, MarketError> {
        let response = self.servicios_yearly_comparison(market, sistema).await?;

        let comparisons: Vec<YearComparison> = response
            .data
            .comparison
            .iter()
            .map(|(reserve, data)| {
                YearComparison::new(
                    reserve.clone(),
                    to_observations(&data.current_year_data),
                    to_observations(&data.previous_year_data),
                )
            })
            .collect();
        let chart = compare_years_grouped(&comparisons, range, today);

        let mut view = ChartView::new(
            format!(
                "Servicios conexos por tipo de reserva ({})",
                market.as_str().to_uppercase()
            ),
            format!("Comparación anual por sistema - {}", sistema),
            "$/MWh",
            chart,
            "servicios_yearly_all",
        )
        .with_ticks(range)
        .with_csv_params([market.to_string(), sistema.to_string(), range.to_string()]);
        view.options = response.data.reserve_types();
        Ok(view)
    }

    /// Daily peak demand per gerencia, with the hour each peak happened
    pub async fn demand_yearly_chart(
        &self,
        gerencia: &GerenciaFilter,
        range: TimeRange,
        today: NaiveDate,
    ) -> Result<ChartView, MarketError> {
        let response = self.demand_daily_peak_comparison(gerencia).await?;

        let comparison = YearComparison::new(
            gerencia.label(),
            to_observations(&response.current_year_data),
            to_observations(&response.previous_year_data),
        );
        let chart = compare_years(&comparison, range, today);
        let (current, previous) = ChartView::years(&chart);

        let peak_hours = peak_hours(
            &response.current_year_data,
            &response.previous_year_data,
            &chart,
        );

        let mut view = ChartView::new(
            format!("Demanda Máxima Diaria: {} vs {}", current, previous),
            format!(
                "Comparación anual de la demanda máxima diaria por gerencia - {}",
                gerencia.label()
            ),
            "MW",
            chart,
            "demanda_yearly",
        )
        .with_ticks(range)
        .with_csv_params([gerencia.as_param().to_string(), range.to_string()]);
        view.peak_hours = peak_hours;
        Ok(view)
    }

    /// Peak hourly demand from the real balance, full year against the previous one
    pub async fn real_demand_chart(&self, today: NaiveDate) -> Result<ChartView, MarketError> {
        let response = self.real_demand_yearly().await?;

        let current = to_observations(&response.current_year_data);
        let previous = to_observations(&response.previous_year_data);
        let (current_year, previous_year) = match &response.date_ranges {
            Some(ranges) => (
                range_year(&ranges.current_year.start).unwrap_or(year_of(&current, today.year())),
                range_year(&ranges.previous_year.start)
                    .unwrap_or(year_of(&previous, today.year() - 1)),
            ),
            None => (
                year_of(&current, today.year()),
                year_of(&previous, today.year() - 1),
            ),
        };

        let mut chart = compare_years(
            &YearComparison::new("SIN", current, previous),
            TimeRange::Full,
            today,
        );
        if let [cur, prev] = chart.series.as_mut_slice() {
            cur.name = format!("Demanda {}", current_year);
            prev.name = format!("Demanda {}", previous_year);
        }

        Ok(ChartView::new(
            format!("Demanda Máxima Horaria: {} vs {}", current_year, previous_year),
            "Demanda real balance, máximo horario por día".to_string(),
            "MWh",
            chart,
            "demanda_real_balance",
        )
        .with_ticks(TimeRange::Full))
    }

    /// Current-month daily PML, labelled "Día N"
    pub async fn pml_daily_chart(
        &self,
        market: Market,
        days: DayWindow,
        today: NaiveDate,
    ) -> Result<ChartView, MarketError> {
        let response = self.pml_month_over_month(market).await?;
        let observations = to_observations(&response.data.current_month_daily_averages);
        let chart = daily_chart(
            &format!("PML {}", market.as_str().to_uppercase()),
            &observations,
            days,
            today,
        );

        let trend = if response.data.trend == "positive" {
            "▲"
        } else {
            "▼"
        };
        Ok(ChartView::new(
            "PML diario del mes".to_string(),
            format!(
                "Promedio del mes {:.2} vs mes anterior {:.2} ({} {:.2}%)",
                response.data.current_month_overall_average,
                response.data.previous_month_average,
                trend,
                response.data.percentage_change.abs()
            ),
            "$/MWh",
            chart,
            "pml_daily",
        )
        .with_csv_params([market.to_string(), days.as_param()]))
    }

    pub async fn servicios_daily_chart(
        &self,
        market: Market,
        sistema: Sistema,
        days: DayWindow,
        today: NaiveDate,
    ) -> Result<ChartView, MarketError> {
        let response = self.servicios_daily_averages(market, sistema).await?;
        let observations: Vec<DailyObservation> = to_observations(&response.data);
        let chart = daily_chart("Servicios conexos", &observations, days, today);

        Ok(ChartView::new(
            format!(
                "Servicios conexos diario ({})",
                market.as_str().to_uppercase()
            ),
            format!("Precio promedio diario de reservas - {}", sistema),
            "$/MWh",
            chart,
            "servicios_daily",
        )
        .with_csv_params([market.to_string(), sistema.to_string(), days.as_param()]))
    }

    /// Distributed-node price per zone over the current month
    pub async fn pnd_zone_chart(
        &self,
        market: Market,
        days: DayWindow,
        today: NaiveDate,
    ) -> Result<ChartView, MarketError> {
        let response = self.pnd_daily_averages_by_zone(market).await?;
        let zone_days = to_zone_days(&response.data.averages_by_day);
        let chart = daily_chart_by_zone(&zone_days, &PND_ZONES, days, today);

        Ok(ChartView::new(
            format!("PND por zona ({})", market.as_str().to_uppercase()),
            "Promedio diario del mes por zona".to_string(),
            "$/MWh",
            chart,
            "pnd_daily_zones",
        )
        .with_csv_params([market.to_string(), days.as_param()]))
    }
}

fn range_year(start: &str) -> Option<i32> {
    parse_fecha(start).map(|d| d.year())
}

/// Hour of each plotted peak, parallel to the value chart. A slot is `None`
/// where the value itself is a gap or the backend sent no hour.
fn peak_hours(
    current: &[DemandPeakDay],
    previous: &[DemandPeakDay],
    chart: &AlignedChart,
) -> Vec<Vec<Option<u32>>> {
    let by_day = |rows: &[DemandPeakDay]| -> HashMap<MonthDay, u32> {
        let mut hours = HashMap::with_capacity(rows.len());
        for row in rows {
            if let (Some(date), Some(hora)) = (parse_fecha(&row.fecha), row.hora) {
                hours.entry(MonthDay::from_date(date)).or_insert(hora);
            }
        }
        hours
    };
    let lookups = [by_day(current), by_day(previous)];

    chart
        .series
        .iter()
        .zip(&lookups)
        .map(|(series, hours)| {
            chart
                .categories
                .iter()
                .zip(&series.data)
                .map(|(category, value)| value.and(hours.get(&category.key).copied()))
                .collect()
        })
        .collect()
}
