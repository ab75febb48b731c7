use askama::Template;
use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json},
    routing::get,
};
use chrono::{Local, NaiveDate};
use plotly::Scatter;
use plotly::common::{DashType, Line, Mode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::dashboard::{Dashboard, Direction, MetricChange, Widget};
use crate::export;
use crate::map::{self, MapHover, Region, RegionLookup, Tooltip};
use crate::market::analysis::{ChartKind, ChartRequest, ChartView};
use crate::market::regions::GERENCIAS;
use crate::market::{Market, MarketClient, MarketError, Sistema};
use crate::series::{AlignedChart, DayWindow, TimeRange};

#[derive(Clone)]
pub struct AppState {
    client: Arc<MarketClient>,
    /// Pinned reference date; the local date when unset
    today: Option<NaiveDate>,
}

impl AppState {
    pub fn new(client: MarketClient) -> Self {
        Self {
            client: Arc::new(client),
            today: None,
        }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn api_error(status: StatusCode, message: String) -> ApiError {
    (status, Json(ApiResponse::error(message)))
}

/// Upstream failures surface with the same message the widgets show
fn upstream_error(e: MarketError) -> ApiError {
    match e {
        MarketError::InvalidParameter(message) => api_error(StatusCode::BAD_REQUEST, message),
        e => {
            error!("market API error: {}", e);
            let message = match Widget::<()>::from_result(Err(e)) {
                Widget::Failed { message } => message,
                _ => String::new(),
            };
            api_error(StatusCode::BAD_GATEWAY, message)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuery {
    market: Option<String>,
    sistema: Option<String>,
    gerencia: Option<String>,
    reserve: Option<String>,
    range: Option<String>,
    days: Option<String>,
}

impl ChartQuery {
    fn params(&self) -> [(&'static str, &Option<String>); 6] {
        [
            ("market", &self.market),
            ("sistema", &self.sistema),
            ("gerencia", &self.gerencia),
            ("reserve", &self.reserve),
            ("range", &self.range),
            ("days", &self.days),
        ]
    }

    fn to_request(&self) -> Result<ChartRequest, ApiError> {
        let mut request = ChartRequest::default();

        if let Some(market) = &self.market {
            request.market = market.parse().map_err(bad_request)?;
        }
        if let Some(sistema) = &self.sistema {
            request.sistema = sistema.parse().map_err(bad_request)?;
        }
        if let Some(gerencia) = &self.gerencia {
            request.gerencia = gerencia.parse().map_err(bad_request)?;
        }
        if let Some(range) = &self.range {
            request.range = range.parse().map_err(bad_request)?;
        }
        if let Some(days) = &self.days {
            request.days = days.parse().map_err(bad_request)?;
        }
        request.reserve = self.reserve.clone().filter(|r| !r.is_empty());
        Ok(request)
    }
}

fn bad_request(e: impl fmt::Display) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, e.to_string())
}

fn chart_kind(slug: &str) -> Result<ChartKind, ApiError> {
    slug.parse()
        .map_err(|_| api_error(StatusCode::NOT_FOUND, format!("unknown chart: {slug}")))
}

async fn load_chart(state: &AppState, slug: &str, query: &ChartQuery) -> Result<ChartView, ApiError> {
    let kind = chart_kind(slug)?;
    let request = query.to_request()?;
    state
        .client
        .chart(kind, &request, state.today())
        .await
        .map_err(upstream_error)
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

/// GET /api/v1/dashboard
async fn get_dashboard(State(state): State<AppState>) -> Json<ApiResponse<Dashboard>> {
    let dashboard = Dashboard::load(&state.client, state.today()).await;
    Json(ApiResponse::success(dashboard))
}

/// GET /api/v1/charts/{chart}
async fn get_chart(
    State(state): State<AppState>,
    Path(chart): Path<String>,
    Query(query): Query<ChartQuery>,
) -> ApiResult<ChartView> {
    let view = load_chart(&state, &chart, &query).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// GET /api/v1/charts/{chart}/csv
async fn get_chart_csv(
    State(state): State<AppState>,
    Path(chart): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let view = load_chart(&state, &chart, &query).await?;

    let body = export::to_csv(&view.chart).map_err(|e| {
        error!("CSV export failed: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let params: Vec<&str> = view.csv_params.iter().map(String::as_str).collect();
    let filename = export::download_filename(view.csv_prefix, &params, state.today());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    ))
}

#[derive(Debug, Default, Deserialize)]
struct MapQuery {
    /// Region currently under the pointer
    hover: Option<String>,
}

#[derive(Debug, Serialize)]
struct MapRegion {
    region: Region,
    fill: &'static str,
    tooltip: Tooltip,
}

fn map_regions(lookup: &RegionLookup, hover: &MapHover) -> Vec<MapRegion> {
    lookup
        .tooltips()
        .into_iter()
        .map(|(region, tooltip)| MapRegion {
            fill: hover.fill(region.id),
            region,
            tooltip,
        })
        .collect()
}

fn hover_state(query: &MapQuery) -> MapHover {
    let mut hover = MapHover::default();
    if let Some(region) = query.hover.as_deref().and_then(map::get_region) {
        hover.enter(region.id, 0.0, 0.0);
    }
    hover
}

/// GET /api/v1/map/demanda
async fn get_demand_map(
    State(state): State<AppState>,
    Query(query): Query<MapQuery>,
) -> ApiResult<Vec<MapRegion>> {
    let data = state
        .client
        .hourly_demand_comparison()
        .await
        .map_err(upstream_error)?;
    let lookup = RegionLookup::from_comparison(&data);
    Ok(Json(ApiResponse::success(map_regions(
        &lookup,
        &hover_state(&query),
    ))))
}

/// GET /api/v1/map/demanda/{region}
async fn get_region_tooltip(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> ApiResult<Tooltip> {
    let region = map::get_region(&region)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("unknown region: {region}")))?;
    let data = state
        .client
        .hourly_demand_comparison()
        .await
        .map_err(upstream_error)?;
    Ok(Json(ApiResponse::success(
        RegionLookup::from_comparison(&data).tooltip(region.id),
    )))
}

#[derive(Template)]
#[template(path = "plot.html")]
struct PlotTemplate {
    title: String,
    subtitle: String,
    unit: String,
    data_points: usize,
    empty: bool,
    averages: Vec<String>,
    csv_url: String,
    filters: Vec<FilterGroup>,
    plot_data: String,
    plot_layout: String,
    overview_data: String,
    overview_layout: String,
}

struct FilterLink {
    label: String,
    url: String,
    active: bool,
}

/// One row of selector links on the chart page
struct FilterGroup {
    label: &'static str,
    links: Vec<FilterLink>,
}

fn traces(chart: &AlignedChart, width: f64) -> Vec<Box<Scatter<String, Option<f64>>>> {
    let labels: Vec<String> = chart.labels().into_iter().map(String::from).collect();

    chart
        .series
        .iter()
        .map(|series| {
            let line = Line::new().color(series.color).width(width);
            let line = if series.previous_year {
                line.dash(DashType::Dash)
            } else {
                line
            };
            Scatter::new(labels.clone(), series.data.clone())
                .name(series.name.as_str())
                .mode(Mode::Lines)
                .connect_gaps(false)
                .line(line)
        })
        .collect()
}

/// Plotly traces and layout of a chart. Previous-year lines are dashed;
/// gaps stay gaps.
fn generate_plot_data(view: &ChartView) -> Result<(String, String), serde_json::Error> {
    let traces = traces(&view.chart, 2.0);

    let mut xaxis = json!({
        "title": "Fecha",
        "tickangle": -45
    });
    if let Some(ticks) = view.tick_amount {
        xaxis["nticks"] = json!(ticks);
    }

    let layout = json!({
        "title": {
            "text": view.title,
            "font": {
                "size": 20
            }
        },
        "xaxis": xaxis,
        "yaxis": {
            "title": view.unit
        },
        "hovermode": "x unified",
        "plot_bgcolor": "rgb(250, 250, 250)",
        "paper_bgcolor": "white",
        "showlegend": true,
        "legend": {
            "orientation": "h",
            "x": 0.01,
            "y": 1.1
        }
    });

    Ok((serde_json::to_string(&traces)?, serde_json::to_string(&layout)?))
}

/// Thinned strip under the chart; zooming it sets the main chart's x range
fn generate_overview_data(view: &ChartView) -> Result<(String, String), serde_json::Error> {
    let traces = traces(&view.overview, 1.0);

    let layout = json!({
        "height": 130,
        "margin": {
            "t": 10,
            "b": 20,
            "l": 50,
            "r": 20
        },
        "xaxis": {
            "showticklabels": false
        },
        "yaxis": {
            "fixedrange": true,
            "showticklabels": false
        },
        "dragmode": "zoom",
        "showlegend": false,
        "plot_bgcolor": "rgb(250, 250, 250)",
        "paper_bgcolor": "white"
    });

    Ok((serde_json::to_string(&traces)?, serde_json::to_string(&layout)?))
}

/// `path` carrying the current query, with `set` replacing one of its keys
fn query_url(path: &str, query: &ChartQuery, set: Option<(&str, &str)>) -> String {
    let mut params: Vec<(&str, &str)> = query
        .params()
        .into_iter()
        .filter(|(key, _)| set.is_none_or(|(k, _)| k != *key))
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect();
    params.extend(set);

    match reqwest::Url::parse_with_params("http://localhost", &params) {
        Ok(url) => match url.query() {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path.to_string(),
        },
        Err(_) => path.to_string(),
    }
}

fn csv_url(slug: &str, query: &ChartQuery) -> String {
    query_url(&format!("/api/v1/charts/{slug}/csv"), query, None)
}

fn filter_group(
    label: &'static str,
    path: &str,
    query: &ChartQuery,
    key: &str,
    active: &str,
    options: Vec<(String, String)>,
) -> FilterGroup {
    let links = options
        .into_iter()
        .map(|(value, text)| FilterLink {
            url: query_url(path, query, Some((key, value.as_str()))),
            active: value == active,
            label: text,
        })
        .collect();
    FilterGroup { label, links }
}

/// Selectors that apply to a chart kind, each link keeping the rest of the query
fn filter_groups(
    kind: ChartKind,
    query: &ChartQuery,
    request: &ChartRequest,
    view: &ChartView,
) -> Vec<FilterGroup> {
    let path = format!("/charts/{}", kind.slug());
    let mut groups = Vec::new();

    if !matches!(kind, ChartKind::DemandYearly | ChartKind::RealDemand) {
        let options = [Market::Mda, Market::Mtr]
            .iter()
            .map(|m| (m.as_str().to_string(), m.as_str().to_uppercase()))
            .collect();
        groups.push(filter_group(
            "Mercado",
            &path,
            query,
            "market",
            request.market.as_str(),
            options,
        ));
    }

    if matches!(
        kind,
        ChartKind::PmlYearly
            | ChartKind::ServiciosYearly
            | ChartKind::ServiciosYearlyAll
            | ChartKind::ServiciosDaily
    ) {
        let options = [Sistema::Sin, Sistema::Bca, Sistema::Bcs]
            .iter()
            .map(|s| (s.as_str().to_string(), s.as_str().to_string()))
            .collect();
        groups.push(filter_group(
            "Sistema",
            &path,
            query,
            "sistema",
            request.sistema.as_str(),
            options,
        ));
    }

    if kind == ChartKind::DemandYearly {
        let options = std::iter::once(("all".to_string(), "Todas".to_string()))
            .chain(GERENCIAS.iter().map(|g| (g.name.to_string(), g.name.to_string())))
            .collect();
        groups.push(filter_group(
            "Gerencia",
            &path,
            query,
            "gerencia",
            request.gerencia.as_param(),
            options,
        ));
    }

    if kind == ChartKind::ServiciosYearly && !view.options.is_empty() {
        let active = request
            .reserve
            .as_deref()
            .or(view.options.first().map(String::as_str))
            .unwrap_or_default();
        let options = view.options.iter().map(|o| (o.clone(), o.clone())).collect();
        groups.push(filter_group("Reserva", &path, query, "reserve", active, options));
    }

    if kind.is_daily() {
        let options = DayWindow::OPTIONS
            .iter()
            .map(|w| (w.as_param(), w.label()))
            .collect();
        groups.push(filter_group(
            "Periodo",
            &path,
            query,
            "days",
            &request.days.as_param(),
            options,
        ));
    } else if kind != ChartKind::RealDemand {
        let options = TimeRange::OPTIONS
            .iter()
            .map(|r| (r.as_str().to_string(), r.label().to_string()))
            .collect();
        groups.push(filter_group(
            "Periodo",
            &path,
            query,
            "range",
            request.range.as_str(),
            options,
        ));
    }

    groups
}

fn series_averages(chart: &AlignedChart, averages: &[Option<f64>], unit: &str) -> Vec<String> {
    chart
        .series
        .iter()
        .zip(averages)
        .map(|(series, avg)| match avg {
            Some(v) => format!("{}: {:.2} {}", series.name, v, unit),
            None => format!("{}: sin datos", series.name),
        })
        .collect()
}

/// GET /charts/{chart}
async fn get_plot(
    State(state): State<AppState>,
    Path(chart): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let view = load_chart(&state, &chart, &query)
        .await
        .map_err(|(status, _)| status)?;
    let kind = chart_kind(&chart).map_err(|(status, _)| status)?;
    let request = query.to_request().map_err(|(status, _)| status)?;

    let serialized = generate_plot_data(&view)
        .and_then(|plot| generate_overview_data(&view).map(|overview| (plot, overview)));
    let ((plot_data, plot_layout), (overview_data, overview_layout)) =
        serialized.map_err(|e| {
            error!("plot serialization failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let template = PlotTemplate {
        data_points: view.chart.categories.len(),
        empty: view.is_empty(),
        averages: series_averages(&view.chart, &view.averages, view.unit),
        csv_url: csv_url(&chart, &query),
        filters: filter_groups(kind, &query, &request, &view),
        title: view.title,
        subtitle: view.subtitle,
        unit: view.unit.to_string(),
        plot_data,
        plot_layout,
        overview_data,
        overview_layout,
    };

    let html = template.render().map_err(|e| {
        error!("template rendering error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Html(html))
}

struct CardView {
    title: String,
    value: String,
    detail: String,
    badge: String,
    badge_up: bool,
    error: String,
}

impl CardView {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: "--".to_string(),
            detail: String::new(),
            badge: String::new(),
            badge_up: true,
            error: String::new(),
        }
    }

    fn change(mut self, change: &MetricChange) -> Self {
        self.badge = change.badge();
        self.badge_up = change.direction == Direction::Up;
        self
    }

    fn from_widget<T>(title: &str, widget: &Widget<T>, fill: impl FnOnce(Self, &T) -> Self) -> Self {
        let card = Self::new(title);
        match widget {
            Widget::Ready(data) => fill(card, data),
            Widget::Empty => Self {
                detail: "Sin datos".to_string(),
                ..card
            },
            Widget::Failed { message } => Self {
                error: message.clone(),
                ..card
            },
        }
    }
}

fn cards(dashboard: &Dashboard) -> Vec<CardView> {
    vec![
        CardView::from_widget("PML MDA", &dashboard.pml, |card, m| {
            CardView {
                value: format!("{:.2}", m.value),
                detail: m.fecha.clone(),
                ..card
            }
            .change(&m.change)
        }),
        CardView::from_widget("PND MDA", &dashboard.pnd, |card, m| {
            CardView {
                value: format!("{:.2}", m.value),
                detail: m.fecha.clone(),
                ..card
            }
            .change(&m.change)
        }),
        CardView::from_widget("Máximo anual de demanda", &dashboard.demand_peak, |card, p| {
            CardView {
                value: format!("{:.0} MW", p.current.peak_mw),
                detail: format!(
                    "{} a las {} vs {:.0} MW en {}",
                    p.current.fecha, p.current.hora, p.previous.peak_mw, p.previous.year
                ),
                ..card
            }
            .change(&p.change)
        }),
        CardView::from_widget(
            "Servicios conexos, promedio del mes",
            &dashboard.reserve_average,
            |card, r| CardView {
                value: format!("{:.2} $/MWh", r.average_price),
                detail: format!("{} a {} ({} {})", r.start_date, r.end_date, r.market, r.sistema),
                ..card
            },
        ),
        CardView::from_widget("PML extremos del mes", &dashboard.pml_extremes, |card, e| {
            CardView {
                value: format!("{:.2} / {:.2}", e.max.precio, e.min.precio),
                detail: format!(
                    "Máx {} {:02}:00 ({}), mín {} {:02}:00 ({})",
                    e.max.fecha, e.max.hora, e.max.sistema, e.min.fecha, e.min.hora, e.min.sistema
                ),
                ..card
            }
        }),
        CardView::from_widget("PML mensual", &dashboard.monthly_pml, |card, points| {
            match points.last() {
                Some(last) => CardView {
                    value: format!("{:.2}", last.value),
                    detail: last.label.clone(),
                    ..card
                },
                None => card,
            }
        }),
        CardView::from_widget("Demanda SIN", &dashboard.regions, |card, r| CardView {
            value: format!("{:.2} MWh", r.sin_total),
            detail: format!("{} vs semana anterior {}", r.latest_date, r.previous_week_date),
            ..card
        }),
        CardView::from_widget("Capacidad de transferencia", &dashboard.transfer_capacity, |card, rows| {
            CardView {
                value: format!(
                    "{} enlaces al {}",
                    rows.len(),
                    rows.first().map(|r| r.fecha.as_str()).unwrap_or_default()
                ),
                detail: rows
                    .iter()
                    .map(|r| format!("{}: {:.0}/{:.0}", r.origin, r.importacion, r.exportacion))
                    .collect::<Vec<_>>()
                    .join(", "),
                ..card
            }
        }),
        CardView::from_widget("Mediciones", &dashboard.mediciones, |card, m| CardView {
            value: format!("{:.2} MW", m.total_mw),
            detail: format!("{} registros al {}", m.count, m.latest),
            ..card
        }),
    ]
}

struct RegionView {
    name: String,
    fill: &'static str,
    summary: String,
}

fn region_views(dashboard: &Dashboard, hover: &MapHover) -> Vec<RegionView> {
    let Some(demand) = dashboard.regions.ready() else {
        return Vec::new();
    };
    demand
        .tooltips
        .iter()
        .map(|(region, tooltip)| RegionView {
            name: region.name.to_string(),
            fill: hover.fill(region.id),
            summary: match tooltip {
                Tooltip::Data {
                    today_average,
                    previous_week_average,
                    maximum,
                    minimum,
                    trend,
                    ..
                } => {
                    let mut text = format!(
                        "Promedio hoy {:.2} MWh, máx {:.2}, mín {:.2}",
                        today_average, maximum, minimum
                    );
                    if let Some(prev) = previous_week_average {
                        text.push_str(&format!(", -7 días {:.2} MWh", prev));
                    }
                    text.push_str(match trend {
                        map::Trend::Up => " ▲",
                        map::Trend::Down => " ▼",
                    });
                    text
                }
                Tooltip::NoData { .. } => "Sin datos".to_string(),
            },
        })
        .collect()
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    today: String,
    cards: Vec<CardView>,
    regions: Vec<RegionView>,
    charts: Vec<(String, String)>,
}

/// GET /
async fn home(
    State(state): State<AppState>,
    Query(query): Query<MapQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let today = state.today();
    let dashboard = Dashboard::load(&state.client, today).await;

    let template = DashboardTemplate {
        today: today.format("%Y-%m-%d").to_string(),
        cards: cards(&dashboard),
        regions: region_views(&dashboard, &hover_state(&query)),
        charts: ChartKind::ALL
            .iter()
            .map(|k| (k.slug().to_string(), k.title().to_string()))
            .collect(),
    };

    let html = template.render().map_err(|e| {
        error!("template rendering error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Html(html))
}

async fn not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not found".to_string())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/api/v1/dashboard", get(get_dashboard))
        .route("/api/v1/charts/{chart}", get(get_chart))
        .route("/api/v1/charts/{chart}/csv", get(get_chart_csv))
        .route("/charts/{chart}", get(get_plot))
        .route("/api/v1/map/demanda", get(get_demand_map))
        .route("/api/v1/map/demanda/{region}", get(get_region_tooltip))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(client: MarketClient, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(AppState::new(client));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("server running on http://{}", addr);
    info!("charts: {}", ChartKind::ALL.map(|k| k.slug()).join(", "));

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::testing::spawn_backend;

    const PML_YEARLY: &str = r#"{
        "status": "success",
        "data": {
            "sistema": "SIN",
            "currentYearData": [
                {"Fecha": "2025-01-01", "AvgPML": 10.0},
                {"Fecha": "2025-01-02", "AvgPML": 20.0}
            ],
            "previousYearData": []
        }
    }"#;

    const DEMAND_MAP: &str = r#"{
        "latest_date": "2025-10-15",
        "previous_week_date": "2025-10-08",
        "latest_day_records": [
            {"Fecha": "2025-10-15", "Gerencia": "NORTE", "Maximo_Demanda": 5200.0,
             "Minimo_Demanda": 3100.0, "Promedio_Demanda": 4100.0}
        ],
        "previous_week_day_records": [
            {"Fecha": "2025-10-08", "Gerencia": "NORTE", "Maximo_Demanda": 5000.0,
             "Minimo_Demanda": 3000.0, "Promedio_Demanda": 4300.0}
        ]
    }"#;

    /// Serve the app on an ephemeral port against a stub backend
    async fn spawn_app(routes: Vec<(&'static str, &'static str)>) -> String {
        let backend = spawn_backend(routes).await;
        let state = AppState {
            client: Arc::new(MarketClient::new(backend)),
            today: NaiveDate::from_ymd_opt(2025, 10, 16),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn fetch(url: String) -> (u16, String) {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = spawn_app(vec![]).await;
        assert_eq!(fetch(format!("{app}/health")).await, (200, "OK".to_string()));
    }

    #[tokio::test]
    async fn test_chart_json() {
        let app = spawn_app(vec![("/api/v1/pml/yearly-comparison-by-system", PML_YEARLY)]).await;
        let (status, body) = fetch(format!("{app}/api/v1/charts/pml-yearly?sistema=sin&range=full")).await;
        assert_eq!(status, 200);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["chart"]["categories"][1]["label"], "Ene 2");
        assert_eq!(json["data"]["chart"]["series"][0]["data"], json!([10.0, 20.0]));
        assert_eq!(json["data"]["chart"]["series"][1]["data"], json!([null, null]));
    }

    #[tokio::test]
    async fn test_bad_query_is_400() {
        let app = spawn_app(vec![]).await;
        let (status, _) = fetch(format!("{app}/api/v1/charts/pml-yearly?range=2y")).await;
        assert_eq!(status, 400);
        let (status, _) = fetch(format!("{app}/api/v1/charts/pml-yearly?sistema=XX")).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_unknown_chart_is_404() {
        let app = spawn_app(vec![]).await;
        let (status, _) = fetch(format!("{app}/api/v1/charts/pie")).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_502_with_envelope() {
        let app = spawn_app(vec![]).await;
        let (status, body) = fetch(format!("{app}/api/v1/charts/real-demand")).await;
        assert_eq!(status, 502);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .starts_with("Error cargando datos:")
        );
    }

    #[tokio::test]
    async fn test_csv_download() {
        let app = spawn_app(vec![("/api/v1/pml/yearly-comparison-by-system", PML_YEARLY)]).await;
        let response = reqwest::get(format!("{app}/api/v1/charts/pml-yearly/csv"))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(
            disposition,
            "attachment; filename=\"pml_yearly_mda_SIN_full_2025-10-16.csv\""
        );
        assert_eq!(
            response.text().await.unwrap(),
            "\"Date\",\"2025\",\"2024\"\n\"Ene 1\",10,\"\"\n\"Ene 2\",20,\"\""
        );
    }

    #[tokio::test]
    async fn test_plot_page() {
        let app = spawn_app(vec![("/api/v1/pml/yearly-comparison-by-system", PML_YEARLY)]).await;
        let (status, html) = fetch(format!("{app}/charts/pml-yearly?market=mtr")).await;
        assert_eq!(status, 200);
        assert!(html.contains("Promedio Diario PML: 2025 vs 2024 (MTR)"));
        assert!(html.contains("/api/v1/charts/pml-yearly/csv?market=mtr"));
    }

    #[tokio::test]
    async fn test_plot_filters_keep_query() {
        let app = spawn_app(vec![("/api/v1/pml/yearly-comparison-by-system", PML_YEARLY)]).await;
        let (status, html) = fetch(format!("{app}/charts/pml-yearly?market=mtr&sistema=BCA")).await;
        assert_eq!(status, 200);
        assert!(html.contains("href=\"/charts/pml-yearly?market=mtr&sistema=BCA&range=3m\""));
        assert!(html.contains("href=\"/charts/pml-yearly?sistema=BCA&market=mda\""));
        assert!(html.contains("href=\"/charts/pml-yearly?market=mtr&sistema=BCS\""));
        assert!(html.contains("class=\"active\">MTR</a>"));
        assert!(html.contains("id=\"overview\""));
    }

    #[tokio::test]
    async fn test_daily_plot_offers_day_windows() {
        let app = spawn_app(vec![(
            "/api/v1/pml/comparison/month-over-month",
            r#"{"status": "success", "data": {
                "current_month_overall_average": 1000.0,
                "previous_month_average": 950.0,
                "percentage_change": 5.0,
                "trend": "positive",
                "current_month_daily_averages": [{"date": "2025-10-01", "average_pml": 1000.0}]
            }}"#,
        )])
        .await;
        let (status, html) = fetch(format!("{app}/charts/pml-daily?market=mtr&days=7d")).await;
        assert_eq!(status, 200);
        assert!(html.contains("Últimos 7 días"));
        assert!(html.contains("href=\"/charts/pml-daily?market=mtr&days=15d\""));
        assert!(html.contains("class=\"active\">Últimos 7 días</a>"));
        assert!(!html.contains("?range=") && !html.contains("&range="));
    }

    #[tokio::test]
    async fn test_reserve_selector_follows_backend_order() {
        let app = spawn_app(vec![(
            "/api/v1/servicios-conexos/yearly-comparison-by-system",
            r#"{"status": "success", "data": {"comparison": {
                "Reserva rodante 10 min": {"currentYearData": [], "previousYearData": []},
                "Reserva no rodante": {"currentYearData": [], "previousYearData": []}
            }}}"#,
        )])
        .await;
        let (status, html) = fetch(format!("{app}/charts/servicios-yearly?sistema=BCA")).await;
        assert_eq!(status, 200);

        let rodante = html
            .find("href=\"/charts/servicios-yearly?sistema=BCA&reserve=Reserva+rodante+10+min\" class=\"active\"")
            .unwrap();
        let no_rodante = html
            .find("href=\"/charts/servicios-yearly?sistema=BCA&reserve=Reserva+no+rodante\"")
            .unwrap();
        assert!(rodante < no_rodante);
    }

    #[tokio::test]
    async fn test_demand_map() {
        let app = spawn_app(vec![("/api/v1/demanda/demanda_comparison", DEMAND_MAP)]).await;

        let (status, body) = fetch(format!("{app}/api/v1/map/demanda/norte")).await;
        assert_eq!(status, 200);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["data"]["kind"], "data");
        assert_eq!(json["data"]["previous_week_average"], 4300.0);
        assert_eq!(json["data"]["trend"], "down");

        let (_, body) = fetch(format!("{app}/api/v1/map/demanda?hover=NORTE")).await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let regions = json["data"].as_array().unwrap();
        assert_eq!(regions.len(), 9);
        let norte = regions
            .iter()
            .find(|r| r["region"]["id"] == "NORTE")
            .unwrap();
        assert_eq!(norte["fill"], map::HOVER_FILL);

        let (status, _) = fetch(format!("{app}/api/v1/map/demanda/atlantida")).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn test_home_renders_with_failing_widgets() {
        let app = spawn_app(vec![("/api/v1/demanda/demanda_comparison", DEMAND_MAP)]).await;
        let (status, html) = fetch(format!("{app}/")).await;
        assert_eq!(status, 200);
        assert!(html.contains("Error cargando datos"));
        assert!(html.contains("4100.00 MWh"));
        assert!(html.contains("2025-10-15 vs semana anterior 2025-10-08"));
    }
}
