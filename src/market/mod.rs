pub mod analysis;
pub mod regions;
pub mod responses;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error};

pub use regions::{GerenciaFilter, Market, Sistema};
use responses::*;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Read-only client of the market REST API
pub struct MarketClient {
    client: Client,
    base_url: String,
}

impl MarketClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, MarketError> {
        let raw = format!("{}{}", self.base_url, path);
        let parsed = if params.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, params)
        };
        parsed.map_err(|e| MarketError::InvalidUrl(format!("{raw}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, MarketError> {
        let url = self.endpoint_url(path, params)?;
        debug!(%url, "fetching");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!(endpoint = path, status = status.as_u16(), "market API error");
            return Err(MarketError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(endpoint = path, "failed to parse response: {}", e);
            MarketError::Json(e)
        })
    }

    /// Daily average PML of the current and previous year for one system
    pub async fn pml_yearly_comparison(
        &self,
        market: Market,
        sistema: Sistema,
    ) -> Result<PmlYearlyResponse, MarketError> {
        self.get_json(
            "/api/v1/pml/yearly-comparison-by-system",
            &[("market", market.as_str()), ("sistema", sistema.as_str())],
        )
        .await
    }

    /// Daily average reserve price per reserve type, current vs previous year
    pub async fn servicios_yearly_comparison(
        &self,
        market: Market,
        sistema: Sistema,
    ) -> Result<ServiciosYearlyResponse, MarketError> {
        self.get_json(
            "/api/v1/servicios-conexos/yearly-comparison-by-system",
            &[("market", market.as_str()), ("sistema", sistema.as_str())],
        )
        .await
    }

    /// Daily peak demand with its hour, current vs previous year
    pub async fn demand_daily_peak_comparison(
        &self,
        gerencia: &GerenciaFilter,
    ) -> Result<DemandPeakComparisonResponse, MarketError> {
        self.get_json(
            "/api/v1/demanda/daily-peak-comparison",
            &[("gerencia", gerencia.as_param())],
        )
        .await
    }

    pub async fn real_demand_yearly(&self) -> Result<RealDemandResponse, MarketError> {
        self.get_json(
            "/api/v1/demanda_real_balance/yearly_peak_demand_comparison",
            &[],
        )
        .await
    }

    pub async fn pml_month_over_month(
        &self,
        market: Market,
    ) -> Result<PmlMonthOverMonthResponse, MarketError> {
        self.get_json(
            "/api/v1/pml/comparison/month-over-month",
            &[("market", market.as_str())],
        )
        .await
    }

    pub async fn servicios_daily_averages(
        &self,
        market: Market,
        sistema: Sistema,
    ) -> Result<ServiciosDailyResponse, MarketError> {
        self.get_json(
            "/api/v1/servicios-conexos/daily-averages",
            &[("market", market.as_str()), ("sistema", sistema.as_str())],
        )
        .await
    }

    pub async fn pnd_daily_averages_by_zone(
        &self,
        market: Market,
    ) -> Result<PndZonesResponse, MarketError> {
        self.get_json(
            "/api/v1/pnd/current-month-daily-averages-by-zonas",
            &[("market", market.as_str())],
        )
        .await
    }

    pub async fn servicios_current_month_average(
        &self,
        market: Market,
        sistema: Sistema,
    ) -> Result<ServiciosAverageResponse, MarketError> {
        self.get_json(
            "/api/v1/servicios-conexos/current-month-average",
            &[("market", market.as_str()), ("sistema", sistema.as_str())],
        )
        .await
    }

    pub async fn demand_absolute_peak_comparison(
        &self,
    ) -> Result<AbsolutePeakResponse, MarketError> {
        self.get_json("/api/v1/demanda-real-balance/absolute-peak-comparison", &[])
            .await
    }

    pub async fn pml_current_month_extremes(
        &self,
        market: Market,
    ) -> Result<PmlExtremesResponse, MarketError> {
        self.get_json(
            "/api/v1/pml/current-month-extremes",
            &[("market", market.as_str())],
        )
        .await
    }

    /// Latest daily PML averages, newest first
    pub async fn latest_average_pml_mda(&self) -> Result<Vec<LatestPml>, MarketError> {
        self.get_json("/api/v1/mda_mtr/latest_average_pml_mda", &[])
            .await
    }

    /// Latest daily PND averages, newest first
    pub async fn latest_average_pnd_mda(&self) -> Result<Vec<LatestPnd>, MarketError> {
        self.get_json("/api/v1/mda_mtr/latest_average_pnd_mda", &[])
            .await
    }

    pub async fn monthly_average_pml_mda(&self) -> Result<Vec<MonthlyAveragePml>, MarketError> {
        self.get_json("/api/v1/mda_mtr/monthly_average_pml_mda", &[])
            .await
    }

    pub async fn transfer_capacity(&self) -> Result<TransferCapacityResponse, MarketError> {
        self.get_json(
            "/api/v1/capacidad_transferencia/capacidad_transferencia_by_day_ahead",
            &[],
        )
        .await
    }

    pub async fn hourly_demand_comparison(&self) -> Result<HourlyDemandComparison, MarketError> {
        self.get_json("/api/v1/demanda/demanda_comparison", &[])
            .await
    }

    pub async fn latest_mediciones(&self) -> Result<MedicionesResponse, MarketError> {
        self.get_json("/api/v1/mediciones/mediciones_overview", &[])
            .await
    }
}
