use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::MarketError;

/// Settlement market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Day-ahead market
    #[default]
    Mda,
    /// Real-time market
    Mtr,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Mda => "mda",
            Market::Mtr => "mtr",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mda" => Ok(Market::Mda),
            "mtr" => Ok(Market::Mtr),
            _ => Err(MarketError::InvalidParameter(format!("market {s}"))),
        }
    }
}

/// One of the three interconnected grids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sistema {
    #[default]
    Sin,
    Bca,
    Bcs,
}

impl Sistema {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sistema::Sin => "SIN",
            Sistema::Bca => "BCA",
            Sistema::Bcs => "BCS",
        }
    }
}

impl fmt::Display for Sistema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sistema {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SIN" => Ok(Sistema::Sin),
            "BCA" => Ok(Sistema::Bca),
            "BCS" => Ok(Sistema::Bcs),
            _ => Err(MarketError::InvalidParameter(format!("sistema {s}"))),
        }
    }
}

/// A regional management zone used for demand reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gerencia {
    /// Upper-cased key used by the map and by the demand records
    pub id: &'static str,
    pub name: &'static str,
    pub sistema: Sistema,
}

impl Gerencia {
    pub const fn new(id: &'static str, name: &'static str, sistema: Sistema) -> Self {
        Self { id, name, sistema }
    }
}

impl fmt::Display for Gerencia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.sistema)
    }
}

/// All gerencias, in the order the demand filter lists them
pub static GERENCIAS: Lazy<Vec<Gerencia>> = Lazy::new(|| {
    vec![
        Gerencia::new("BAJA CALIFORNIA", "Baja California", Sistema::Bca),
        Gerencia::new("BAJA CALIFORNIA SUR", "Baja California Sur", Sistema::Bcs),
        Gerencia::new("OCCIDENTAL", "Occidental", Sistema::Sin),
        Gerencia::new("ORIENTAL", "Oriental", Sistema::Sin),
        Gerencia::new("NORESTE", "Noreste", Sistema::Sin),
        Gerencia::new("NORTE", "Norte", Sistema::Sin),
        Gerencia::new("NOROESTE", "Noroeste", Sistema::Sin),
        Gerencia::new("CENTRAL", "Central", Sistema::Sin),
        Gerencia::new("PENINSULAR", "Peninsular", Sistema::Sin),
    ]
});

static GERENCIAS_BY_ID: Lazy<HashMap<&'static str, &'static Gerencia>> =
    Lazy::new(|| GERENCIAS.iter().map(|g| (g.id, g)).collect());

/// Look up a gerencia by display name or id, case-insensitively
pub fn get_gerencia(name: &str) -> Option<&'static Gerencia> {
    GERENCIAS_BY_ID
        .get(name.trim().to_uppercase().as_str())
        .copied()
}

/// Demand filter: every gerencia, or a single one
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GerenciaFilter {
    #[default]
    All,
    One(&'static Gerencia),
}

impl GerenciaFilter {
    /// Value sent as the `gerencia` query parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            GerenciaFilter::All => "all",
            GerenciaFilter::One(g) => g.name,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GerenciaFilter::All => "Todas",
            GerenciaFilter::One(g) => g.name,
        }
    }
}

impl FromStr for GerenciaFilter {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(GerenciaFilter::All);
        }
        get_gerencia(s)
            .map(GerenciaFilter::One)
            .ok_or_else(|| MarketError::InvalidParameter(format!("gerencia {s}")))
    }
}

/// Zones reported by the distributed-node price endpoint, in chart order
pub const PND_ZONES: [&str; 8] = [
    "CABORCA",
    "TAMPICO",
    "RIVIERA MAYA",
    "MOTUL TIZIMIN",
    "JUAREZ",
    "QUERETARO",
    "PUEBLA",
    "VDM NORTE",
];
