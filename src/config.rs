use anyhow::{Context, Result, bail};
use std::net::SocketAddr;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3044";
pub const DEFAULT_LOG: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the market REST API, without trailing slash
    pub api_url: String,
    pub bind_addr: SocketAddr,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("MEMDASH_API_URL").context("MEMDASH_API_URL is not set")?;
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            bail!("MEMDASH_API_URL is empty");
        }

        let bind = lookup("MEMDASH_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .with_context(|| format!("invalid MEMDASH_BIND_ADDR: {bind}"))?;

        Ok(Self {
            api_url,
            bind_addr,
            log_level: lookup("MEMDASH_LOG").unwrap_or_else(|| DEFAULT_LOG.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("MEMDASH_API_URL", "http://localhost:8000/")]).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_api_url_required() {
        assert!(load(&[]).is_err());
        assert!(load(&[("MEMDASH_API_URL", " / ")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("MEMDASH_API_URL", "https://api.example.mx"),
            ("MEMDASH_BIND_ADDR", "127.0.0.1:8080"),
            ("MEMDASH_LOG", "memdash=debug"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.log_level, "memdash=debug");
        assert!(load(&[("MEMDASH_API_URL", "http://x"), ("MEMDASH_BIND_ADDR", "nope")]).is_err());
    }
}
