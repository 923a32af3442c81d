//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use common::TenantId;
use saga::StockGatewayConfig;
use sequence::{DocumentType, SequenceKey};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` : bind address (default: `"0.0.0.0"`)
/// - `PORT` : listen port (default: `8080`)
/// - `RUST_LOG` : tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` : Postgres connection string; in-memory stores when unset
/// - `DATABASE_MAX_CONNECTIONS` : pool size (default: `10`)
/// - `STOCK_GATEWAY_URL` : API gateway in front of the stock service (default: `"http://kong:8000"`)
/// - `STOCK_SERVICE_PATH` : stock service route prefix (default: `"/stock"`)
/// - `STOCK_TIMEOUT_SECS` : per-call ceiling for stock calls (default: `10`)
/// - `SEQUENCE_SEEDS` : sequences to provision at startup, as comma-separated
///   `tenant:DOCUMENT_TYPE[:start]` entries (default: none)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub stock: StockGatewayConfig,
    pub sequence_seeds: Vec<SequenceSeed>,
}

/// A sequence row to create at startup if it does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSeed {
    pub key: SequenceKey,
    pub start: i64,
}

impl SequenceSeed {
    /// Parses one `tenant:DOCUMENT_TYPE[:start]` entry.
    pub fn parse(entry: &str) -> Option<Self> {
        let mut parts = entry.trim().splitn(3, ':');
        let tenant_id = TenantId::new(parts.next()?.trim()).ok()?;
        let document_type = DocumentType::new(parts.next()?.trim()).ok()?;
        let start = match parts.next() {
            Some(start) => start.trim().parse().ok().filter(|start: &i64| *start >= 0)?,
            None => 0,
        };
        Some(Self {
            key: SequenceKey::new(tenant_id, document_type),
            start,
        })
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            stock: StockGatewayConfig {
                gateway_url: lookup("STOCK_GATEWAY_URL").unwrap_or(defaults.stock.gateway_url),
                service_path: lookup("STOCK_SERVICE_PATH").unwrap_or(defaults.stock.service_path),
                timeout: parse_var(&lookup, "STOCK_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.stock.timeout),
            },
            sequence_seeds: lookup("SEQUENCE_SEEDS")
                .map(|seeds| seeds.split(',').filter_map(SequenceSeed::parse).collect())
                .unwrap_or_default(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            stock: StockGatewayConfig::default(),
            sequence_seeds: Vec::new(),
        }
    }
}
