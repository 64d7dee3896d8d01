//! Core data types for IP geolocation enrichment.
//!
//! This module defines the record shape written to the output table, the
//! decoded service response and the configuration for an enrichment run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// In-band marker meaning "lookup failed".
pub const ERROR_SENTINEL: &str = "Error";

/// Value used when the service answered but omitted a field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Output header row, in column order.
pub const OUTPUT_HEADERS: [&str; 5] = ["IP Address", "ISP", "City", "Region", "Postal Code"];

/// Default destination for the enriched table.
pub const DEFAULT_OUTPUT_PATH: &str = "Output/ip_geolocation.xlsx";

/// Default lookup service root.
pub const DEFAULT_BASE_URL: &str = "https://ipinfo.io";

/// Default number of lookups in flight.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Geolocation result for one address.
///
/// Every field is always populated: real values, `"N/A"` for fields the
/// service omitted, or `"Error"` in all four derived fields when the lookup
/// failed. The address is always the one that was looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub address: String,
    pub isp: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
}

impl GeoRecord {
    /// Collapse a successful service response into a record.
    pub fn from_details(address: impl Into<String>, details: GeoDetails) -> Self {
        let or_na = |value: Option<String>| value.unwrap_or_else(|| NOT_AVAILABLE.to_string());

        Self {
            address: address.into(),
            isp: or_na(details.org),
            city: or_na(details.city),
            region: or_na(details.region),
            postal_code: or_na(details.postal),
        }
    }

    /// Record for an address whose lookup failed.
    pub fn error(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            isp: ERROR_SENTINEL.to_string(),
            city: ERROR_SENTINEL.to_string(),
            region: ERROR_SENTINEL.to_string(),
            postal_code: ERROR_SENTINEL.to_string(),
        }
    }

    /// Whether this record stands for a failed lookup.
    pub fn is_error(&self) -> bool {
        [&self.isp, &self.city, &self.region, &self.postal_code]
            .iter()
            .all(|field| field.as_str() == ERROR_SENTINEL)
    }

    /// Row cells in output column order.
    pub fn as_row(&self) -> [&str; 5] {
        [
            &self.address,
            &self.isp,
            &self.city,
            &self.region,
            &self.postal_code,
        ]
    }
}

/// Fields we read from the lookup service response.
///
/// The service returns more (hostname, loc, timezone, ...); anything not
/// listed here is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal: Option<String>,
}

/// Order in which enriched records are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputOrder {
    /// First finished, first collected
    #[default]
    Completion,

    /// Same order as the extracted addresses
    Input,
}

impl std::str::FromStr for OutputOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completion" => Ok(Self::Completion),
            "input" => Ok(Self::Input),
            other => Err(format!(
                "unknown output order '{}', use 'completion' or 'input'",
                other
            )),
        }
    }
}

impl std::fmt::Display for OutputOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputOrder::Completion => write!(f, "completion"),
            OutputOrder::Input => write!(f, "input"),
        }
    }
}

/// Settings for the lookup client and the enricher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Maximum number of lookups in flight
    /// Default: 100, at least 1
    pub concurrency: usize,

    /// Timeout for each individual lookup request
    /// Default: 10 seconds
    #[serde(skip, default = "default_timeout")]
    pub timeout: Duration,

    /// Service root, the address and `/json` are appended as path segments
    pub base_url: String,

    /// Emission order of the enriched records
    pub order: OutputOrder,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            base_url: DEFAULT_BASE_URL.to_string(),
            order: OutputOrder::Completion,
        }
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl EnrichConfig {
    /// Set concurrency; zero is raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point the client at a different service root.
    pub fn with_base_url<U: Into<String>>(mut self, base_url: U) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Choose the emission order.
    pub fn with_order(mut self, order: OutputOrder) -> Self {
        self.order = order;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default_to_not_available() {
        let details: GeoDetails =
            serde_json::from_str(r#"{"ip":"8.8.8.8","org":"AS15169 Google LLC","city":"Mountain View"}"#)
                .unwrap();
        let record = GeoRecord::from_details("8.8.8.8", details);

        assert_eq!(record.isp, "AS15169 Google LLC");
        assert_eq!(record.city, "Mountain View");
        assert_eq!(record.region, NOT_AVAILABLE);
        assert_eq!(record.postal_code, NOT_AVAILABLE);
        assert!(!record.is_error());
    }

    #[test]
    fn test_error_record_keeps_address() {
        let record = GeoRecord::error("2001:4860:4860::8888");
        assert_eq!(record.address, "2001:4860:4860::8888");
        assert!(record.is_error());
        assert_eq!(
            record.as_row(),
            ["2001:4860:4860::8888", "Error", "Error", "Error", "Error"]
        );
    }

    #[test]
    fn test_partial_error_values_are_not_an_error_record() {
        let details = GeoDetails {
            org: Some(ERROR_SENTINEL.to_string()),
            ..Default::default()
        };
        assert!(!GeoRecord::from_details("1.1.1.1", details).is_error());
    }

    #[test]
    fn test_concurrency_override() {
        assert_eq!(EnrichConfig::default().concurrency, 100);
        assert_eq!(EnrichConfig::default().with_concurrency(0).concurrency, 1);
        assert_eq!(EnrichConfig::default().with_concurrency(2).concurrency, 2);
        assert_eq!(EnrichConfig::default().with_concurrency(250).concurrency, 250);
    }

    #[test]
    fn test_deserialized_config_keeps_default_timeout() {
        let config: EnrichConfig = serde_json::from_str(
            r#"{"concurrency":5,"base_url":"http://localhost:9000","order":"input"}"#,
        )
        .unwrap();

        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.order, OutputOrder::Input);
    }

    #[test]
    fn test_output_order_parsing() {
        assert_eq!("input".parse::<OutputOrder>(), Ok(OutputOrder::Input));
        assert_eq!(
            " Completion ".parse::<OutputOrder>(),
            Ok(OutputOrder::Completion)
        );
        assert!("sorted".parse::<OutputOrder>().is_err());
    }
}
