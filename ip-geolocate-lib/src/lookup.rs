//! Geolocation lookups.
//!
//! `GeoLookup` is the seam between the enricher and whatever answers
//! geolocation queries. Implementors only provide `fetch`; `lookup` turns its
//! outcome into a record of fixed shape so a failed address still produces a
//! row.

use crate::error::GeoEnrichError;
use crate::types::{EnrichConfig, GeoDetails, GeoRecord};
use reqwest::{StatusCode, Url};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of geolocation data for a single address.
pub trait GeoLookup: Send + Sync {
    /// Query the service for one address.
    fn fetch(&self, address: &str)
        -> impl Future<Output = Result<GeoDetails, GeoEnrichError>> + Send;

    /// Look up one address, folding any failure into an `"Error"` record.
    ///
    /// Never fails and never panics on service errors; the address is
    /// preserved in either case.
    fn lookup(&self, address: &str) -> impl Future<Output = GeoRecord> + Send {
        async move {
            match self.fetch(address).await {
                Ok(details) => {
                    debug!(address, "lookup succeeded");
                    GeoRecord::from_details(address, details)
                }
                Err(e) => {
                    if e.is_rate_limited() {
                        warn!(address, error = %e, "lookup rate limited by service");
                    } else {
                        info!(address, error = %e, "lookup failed");
                    }
                    GeoRecord::error(address)
                }
            }
        }
    }
}

/// HTTP client for the ipinfo.io JSON API.
///
/// Issues `GET {base_url}/{address}/json?token={api_key}` per address.
#[derive(Clone)]
pub struct IpInfoClient {
    /// HTTP client shared by all lookups
    http_client: reqwest::Client,
    /// Service root the address is appended to
    base_url: Url,
    /// Access token sent with every request
    api_key: String,
    /// Per-request timeout
    timeout: Duration,
}

impl std::fmt::Debug for IpInfoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpInfoClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl IpInfoClient {
    /// Create a client for the default service with default settings.
    pub fn new<K: Into<String>>(api_key: K) -> Result<Self, GeoEnrichError> {
        Self::with_config(api_key, &EnrichConfig::default())
    }

    /// Create a client using the base URL and timeout from `config`.
    pub fn with_config<K: Into<String>>(
        api_key: K,
        config: &EnrichConfig,
    ) -> Result<Self, GeoEnrichError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GeoEnrichError::config(format!("Invalid service URL '{}': {}", config.base_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(GeoEnrichError::config(format!(
                "Service URL '{}' cannot have path segments appended",
                config.base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("ip-geolocate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GeoEnrichError::network_with_source("Failed to create HTTP client", e.to_string())
            })?;

        Ok(Self {
            http_client,
            base_url,
            api_key: api_key.into(),
            timeout: config.timeout,
        })
    }

    /// Build the request URL for one address.
    ///
    /// The address is a single, percent-encoded path segment, so stray
    /// characters in a cell cannot change the endpoint.
    pub fn request_url(&self, address: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(address).push("json");
        }
        url.query_pairs_mut().append_pair("token", &self.api_key);
        url
    }

    async fn request(&self, address: &str) -> Result<GeoDetails, GeoEnrichError> {
        let url = self.request_url(address);

        let response = self.http_client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                GeoEnrichError::timeout(format!("lookup of {}", address), self.timeout)
            } else {
                GeoEnrichError::from(e)
            }
        })?;

        let status = response.status();
        debug!(address, %status, "lookup response");

        if !status.is_success() {
            let message = match status {
                StatusCode::TOO_MANY_REQUESTS => "rate limit exceeded".to_string(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    "request rejected, check the API key".to_string()
                }
                other => other
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            };
            return Err(GeoEnrichError::lookup_with_status(
                address,
                message,
                status.as_u16(),
            ));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GeoEnrichError::timeout(format!("lookup of {}", address), self.timeout)
            } else {
                GeoEnrichError::from(e)
            }
        })?;

        parse_details(&body)
    }
}

impl GeoLookup for IpInfoClient {
    async fn fetch(&self, address: &str) -> Result<GeoDetails, GeoEnrichError> {
        self.request(address).await
    }
}

/// Decode a service response body.
///
/// Anything other than a JSON object is malformed, as are non-string
/// values for the fields we read.
pub fn parse_details(body: &str) -> Result<GeoDetails, GeoEnrichError> {
    let value: serde_json::Value = serde_json::from_str(body)?;

    if !value.is_object() {
        return Err(GeoEnrichError::ParseError {
            message: "expected a JSON object".to_string(),
        });
    }

    Ok(serde_json::from_value(value)?)
}
