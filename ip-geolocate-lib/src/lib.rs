//! # IP Geolocate Library
//!
//! Enriches lists of IP addresses with geolocation data (ISP, city, region,
//! postal code) and writes the result as a spreadsheet or CSV table.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ip_geolocate_lib::{EnrichConfig, Pipeline, PipelineRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EnrichConfig::default().with_concurrency(50);
//!     let pipeline = Pipeline::with_api_key("my-token", &config)?;
//!
//!     let request = PipelineRequest::new("servers.csv", "B", 2);
//!     let summary = pipeline.run(&request).await?;
//!
//!     println!("{} records, {} failed", summary.total, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Spreadsheet and CSV input**: one column, from any start row
//! - **Bounded concurrency**: many lookups in flight, never more than the cap
//! - **Per-address failures as data**: a failed lookup becomes an `"Error"` row
//! - **Workbook or CSV output**: fixed header, directories created on demand

// Re-export main public API types and functions
// This makes them available as ip_geolocate_lib::TypeName
pub use config::{
    env_config_from, load_env_config, parse_timeout_string, ConfigManager, DefaultsConfig,
    EnvConfig, FileConfig, OutputConfig, ServiceConfig,
};
pub use enricher::ConcurrentEnricher;
pub use error::GeoEnrichError;
pub use extractor::{column_index, extract_addresses, SourceFormat};
pub use lookup::{parse_details, GeoLookup, IpInfoClient};
pub use pipeline::{process_file, Pipeline, PipelineError, PipelineRequest, RunSummary, Stage};
pub use types::{
    EnrichConfig, GeoDetails, GeoRecord, OutputOrder, DEFAULT_BASE_URL, DEFAULT_CONCURRENCY,
    DEFAULT_OUTPUT_PATH, DEFAULT_TIMEOUT, ERROR_SENTINEL, NOT_AVAILABLE, OUTPUT_HEADERS,
};
pub use writer::{write_records, OutputFormat, SHEET_NAME};

// Internal modules - these are not part of the public API
mod config;
mod enricher;
mod error;
mod extractor;
mod lookup;
mod pipeline;
mod types;
mod writer;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, GeoEnrichError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        default_concurrency: DEFAULT_CONCURRENCY,
        service: DEFAULT_BASE_URL,
    }
}

/// Information about the library build
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    pub default_concurrency: usize,
    pub service: &'static str,
}
