//! Pipeline composition: extract → enrich → write.
//!
//! Each stage runs once, in order, and the first failure ends the run. Once
//! the lookup client exists the enrich stage cannot fail; per-address lookup
//! errors become `"Error"` rows.

use crate::enricher::ConcurrentEnricher;
use crate::error::GeoEnrichError;
use crate::extractor::extract_addresses;
use crate::lookup::{GeoLookup, IpInfoClient};
use crate::types::{EnrichConfig, DEFAULT_OUTPUT_PATH};
use crate::writer::write_records;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Pipeline stage, reported alongside a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Enrich,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => write!(f, "extract"),
            Stage::Enrich => write!(f, "enrich"),
            Stage::Write => write!(f, "write"),
        }
    }
}

/// A run-ending failure and the stage it happened in.
#[derive(Debug, Clone)]
pub struct PipelineError {
    pub stage: Stage,
    pub error: GeoEnrichError,
}

impl PipelineError {
    fn at(stage: Stage) -> impl FnOnce(GeoEnrichError) -> Self {
        move |error| Self { stage, error }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Inputs for one run, as collected by a front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    /// Spreadsheet or CSV file holding the addresses
    pub source: PathBuf,
    /// Column letter, A-Z
    pub column: String,
    /// First row to read, 1-based
    pub start_row: usize,
    /// Where the enriched table is written
    pub output: PathBuf,
}

impl PipelineRequest {
    /// Create a request writing to `Output/ip_geolocation.xlsx`.
    pub fn new<P: Into<PathBuf>, C: Into<String>>(source: P, column: C, start_row: usize) -> Self {
        Self {
            source: source.into(),
            column: column.into(),
            start_row,
            output: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }

    /// Write the result somewhere else.
    pub fn with_output<P: Into<PathBuf>>(mut self, output: P) -> Self {
        self.output = output.into();
        self
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration: Duration,
}

/// Wires extraction, enrichment and output together.
///
/// # Example
///
/// ```rust,no_run
/// use ip_geolocate_lib::{EnrichConfig, Pipeline, PipelineRequest};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = Pipeline::with_api_key("my-token", &EnrichConfig::default())?;
///     let request = PipelineRequest::new("servers.xlsx", "B", 2);
///     let summary = pipeline.run(&request).await?;
///     println!("{} rows written to {}", summary.total, summary.output.display());
///     Ok(())
/// }
/// ```
pub struct Pipeline<L> {
    enricher: ConcurrentEnricher<L>,
}

impl Pipeline<IpInfoClient> {
    /// Build a pipeline backed by the HTTP lookup client.
    pub fn with_api_key<K: Into<String>>(
        api_key: K,
        config: &EnrichConfig,
    ) -> Result<Self, GeoEnrichError> {
        let client = IpInfoClient::with_config(api_key, config)?;
        Ok(Self::from_lookup(client, config))
    }
}

impl<L: GeoLookup> Pipeline<L> {
    /// Build a pipeline around an existing enricher.
    pub fn new(enricher: ConcurrentEnricher<L>) -> Self {
        Self { enricher }
    }

    /// Build a pipeline from any lookup source.
    pub fn from_lookup(lookup: L, config: &EnrichConfig) -> Self {
        Self::new(ConcurrentEnricher::from_config(lookup, config))
    }

    /// The enricher driving the lookups.
    pub fn enricher(&self) -> &ConcurrentEnricher<L> {
        &self.enricher
    }

    /// Run only the extract stage.
    pub fn extract(&self, request: &PipelineRequest) -> Result<Vec<String>, PipelineError> {
        extract_addresses(&request.source, &request.column, request.start_row)
            .map_err(PipelineError::at(Stage::Extract))
    }

    /// Run extract → enrich → write.
    ///
    /// An extraction failure aborts before any lookup is sent and before
    /// anything is written.
    pub async fn run(&self, request: &PipelineRequest) -> Result<RunSummary, PipelineError> {
        let addresses = self.extract(request)?;
        self.enrich_and_write(addresses, &request.output).await
    }

    /// Run enrich → write over addresses that were already extracted.
    pub async fn enrich_and_write(
        &self,
        addresses: Vec<String>,
        output: &Path,
    ) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();

        if addresses.is_empty() {
            warn!("no addresses found, output will only contain the header row");
        }

        let records = self.enricher.enrich(addresses).await;

        write_records(&records, output).map_err(PipelineError::at(Stage::Write))?;

        let failed = records.iter().filter(|r| r.is_error()).count();
        let summary = RunSummary {
            output: output.to_path_buf(),
            total: records.len(),
            succeeded: records.len() - failed,
            failed,
            duration: start.elapsed(),
        };

        info!(
            output = %summary.output.display(),
            total = summary.total,
            failed = summary.failed,
            "pipeline finished"
        );

        Ok(summary)
    }
}

/// One-shot run against the HTTP service.
pub async fn process_file<P: AsRef<Path>>(
    source: P,
    column: &str,
    start_row: usize,
    api_key: &str,
    config: &EnrichConfig,
) -> Result<RunSummary, PipelineError> {
    let pipeline =
        Pipeline::with_api_key(api_key, config).map_err(PipelineError::at(Stage::Enrich))?;
    let request = PipelineRequest::new(source.as_ref(), column, start_row);
    pipeline.run(&request).await
}
