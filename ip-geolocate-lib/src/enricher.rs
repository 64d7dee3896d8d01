//! Concurrent enrichment of address lists.
//!
//! Lookups are driven as a buffered stream: at most `concurrency` are in
//! flight, the rest wait for a slot. The stream has a single consumer, so
//! results cannot be lost or interleaved no matter how completions race.

use crate::lookup::GeoLookup;
use crate::types::{EnrichConfig, GeoRecord, OutputOrder};
use futures::stream::{self, Stream, StreamExt};
use std::time::Instant;
use tracing::info;

/// Runs one lookup per address with bounded concurrency.
///
/// # Example
///
/// ```rust,no_run
/// use ip_geolocate_lib::{ConcurrentEnricher, IpInfoClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = IpInfoClient::new("my-token")?;
///     let enricher = ConcurrentEnricher::new(client, 20);
///     let records = enricher
///         .enrich(vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()])
///         .await;
///
///     for record in records {
///         println!("{}: {} / {}", record.address, record.isp, record.city);
///     }
///     Ok(())
/// }
/// ```
pub struct ConcurrentEnricher<L> {
    lookup: L,
    concurrency: usize,
    order: OutputOrder,
}

impl<L: GeoLookup> ConcurrentEnricher<L> {
    /// Create an enricher emitting records in completion order.
    ///
    /// A `concurrency` of zero is raised to 1.
    pub fn new(lookup: L, concurrency: usize) -> Self {
        Self {
            lookup,
            concurrency: concurrency.max(1),
            order: OutputOrder::Completion,
        }
    }

    /// Create an enricher with concurrency and order taken from `config`.
    pub fn from_config(lookup: L, config: &EnrichConfig) -> Self {
        Self::new(lookup, config.concurrency).with_order(config.order)
    }

    /// Choose the emission order used by [`enrich`](Self::enrich).
    pub fn with_order(mut self, order: OutputOrder) -> Self {
        self.order = order;
        self
    }

    /// Maximum number of lookups in flight.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Emission order used by [`enrich`](Self::enrich).
    pub fn order(&self) -> OutputOrder {
        self.order
    }

    /// Enrich every address and return one record per address.
    ///
    /// Duplicates are looked up independently. A failed lookup yields an
    /// `"Error"` record for that address only; it never stops the batch.
    pub async fn enrich(&self, addresses: Vec<String>) -> Vec<GeoRecord> {
        let total = addresses.len();
        let start = Instant::now();

        info!(
            total,
            concurrency = self.concurrency,
            order = %self.order,
            "starting enrichment"
        );

        let records: Vec<GeoRecord> = match self.order {
            OutputOrder::Completion => self.enrich_stream(addresses).collect().await,
            OutputOrder::Input => {
                let mut slots: Vec<Option<GeoRecord>> = vec![None; total];
                let mut completed = std::pin::pin!(self.indexed_stream(addresses));
                while let Some((idx, record)) = completed.next().await {
                    slots[idx] = Some(record);
                }
                slots.into_iter().flatten().collect()
            }
        };

        let failed = records.iter().filter(|r| r.is_error()).count();
        info!(
            total = records.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "enrichment finished"
        );

        records
    }

    /// Enrich addresses, yielding each record as soon as its lookup finishes.
    pub fn enrich_stream<'a>(
        &'a self,
        addresses: Vec<String>,
    ) -> impl Stream<Item = GeoRecord> + Send + 'a {
        self.indexed_stream(addresses).map(|(_, record)| record)
    }

    fn indexed_stream<'a>(
        &'a self,
        addresses: Vec<String>,
    ) -> impl Stream<Item = (usize, GeoRecord)> + Send + 'a {
        stream::iter(addresses.into_iter().enumerate())
            .map(move |(idx, address)| async move {
                let record = self.lookup.lookup(&address).await;
                (idx, record)
            })
            .buffer_unordered(self.concurrency)
    }
}
