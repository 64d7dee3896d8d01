//! IP Geolocate CLI Application
//!
//! A command-line interface that reads IP addresses from one column of a
//! spreadsheet or CSV file, looks each one up concurrently, and writes the
//! enriched table. This CLI application is a thin front-end over
//! ip-geolocate-lib.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use ip_geolocate_lib::{
    extract_addresses, load_env_config, parse_timeout_string, ConfigManager, EnrichConfig,
    EnvConfig, FileConfig, OutputOrder, Pipeline, PipelineRequest, DEFAULT_OUTPUT_PATH,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for ip-geolocate
#[derive(Parser, Debug)]
#[command(name = "ip-geolocate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Sai Dutt G.V <gvs46@protonmail.com>")]
#[command(about = "Enrich a column of IP addresses with ISP and location data")]
#[command(
    long_about = "Read IP addresses from one column of an .xlsx or .csv file, look each one up concurrently against an ipinfo-compatible service, and write ISP, city, region and postal code to a workbook or CSV file.\n\nFailed lookups are kept as rows whose fields read \"Error\"."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Spreadsheet (.xlsx, .xlsm) or CSV file holding the addresses
    #[arg(value_name = "INPUT", help_heading = "Input")]
    pub input: PathBuf,

    /// Column letter holding the addresses (A-Z) [default: A]
    #[arg(short = 'c', long = "column", value_name = "LETTER", help_heading = "Input")]
    pub column: Option<String>,

    /// First row to read, 1-based [default: 1]
    #[arg(short = 's', long = "start-row", value_name = "ROW", help_heading = "Input")]
    pub start_row: Option<usize>,

    /// Only print the extracted addresses, no lookups
    #[arg(long = "dry-run", help_heading = "Input")]
    pub dry_run: bool,

    /// Access token for the lookup service
    #[arg(short = 'k', long = "api-key", value_name = "KEY", help_heading = "Service")]
    pub api_key: Option<String>,

    /// Service root URL [default: https://ipinfo.io]
    #[arg(long = "base-url", value_name = "URL", help_heading = "Service")]
    pub base_url: Option<String>,

    /// Max concurrent lookups [default: 100]
    #[arg(short = 'n', long = "concurrency", value_name = "N", help_heading = "Service")]
    pub concurrency: Option<usize>,

    /// Per-request timeout, e.g. "10s" or "1m" [default: 10s]
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Service")]
    pub timeout: Option<String>,

    /// Output file; .xlsx writes a workbook, .csv a CSV table
    #[arg(short = 'o', long = "output", value_name = "PATH", help_heading = "Output")]
    pub output: Option<PathBuf>,

    /// Keep output rows in input order instead of completion order
    #[arg(long = "input-order", help_heading = "Output")]
    pub input_order: bool,

    /// Use a specific config file instead of discovered ones
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show progress logs
    #[arg(short = 'v', long = "verbose", help_heading = "Debugging")]
    pub verbose: bool,

    /// Show per-lookup debug logs
    #[arg(short = 'd', long = "debug", help_heading = "Debugging")]
    pub debug: bool,
}

/// Fully resolved run settings after config, env and CLI layering.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    column: String,
    start_row: usize,
    api_key: Option<String>,
    output: PathBuf,
    enrich: EnrichConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            column: "A".to_string(),
            start_row: 1,
            api_key: None,
            output: PathBuf::from(DEFAULT_OUTPUT_PATH),
            enrich: EnrichConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(&args);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Install the tracing subscriber; RUST_LOG wins over the verbosity flags.
fn init_logging(args: &Args) {
    let default_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            return Err("Concurrency must be at least 1".to_string());
        }
    }

    if args.start_row == Some(0) {
        return Err("Start row is 1-based and must be at least 1".to_string());
    }

    if let Some(column) = &args.column {
        ip_geolocate_lib::column_index(column).map_err(|e| e.to_string())?;
    }

    if let Some(timeout) = &args.timeout {
        if parse_timeout_string(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use format like '5s', '30s', '2m'",
                timeout
            ));
        }
    }

    if let Some(base_url) = &args.base_url {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(format!(
                "Base URL '{}' must start with http:// or https://",
                base_url
            ));
        }
    }

    Ok(())
}

/// Main run logic
async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let env_config = load_env_config();
    let settings = build_settings(&args, env_config)?;
    debug!(
        column = %settings.column,
        start_row = settings.start_row,
        concurrency = settings.enrich.concurrency,
        order = %settings.enrich.order,
        output = %settings.output.display(),
        "resolved settings"
    );

    if args.dry_run {
        let addresses = extract_addresses(&args.input, &settings.column, settings.start_row)?;
        for address in &addresses {
            println!("{}", address);
        }
        eprintln!(
            "{} address{} found, no lookups sent (dry run)",
            addresses.len(),
            if addresses.len() == 1 { "" } else { "es" }
        );
        return Ok(());
    }

    let api_key = settings.api_key.clone().ok_or(
        "No API key provided. Use --api-key, IPGEO_API_KEY, or api_key under [service] in a config file",
    )?;

    let pipeline = Pipeline::with_api_key(api_key, &settings.enrich)?;
    let request = PipelineRequest::new(&args.input, settings.column.as_str(), settings.start_row)
        .with_output(&settings.output);

    let addresses = pipeline.extract(&request)?;

    ui::print_header(
        &request.source,
        addresses.len(),
        pipeline.enricher().concurrency(),
        pipeline.enricher().order(),
    );

    let spinner = ui::Spinner::start(format!(
        "Looking up {} address{}...",
        addresses.len(),
        if addresses.len() == 1 { "" } else { "es" }
    ));

    let result = pipeline.enrich_and_write(addresses, &request.output).await;

    if let Some(spinner) = spinner {
        spinner.stop().await;
    }

    let summary = result?;
    ui::print_summary(&summary);

    Ok(())
}

/// Build run settings with proper precedence.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables (IPGEO_*)
/// 3. Explicit config file (--config / IPGEO_CONFIG), or discovered files
/// 4. Built-in defaults
fn build_settings(
    args: &Args,
    env_config: EnvConfig,
) -> Result<Settings, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new();

    let file_config = match args.config.as_ref().or(env_config.config.as_ref()) {
        Some(path) => config_manager
            .load_file(path)
            .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?,
        None => config_manager.discover_and_load()?,
    };

    let settings = merge_file_config(Settings::default(), file_config);
    let settings = apply_environment_config(settings, env_config);
    Ok(apply_cli_args(settings, args))
}

/// Layer config file values over the defaults.
fn merge_file_config(mut settings: Settings, file_config: FileConfig) -> Settings {
    if let Some(defaults) = file_config.defaults {
        if let Some(concurrency) = defaults.concurrency {
            settings.enrich = settings.enrich.with_concurrency(concurrency);
        }
        if let Some(secs) = defaults.timeout.as_deref().and_then(parse_timeout_string) {
            settings.enrich = settings.enrich.with_timeout(Duration::from_secs(secs));
        }
        if let Some(start_row) = defaults.start_row {
            settings.start_row = start_row;
        }
        if let Some(column) = defaults.column {
            settings.column = column;
        }
        if let Some(order) = defaults.order.and_then(|o| o.parse::<OutputOrder>().ok()) {
            settings.enrich = settings.enrich.with_order(order);
        }
    }

    if let Some(service) = file_config.service {
        if let Some(base_url) = service.base_url {
            settings.enrich = settings.enrich.with_base_url(base_url);
        }
        if service.api_key.is_some() {
            settings.api_key = service.api_key;
        }
    }

    if let Some(path) = file_config.output.and_then(|o| o.path) {
        settings.output = PathBuf::from(path);
    }

    settings
}

/// Layer IPGEO_* values over file config.
fn apply_environment_config(mut settings: Settings, env_config: EnvConfig) -> Settings {
    if let Some(concurrency) = env_config.concurrency {
        settings.enrich = settings.enrich.with_concurrency(concurrency);
    }
    if let Some(secs) = env_config.timeout.as_deref().and_then(parse_timeout_string) {
        settings.enrich = settings.enrich.with_timeout(Duration::from_secs(secs));
    }
    if let Some(base_url) = env_config.base_url {
        settings.enrich = settings.enrich.with_base_url(base_url);
    }
    if let Some(order) = env_config.order {
        settings.enrich = settings.enrich.with_order(order);
    }
    if env_config.api_key.is_some() {
        settings.api_key = env_config.api_key;
    }
    if let Some(output) = env_config.output {
        settings.output = PathBuf::from(output);
    }

    settings
}

/// Apply CLI arguments (highest precedence).
///
/// Only options the user actually passed override lower layers.
fn apply_cli_args(mut settings: Settings, args: &Args) -> Settings {
    if let Some(concurrency) = args.concurrency {
        settings.enrich = settings.enrich.with_concurrency(concurrency);
    }
    if let Some(secs) = args.timeout.as_deref().and_then(parse_timeout_string) {
        settings.enrich = settings.enrich.with_timeout(Duration::from_secs(secs));
    }
    if let Some(base_url) = &args.base_url {
        settings.enrich = settings.enrich.with_base_url(base_url.clone());
    }
    if args.input_order {
        settings.enrich = settings.enrich.with_order(OutputOrder::Input);
    }
    if let Some(column) = &args.column {
        settings.column = column.clone();
    }
    if let Some(start_row) = args.start_row {
        settings.start_row = start_row;
    }
    if args.api_key.is_some() {
        settings.api_key = args.api_key.clone();
    }
    if let Some(output) = &args.output {
        settings.output = output.clone();
    }

    settings
}
