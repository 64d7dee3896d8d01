// ip-geolocate-lib/tests/integration.rs

//! Integration tests for the extract → enrich → write pipeline

use calamine::{open_workbook, Data, Reader, Xlsx};
use ip_geolocate_lib::{
    ConcurrentEnricher, EnrichConfig, GeoDetails, GeoEnrichError, GeoLookup, GeoRecord,
    OutputOrder, Pipeline, PipelineRequest, Stage, OUTPUT_HEADERS, SHEET_NAME,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Canned answers keyed by address; unknown addresses fail like a dropped connection.
struct MockService {
    answers: HashMap<String, GeoDetails>,
}

impl MockService {
    fn new() -> Self {
        Self {
            answers: HashMap::new(),
        }
    }

    fn answer(mut self, address: &str, details: GeoDetails) -> Self {
        self.answers.insert(address.to_string(), details);
        self
    }
}

impl GeoLookup for MockService {
    async fn fetch(&self, address: &str) -> Result<GeoDetails, GeoEnrichError> {
        self.answers
            .get(address)
            .cloned()
            .ok_or_else(|| GeoEnrichError::network_with_source("Connection failed", "reset by peer"))
    }
}

fn google() -> GeoDetails {
    GeoDetails {
        org: Some("Google LLC".to_string()),
        city: Some("Mountain View".to_string()),
        region: Some("CA".to_string()),
        postal: Some("94043".to_string()),
    }
}

fn read_sheet(path: &Path) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    let range = workbook.worksheet_range(SHEET_NAME).unwrap();
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn test_csv_end_to_end_with_one_failed_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("servers.csv");
    fs::write(&source, "Host,IP\ndns-a,8.8.8.8\ndns-b,1.1.1.1\n").unwrap();
    let output = dir.path().join("Output").join("ip_geolocation.xlsx");

    let service = MockService::new().answer("8.8.8.8", google());
    let pipeline = Pipeline::from_lookup(service, &EnrichConfig::default());

    let summary = pipeline
        .run(&PipelineRequest::new(&source, "B", 2).with_output(&output))
        .await
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let rows = read_sheet(&output);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], OUTPUT_HEADERS.to_vec());

    // Completion order is not fixed, so look rows up by address.
    let by_address: HashMap<&str, &Vec<String>> =
        rows[1..].iter().map(|row| (row[0].as_str(), row)).collect();
    assert_eq!(
        by_address["8.8.8.8"],
        &vec!["8.8.8.8", "Google LLC", "Mountain View", "CA", "94043"]
    );
    assert_eq!(
        by_address["1.1.1.1"],
        &vec!["1.1.1.1", "Error", "Error", "Error", "Error"]
    );
}

#[tokio::test]
async fn test_missing_postal_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("ips.csv");
    fs::write(&source, "9.9.9.9\n").unwrap();
    let output = dir.path().join("out.csv");

    let service = MockService::new().answer(
        "9.9.9.9",
        GeoDetails {
            org: Some("Quad9".to_string()),
            city: Some("Berkeley".to_string()),
            region: Some("California".to_string()),
            postal: None,
        },
    );

    Pipeline::from_lookup(service, &EnrichConfig::default())
        .run(&PipelineRequest::new(&source, "a", 1).with_output(&output))
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "IP Address,ISP,City,Region,Postal Code\n9.9.9.9,Quad9,Berkeley,California,N/A\n"
    );
}

#[tokio::test]
async fn test_output_covers_input_as_multiset() {
    let input: Vec<String> = (0..250)
        .map(|i| format!("10.0.{}.{}", i % 3, i % 7))
        .collect();

    let mut service = MockService::new();
    for address in input.iter().step_by(2) {
        service = service.answer(address, google());
    }

    let records = ConcurrentEnricher::new(service, 16).enrich(input.clone()).await;
    assert_eq!(records.len(), input.len());

    let mut expected = input.clone();
    expected.sort();
    let mut actual: Vec<String> = records.iter().map(|r| r.address.clone()).collect();
    actual.sort();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_input_order_run_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("ips.csv");
    let addresses: Vec<String> = (1..=40).map(|i| format!("192.0.2.{}", i)).collect();
    fs::write(&source, addresses.join("\n")).unwrap();
    let output = dir.path().join("out.csv");

    let config = EnrichConfig::default()
        .with_concurrency(8)
        .with_order(OutputOrder::Input);
    let pipeline = Pipeline::from_lookup(MockService::new().answer("192.0.2.7", google()), &config);
    let request = PipelineRequest::new(&source, "A", 1).with_output(&output);

    pipeline.run(&request).await.unwrap();
    let first = fs::read_to_string(&output).unwrap();
    pipeline.run(&request).await.unwrap();
    let second = fs::read_to_string(&output).unwrap();

    assert_eq!(first, second);
    let data_rows: Vec<&str> = first.lines().skip(1).collect();
    assert_eq!(data_rows.len(), 40);
    assert!(data_rows[0].starts_with("192.0.2.1,Error"));
    assert_eq!(data_rows[6], "192.0.2.7,Google LLC,Mountain View,CA,94043");
}

#[tokio::test]
async fn test_spreadsheet_source() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("ips.xlsx");

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 2, "Address").unwrap();
    sheet.write_string(1, 2, "8.8.8.8").unwrap();
    sheet.write_string(3, 2, "8.8.8.8").unwrap();
    workbook.save(&source).unwrap();

    let output = dir.path().join("out.csv");
    let summary = Pipeline::from_lookup(
        MockService::new().answer("8.8.8.8", google()),
        &EnrichConfig::default(),
    )
    .run(&PipelineRequest::new(&source, "C", 2).with_output(&output))
    .await
    .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_unsupported_source_reports_extract_stage() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("ips.json");
    fs::write(&source, "[]").unwrap();

    let err = Pipeline::from_lookup(MockService::new(), &EnrichConfig::default())
        .run(&PipelineRequest::new(&source, "A", 1).with_output(dir.path().join("o.xlsx")))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Extract);
    assert!(err.to_string().starts_with("extract stage failed"));
}

#[test]
fn test_error_record_shape() {
    let record = GeoRecord::error("::1");
    assert_eq!(record.as_row(), ["::1", "Error", "Error", "Error", "Error"]);
}
