mod common;

use async_trait::async_trait;
use catalog_csv::{
    AcceptAll, ImportRecord, ImportStatus, RecordSink, ValidationErrorKind, Validator, Violation,
};
use common::{csv, import_items, Item, ITEM_HEADER};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Flags quantities above ten with two violations.
struct QtyLimit;

#[async_trait]
impl Validator<Item> for QtyLimit {
    async fn validate(&self, records: &[ImportRecord<Item>]) -> anyhow::Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for (index, record) in records.iter().enumerate() {
            if record.record.qty.is_some_and(|q| q > 10) {
                violations.push(Violation::new(
                    index,
                    ValidationErrorKind::InvalidValue,
                    "Qty is over the limit.",
                ));
                violations.push(Violation::invalid_value(index, "Qty"));
            }
        }
        Ok(violations)
    }
}

struct Unavailable;

#[async_trait]
impl Validator<Item> for Unavailable {
    async fn validate(&self, _records: &[ImportRecord<Item>]) -> anyhow::Result<Vec<Violation>> {
        anyhow::bail!("catalog service unavailable")
    }
}

struct RejectingSink;

#[async_trait]
impl RecordSink<Item> for RejectingSink {
    async fn save(&self, _records: Vec<Item>) -> anyhow::Result<()> {
        anyhow::bail!("storage is read-only")
    }
}

#[tokio::test]
async fn clean_file_completes_without_report() {
    let text = csv(ITEM_HEADER, &["Chair;C-1;1", "Table;T-1;2", "Lamp;L-1;"]);
    let out = import_items(&text, 2, Arc::new(AcceptAll), &CancellationToken::new()).await;

    assert_eq!(out.summary.status, ImportStatus::Completed);
    assert_eq!(out.summary.total_count, 3);
    assert_eq!(out.summary.processed_count, 3);
    assert_eq!(out.summary.error_count, 0);
    assert_eq!(out.summary.report_url, None);
    assert_eq!(
        out.summary.description,
        "Import completed: 3 out of 3 have been imported."
    );
    assert_eq!(out.report, "Name;SKU;Qty;Error description\r\n");
    assert_eq!(out.saved.len(), 3);
    assert_eq!(out.saved[2].qty, None);

    let descriptions: Vec<&str> = out.snapshots.iter().map(|s| s.description.as_str()).collect();
    assert_eq!(
        descriptions,
        vec![
            "Import has started",
            "Fetching...",
            "2 out of 3 have been imported.",
            "Import completed: 3 out of 3 have been imported.",
        ]
    );
    assert_eq!(out.snapshots[0].total_count, 3);
}

#[tokio::test]
async fn missing_required_value_is_reported_once() {
    let text = csv(ITEM_HEADER, &["Chair;;1", "Table;T-1;2", "Lamp;L-1;3"]);
    let out = import_items(&text, 50, Arc::new(AcceptAll), &CancellationToken::new()).await;

    assert_eq!(out.summary.error_count, 1);
    assert_eq!(out.summary.processed_count, 3);
    assert_eq!(out.summary.report_url.as_deref(), Some("report.csv"));
    assert_eq!(
        out.summary.description,
        "Import completed with errors: 3 out of 3 have been imported."
    );
    assert_eq!(
        out.report,
        "Name;SKU;Qty;Error description\r\n\
         Chair;;1;The required value in column 'SKU' is missing.\r\n"
    );
    assert_eq!(out.saved.len(), 2);
}

#[tokio::test]
async fn unescaped_quote_affects_only_its_row() {
    let text = csv(ITEM_HEADER, &["\"Chair;C-1;1", "Table;T-1;2", "Lamp;L-1;3"]);
    let out = import_items(&text, 50, Arc::new(AcceptAll), &CancellationToken::new()).await;

    assert_eq!(out.summary.error_count, 1);
    assert_eq!(
        out.report.lines().nth(1),
        Some(
            "\"Chair;C-1;1;This row has invalid data. \
             The data after field with not escaped quote was lost."
        )
    );
    let skus: Vec<&str> = out.saved.iter().map(|i| i.sku.as_str()).collect();
    assert_eq!(skus, vec!["T-1", "L-1"]);
}

#[tokio::test]
async fn stray_quotes_inside_fields_are_bad_data() {
    let text = csv(ITEM_HEADER, &["Chair;\"C-1\"x;1", "Lamp;L\"\"-2;3", "Desk;\"D;1\";4"]);
    let out = import_items(&text, 50, Arc::new(AcceptAll), &CancellationToken::new()).await;

    assert_eq!(out.summary.error_count, 2);
    let bad_data = "This row has invalid data. The data after field with not escaped quote was lost.";
    assert_eq!(
        out.report,
        format!(
            "Name;SKU;Qty;Error description\r\n\
             Chair;\"C-1\"x;1;{bad_data}\r\n\
             Lamp;L\"\"-2;3;{bad_data}\r\n"
        )
    );
    assert_eq!(
        out.saved,
        vec![Item { name: "Desk".into(), sku: "D;1".into(), qty: Some(4) }]
    );
}

#[tokio::test]
async fn several_empty_required_values_merge_into_one_error() {
    let text = csv(ITEM_HEADER, &[";;5", "Table;T-1;2"]);
    let out = import_items(&text, 50, Arc::new(AcceptAll), &CancellationToken::new()).await;

    assert_eq!(out.summary.error_count, 1);
    assert_eq!(out.report.lines().count(), 2);
    assert!(out
        .report
        .contains(";;5;The required values in columns: Name, SKU - are missing.\r\n"));
}

#[tokio::test]
async fn report_is_sorted_and_violations_merge_per_row() {
    // Row 3 fails while fetching, row 2 only during validation
    let text = csv(ITEM_HEADER, &["Chair;C-1;50", "Table;T-1;many", "Lamp;L-1;3"]);
    let out = import_items(&text, 50, Arc::new(QtyLimit), &CancellationToken::new()).await;

    assert_eq!(out.summary.error_count, 2);
    let lines: Vec<&str> = out.report.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Name;SKU;Qty;Error description",
            "Chair;C-1;50;Qty is over the limit. This row has invalid value in the column 'Qty'.",
            "Table;T-1;many;This row has invalid value in the column 'Qty'.",
        ]
    );
    assert_eq!(out.saved, vec![Item { name: "Lamp".into(), sku: "L-1".into(), qty: Some(3) }]);
}

#[tokio::test]
async fn decode_failures_publish_progress_live() {
    let text = csv(ITEM_HEADER, &["Chair;;1", "Table;T-1;x"]);
    let out = import_items(&text, 50, Arc::new(AcceptAll), &CancellationToken::new()).await;

    let live: Vec<usize> = out
        .snapshots
        .iter()
        .filter(|s| s.description == "Fetching...")
        .map(|s| s.error_count)
        .collect();
    assert_eq!(live, vec![0, 1, 2]);
}

#[tokio::test]
async fn invalid_header_is_counted_as_a_row() {
    let text = csv("Name;Qty", &["Chair;1", "Table;2"]);
    let out = import_items(&text, 50, Arc::new(AcceptAll), &CancellationToken::new()).await;

    assert_eq!(out.summary.total_count, 3);
    assert_eq!(out.summary.processed_count, 2);
    assert_eq!(out.summary.error_count, 2);
    assert_eq!(out.summary.status, ImportStatus::Completed);
    // No header line: the header did not carry the expected columns
    assert_eq!(
        out.report,
        "Chair;1;This row has unclosed quote or missed columns: SKU.\r\n\
         Table;2;This row has unclosed quote or missed columns: SKU.\r\n"
    );
}

#[tokio::test]
async fn cancelled_before_first_page() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let text = csv(ITEM_HEADER, &["Chair;C-1;1", "Table;T-1;2"]);
    let out = import_items(&text, 1, Arc::new(AcceptAll), &cancel).await;

    assert_eq!(out.summary.status, ImportStatus::Cancelled);
    assert_eq!(out.summary.processed_count, 0);
    assert_eq!(out.summary.total_count, 2);
    assert!(out.summary.errors.is_empty());
    assert!(out.saved.is_empty());
    assert_eq!(out.report, "Name;SKU;Qty;Error description\r\n");
}

#[tokio::test]
async fn cancelled_mid_stream_keeps_processed_pages() {
    let cancel = CancellationToken::new();
    let text = csv(
        ITEM_HEADER,
        &["A;A-1;1", "B;B-1;2", "C;C-1;3", "D;D-1;4", "E;E-1;5"],
    );

    let sink = Arc::new(catalog_csv::CollectingSink::<Item>::new());
    let importer = catalog_csv::CsvPagedDataImporter::new(
        "Item",
        catalog_csv::ImportConfig::default().with_page_size(2),
        Arc::new(AcceptAll),
        sink.clone(),
    );
    let mut reporter = catalog_csv::CsvImportReporter::from_writer(Vec::new(), b';');
    let trigger = cancel.clone();
    let mut progress = move |p: &catalog_csv::ImportProgressInfo| {
        if p.processed_count > 0 {
            trigger.cancel();
        }
    };

    let summary = importer
        .import_stream(
            Ok(common::cursor(&text)),
            &mut reporter,
            "report.csv".to_string(),
            &mut progress,
            &cancel,
        )
        .await;

    assert_eq!(summary.status, ImportStatus::Cancelled);
    assert_eq!(summary.processed_count, 2);
    assert_eq!(
        summary.description,
        "Import completed: 2 out of 5 have been imported."
    );
    assert_eq!(sink.take().len(), 2);
}

#[tokio::test]
async fn validator_failure_is_fatal_but_housekeeping_runs() {
    let text = csv(ITEM_HEADER, &["Chair;C-1;1", "Table;;2"]);
    let out = import_items(&text, 50, Arc::new(Unavailable), &CancellationToken::new()).await;

    assert_eq!(out.summary.status, ImportStatus::Failed);
    assert_eq!(out.summary.errors, vec!["catalog service unavailable".to_string()]);
    assert_eq!(out.summary.processed_count, 0);
    // The decode failure was counted before the validator gave up
    assert_eq!(out.summary.error_count, 1);
    assert!(out.summary.description.starts_with("Import completed with errors"));
    assert_eq!(out.summary.report_url.as_deref(), Some("report.csv"));
    assert_eq!(
        out.report,
        "Name;SKU;Qty;Error description\r\n\
         Table;;2;The required value in column 'SKU' is missing.\r\n"
    );
    assert!(out.saved.is_empty());
    assert_eq!(out.snapshots.last(), Some(&out.summary));
}

#[tokio::test]
async fn sink_failure_still_reports_rows_of_the_page() {
    let importer = catalog_csv::CsvPagedDataImporter::new(
        "Item",
        catalog_csv::ImportConfig::default(),
        Arc::new(QtyLimit),
        Arc::new(RejectingSink),
    );
    let mut reporter = catalog_csv::CsvImportReporter::from_writer(Vec::new(), b';');
    let mut progress = |_: &catalog_csv::ImportProgressInfo| {};

    let text = csv(ITEM_HEADER, &["Chair;C-1;50", "Table;T-1;x", "Lamp;L-1;3"]);
    let summary = importer
        .import_stream(
            Ok(common::cursor(&text)),
            &mut reporter,
            "report.csv".to_string(),
            &mut progress,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(summary.status, ImportStatus::Failed);
    assert_eq!(summary.errors, vec!["storage is read-only".to_string()]);
    assert_eq!(summary.error_count, 2);
    assert!(summary.report_url.is_some());

    let report = String::from_utf8(reporter.into_inner()).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Name;SKU;Qty;Error description",
            "Chair;C-1;50;Qty is over the limit. This row has invalid value in the column 'Qty'.",
            "Table;T-1;x;This row has invalid value in the column 'Qty'.",
        ]
    );
}

#[tokio::test]
async fn unreadable_stream_is_fatal() {
    let out = import_items("", 50, Arc::new(AcceptAll), &CancellationToken::new()).await;

    assert_eq!(out.summary.status, ImportStatus::Failed);
    assert_eq!(out.summary.errors.len(), 1);
    assert!(out.summary.errors[0].contains("header row"));
    assert_eq!(out.summary.processed_count, 0);
    assert_eq!(out.summary.report_url, None);
    assert!(out.report.is_empty());
}
