#![allow(dead_code)]

use catalog_csv::{
    CollectingSink, ColumnSpec, CsvImportReporter, CsvPagedDataImporter, DecodeFailure,
    ImportConfig, ImportProgressInfo, Importable, RowFields, Schema, Validator, ValueKind,
};
use std::io::Cursor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const ITEM_HEADER: &str = "Name;SKU;Qty";

/// Header plus rows, each terminated with `\r\n`.
pub fn csv(header: &str, rows: &[&str]) -> String {
    let mut text = String::new();
    for line in std::iter::once(&header).chain(rows) {
        text.push_str(line);
        text.push_str("\r\n");
    }
    text
}

pub fn cursor(text: &str) -> Cursor<Vec<u8>> {
    Cursor::new(text.as_bytes().to_vec())
}

/// Minimal entity: two required text columns and an optional integer.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub sku: String,
    pub qty: Option<i64>,
}

impl Importable for Item {
    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSpec::new("name", "Name").required(),
            ColumnSpec::new("sku", "SKU").required(),
            ColumnSpec::new("qty", "Qty").kind(ValueKind::Integer),
        ])
    }

    fn decode(row: &RowFields<'_>) -> Result<Self, DecodeFailure> {
        Ok(Self {
            name: row.required_text("name")?,
            sku: row.required_text("sku")?,
            qty: row.parse("qty")?,
        })
    }
}

pub struct Outcome {
    pub summary: ImportProgressInfo,
    pub snapshots: Vec<ImportProgressInfo>,
    pub report: String,
    pub saved: Vec<Item>,
}

/// Run the engine over an in-memory file with an in-memory report.
pub async fn import_items(
    text: &str,
    page_size: usize,
    validator: Arc<dyn Validator<Item>>,
    cancel: &CancellationToken,
) -> Outcome {
    let sink = Arc::new(CollectingSink::<Item>::new());
    let importer = CsvPagedDataImporter::new(
        "Item",
        ImportConfig::default().with_page_size(page_size),
        validator,
        sink.clone(),
    );

    let mut reporter = CsvImportReporter::from_writer(Vec::new(), b';');
    let mut snapshots = Vec::new();
    let mut progress = |p: &ImportProgressInfo| snapshots.push(p.clone());

    let summary = importer
        .import_stream(
            Ok(cursor(text)),
            &mut reporter,
            "report.csv".to_string(),
            &mut progress,
            cancel,
        )
        .await;

    Outcome {
        summary,
        snapshots,
        report: String::from_utf8_lossy(&reporter.into_inner()).into_owned(),
        saved: sink.take(),
    }
}
