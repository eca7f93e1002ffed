use crate::decoder::RowDecodeError;
use serde::Serialize;

/// A decoded record together with the physical row it came from.
#[derive(Debug, Clone)]
pub struct ImportRecord<T> {
    /// 1-based physical row number (row 1 is the header)
    pub row: usize,
    /// Row text exactly as read, without the line terminator
    pub raw_record: String,
    pub record: T,
}

/// One reportable failure for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportError {
    pub row: usize,
    pub raw_row: String,
    pub error: String,
}

impl From<RowDecodeError> for ImportError {
    fn from(e: RowDecodeError) -> Self {
        Self {
            row: e.row,
            error: e.failure.message(),
            raw_row: e.raw_row,
        }
    }
}

/// Ordered batch of decoded records from one fetch.
#[derive(Debug)]
pub struct Page<T> {
    /// 1-based page number, 0 before the first fetch
    pub number: usize,
    pub items: Vec<ImportRecord<T>>,
    /// Data rows consumed, including rows that failed to decode
    pub rows_read: usize,
}

impl<T> Page<T> {
    pub fn empty(number: usize) -> Self {
        Self {
            number,
            items: Vec::new(),
            rows_read: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Progress snapshot handed to the progress sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportProgressInfo {
    pub total_count: usize,
    pub processed_count: usize,
    pub error_count: usize,
    pub description: String,
    pub errors: Vec<String>,
    pub report_url: Option<String>,
    pub status: ImportStatus,
}

impl ImportProgressInfo {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            total_count: 0,
            processed_count: 0,
            error_count: 0,
            description: description.into(),
            errors: Vec::new(),
            report_url: None,
            status: ImportStatus::Running,
        }
    }
}

/// Job request consumed from the job layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDataRequest {
    pub file_path: String,
    pub data_type: String,
}

impl ImportDataRequest {
    pub fn new(file_path: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            data_type: data_type.into(),
        }
    }
}
