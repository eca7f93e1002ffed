//! Paged, fault-tolerant CSV import and export for catalog entities.
//!
//! - Import: [`ImportPagedDataSource`] streams a seekable file page by page;
//!   [`CsvPagedDataImporter`] validates each page, writes failed rows to a
//!   report and publishes progress until done or cancelled.
//! - Export: [`CsvDataExporter`] writes pages from an external reader.
//!
//! Data shape:
//! - Rows are physical lines; row 1 is the header.
//! - Failures are reported per row as [`ImportError`], with the raw text.
#![cfg_attr(docsrs, feature(doc_cfg))]
//
mod codec;
pub mod config;
pub mod data_source;
pub mod decoder;
pub mod entities;
pub mod errors_context;
pub mod export;
pub mod file_validation;
pub mod importer;
pub mod io;
pub mod logging;
pub mod model;
pub mod registry;
pub mod reporter;
pub mod schema;
pub mod validation;

pub use crate::config::{ExportConfig, ImportConfig};
pub use crate::data_source::ImportPagedDataSource;
pub use crate::decoder::{DecodeErrorHandler, DecodeFailure, RowDecodeError};
pub use crate::errors_context::ImportErrorsContext;
pub use crate::export::{
    export_file_name, CsvDataExporter, ExportPagedDataSource, ExportProgressInfo, Exportable,
    VecExportSource,
};
pub use crate::file_validation::{validate_import_file, FileValidationError, FileValidationErrorKind};
pub use crate::importer::{
    CollectingSink, CsvPagedDataImporter, DiscardSink, Importer, ProgressSink, RecordSink,
};
pub use crate::io::Dialect;
pub use crate::model::{
    ImportDataRequest, ImportError, ImportProgressInfo, ImportRecord, ImportStatus, Page,
};
pub use crate::registry::{ImportJob, ImporterRegistry};
pub use crate::reporter::CsvImportReporter;
pub use crate::schema::{ColumnSpec, Importable, RowFields, Schema, ValueKind};
pub use crate::validation::{AcceptAll, ValidationErrorKind, Validator, Violation};

use thiserror::Error;

/// Error type returned by this crate.
#[derive(Debug, Error)]
pub enum CatalogCsvError {
    /// The stream cannot be read as a delimited file
    #[error("invalid file format: {0}")]
    Format(String),
    #[error("invalid import request: {0}")]
    InvalidRequest(String),
    #[error("unknown data type: {0}")]
    UnknownDataType(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv_async::Error),
}

pub type CsvResult<T> = std::result::Result<T, CatalogCsvError>;
