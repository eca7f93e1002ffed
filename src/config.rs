//! Import/export settings.
//!
//! Settings are plain values handed to importers and exporters when they are
//! built; nothing here is read from global state.

use crate::io::Dialect;

/// Rows per page fetched from the paged data source.
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_DELIMITER: u8 = b';';
/// 1 MiB; a file with no line breaks fails instead of being buffered whole.
pub const DEFAULT_MAX_ROW_BYTES: usize = 1 << 20;
pub const DEFAULT_IMPORT_LIMIT_OF_LINES: usize = 10_000;
/// Megabytes
pub const DEFAULT_IMPORT_FILE_MAX_SIZE_MB: u64 = 1;
pub const DEFAULT_EXPORT_LIMIT_OF_LINES: usize = 10_000;

pub const MBYTE: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub page_size: usize,
    pub dialect: Dialect,
    /// Maximum data rows accepted by pre-flight validation
    pub limit_of_lines: usize,
    /// Maximum file size accepted by pre-flight validation, in megabytes
    pub file_max_size_mb: u64,
    /// Public base URL under which report files are served
    pub report_base_url: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            dialect: Dialect::default(),
            limit_of_lines: DEFAULT_IMPORT_LIMIT_OF_LINES,
            file_max_size_mb: DEFAULT_IMPORT_FILE_MAX_SIZE_MB,
            report_base_url: None,
        }
    }
}

impl ImportConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.dialect = self.dialect.with_delimiter(delimiter);
        self
    }

    pub fn file_max_size_bytes(&self) -> u64 {
        self.file_max_size_mb.saturating_mul(MBYTE)
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub dialect: Dialect,
    pub limit_of_lines: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            limit_of_lines: DEFAULT_EXPORT_LIMIT_OF_LINES,
        }
    }
}
