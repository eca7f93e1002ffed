use crate::config::{DEFAULT_DELIMITER, DEFAULT_MAX_ROW_BYTES};
use crate::CsvResult;
use std::path::{Path, PathBuf};
use tokio::fs::File;

/// Shape of a delimited file: shared by the input, the report and exports.
#[derive(Debug, Clone)]
pub struct Dialect {
    /// Field delimiter, e.g. `;` or `,`
    pub delimiter: u8,
    /// Which character encoding to expect (defaults to UTF-8)
    pub charset: &'static encoding_rs::Encoding,
    /// Longest physical row accepted before the stream is treated as unreadable
    pub max_row_bytes: usize,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            charset: encoding_rs::UTF_8,
            max_row_bytes: DEFAULT_MAX_ROW_BYTES,
        }
    }
}

impl Dialect {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Resolve a charset label such as `"utf-8"` or `"windows-1252"`.
    pub fn with_charset_label(mut self, label: &str) -> Option<Self> {
        self.charset = encoding_rs::Encoding::for_label(label.trim().as_bytes())?;
        Some(self)
    }

    pub fn delimiter_char(&self) -> char {
        char::from(self.delimiter)
    }
}

/// Open a local import file for paged reading.
pub async fn open_source(path: &Path) -> CsvResult<File> {
    Ok(File::open(path).await?)
}

/// `data.csv` -> `data_report.csv`, keeping the directory.
pub fn report_file_path(file_path: &Path) -> PathBuf {
    let stem = file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let file_name = match file_path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}_report.{ext}"),
        None => format!("{stem}_report"),
    };

    file_path.with_file_name(file_name)
}

/// Public location of a stored artifact.
///
/// With a base URL the path is appended to it; otherwise the local path is
/// returned as-is.
pub fn public_url(base_url: Option<&str>, path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    match base_url {
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches("./").trim_start_matches('/')
        ),
        None => path,
    }
}
