//! Pre-flight checks run before an import job is queued.

use crate::config::ImportConfig;
use crate::data_source::ImportPagedDataSource;
use crate::io::open_source;
use crate::schema::{Importable, Schema};
use crate::{CatalogCsvError, CsvResult};
use serde::Serialize;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Delimiters recognised when guessing that a file uses the wrong one.
const COMMON_DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileValidationErrorKind {
    FileNotExisted,
    ExceedingFileMaxSize,
    NoData,
    WrongDelimiter,
    ExceedingLineLimits,
    MissingRequiredColumns,
}

impl FileValidationErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            FileValidationErrorKind::FileNotExisted => "file-not-existed",
            FileValidationErrorKind::ExceedingFileMaxSize => "exceeding-file-max-size",
            FileValidationErrorKind::NoData => "no-data",
            FileValidationErrorKind::WrongDelimiter => "wrong-delimiter",
            FileValidationErrorKind::ExceedingLineLimits => "exceeding-line-limits",
            FileValidationErrorKind::MissingRequiredColumns => "missing-required-columns",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileValidationError {
    pub kind: FileValidationErrorKind,
    pub message: String,
}

impl FileValidationError {
    fn new(kind: FileValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Check that `path` can be imported as `T` with `config`.
///
/// Returns the problems found; an empty list means the file may be imported.
/// The file-level checks (existence, size, empty stream, delimiter) stop at
/// the first failure; header and line-count checks are reported together.
pub async fn validate_import_file<T>(
    path: &Path,
    schema: &Schema,
    config: &ImportConfig,
) -> CsvResult<Vec<FileValidationError>>
where
    T: Importable,
{
    use FileValidationErrorKind::*;

    let metadata = match fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Ok(vec![not_existed(path)]),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![not_existed(path)]),
        Err(e) => return Err(e.into()),
    };

    let max_bytes = config.file_max_size_bytes();
    if metadata.len() > max_bytes {
        return Ok(vec![FileValidationError::new(
            ExceedingFileMaxSize,
            format!(
                "The file size {} bytes exceeds the maximum of {} MB.",
                metadata.len(),
                config.file_max_size_mb
            ),
        )]);
    }

    let file = open_source(path).await?;
    let mut source =
        match ImportPagedDataSource::<_, T>::open(file, config.page_size, config.dialect.clone())
            .await
        {
            Ok(source) => source,
            Err(CatalogCsvError::Format(_)) => {
                return Ok(vec![FileValidationError::new(
                    NoData,
                    "The file does not contain any data.",
                )])
            }
            Err(e) => return Err(e),
        };
    source.register_schema(schema.clone());

    let header = source.header_fields().await?;
    let delimiter = config.dialect.delimiter_char();
    if header.len() == 1 {
        let only = header.get(0).unwrap_or_default();
        if let Some(found) = COMMON_DELIMITERS
            .iter()
            .find(|d| **d != delimiter && only.contains(**d))
        {
            debug!(expected = %delimiter, found = %found, "header split by another delimiter");
            return Ok(vec![FileValidationError::new(
                WrongDelimiter,
                format!("The file uses a wrong delimiter. Expected '{delimiter}'."),
            )]);
        }
    }

    let mut errors = Vec::new();
    let binding = schema.bind(&header);
    if !binding.is_valid() {
        errors.push(FileValidationError::new(
            MissingRequiredColumns,
            format!(
                "The file is missing required columns: {}.",
                binding.missing_required().join(", ")
            ),
        ));
    }

    let total = source.total_count().await?;
    if binding.is_valid() && total == 0 {
        errors.push(FileValidationError::new(
            NoData,
            "The file does not contain any data.",
        ));
    }
    if total > config.limit_of_lines {
        errors.push(FileValidationError::new(
            ExceedingLineLimits,
            format!(
                "The file has {total} lines, the maximum is {}.",
                config.limit_of_lines
            ),
        ));
    }

    Ok(errors)
}

fn not_existed(path: &Path) -> FileValidationError {
    FileValidationError::new(
        FileValidationErrorKind::FileNotExisted,
        format!("The file '{}' does not exist.", path.display()),
    )
}
