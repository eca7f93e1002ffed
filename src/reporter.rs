use crate::model::ImportError;
use crate::CsvResult;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

pub const ERROR_DESCRIPTION_COLUMN: &str = "Error description";

/// Append-only error report in the dialect of the imported file.
///
/// Line 1 is the original header plus an error column; every following line
/// is a failed row's raw text plus its reason. Call [`finish`](Self::finish)
/// on every exit path so buffered lines reach the sink.
pub struct CsvImportReporter<W = BufWriter<File>> {
    writer: W,
    delimiter: u8,
    path: Option<PathBuf>,
    rows_written: usize,
}

impl CsvImportReporter<BufWriter<File>> {
    /// Create (or truncate) the report file, creating parent directories.
    pub async fn create(path: impl AsRef<Path>, delimiter: u8) -> CsvResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = File::create(path).await?;
        let mut reporter = Self::from_writer(BufWriter::new(file), delimiter);
        reporter.path = Some(path.to_path_buf());
        Ok(reporter)
    }
}

impl<W> CsvImportReporter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn from_writer(writer: W, delimiter: u8) -> Self {
        Self {
            writer,
            delimiter,
            path: None,
            rows_written: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether at least one failed row was written.
    pub fn report_is_not_empty(&self) -> bool {
        self.rows_written > 0
    }

    pub async fn write_header(&mut self, header: &str) -> CsvResult<()> {
        let line = self.line(header, ERROR_DESCRIPTION_COLUMN);
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    pub async fn write(&mut self, error: &ImportError) -> CsvResult<()> {
        let line = self.line(&error.raw_row, &error.error);
        self.writer.write_all(line.as_bytes()).await?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush and release the sink.
    pub async fn finish(&mut self) -> CsvResult<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&self, raw: &str, reason: &str) -> String {
        let delimiter = char::from(self.delimiter);
        format!("{raw}{delimiter}{}\r\n", escape_field(reason, delimiter))
    }
}

/// Quote a field when it contains the delimiter, a quote or a line break.
fn escape_field(value: &str, delimiter: char) -> String {
    if value.contains([delimiter, '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_header_and_failed_rows() {
        let mut reporter = CsvImportReporter::from_writer(Vec::new(), b';');
        reporter.write_header("Product Name;Product SKU").await.unwrap();
        assert!(!reporter.report_is_not_empty());

        reporter
            .write(&ImportError {
                row: 2,
                raw_row: "Chair;".into(),
                error: "The required value in column 'Product SKU' is missing.".into(),
            })
            .await
            .unwrap();
        reporter.finish().await.unwrap();

        assert!(reporter.report_is_not_empty());
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(
            text,
            "Product Name;Product SKU;Error description\r\n\
             Chair;;The required value in column 'Product SKU' is missing.\r\n"
        );
    }

    #[test]
    fn reasons_with_delimiters_are_quoted() {
        assert_eq!(escape_field("a, b", ','), "\"a, b\"");
        assert_eq!(escape_field("say \"x\"", ';'), "\"say \"\"x\"\"\"");
        assert_eq!(escape_field("plain", ';'), "plain");
    }
}
