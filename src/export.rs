//! Paged export of catalog entities to delimited files.
//!
//! Mirrors the import side: an external reader hands out pages, the exporter
//! writes them through a `csv_async` writer and reports progress after every
//! page. Cancellation is checked between pages.

use crate::config::ExportConfig;
use crate::entities::export_prefix;
use crate::{CatalogCsvError, CsvResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use csv_async::AsyncWriterBuilder;
use serde::Serialize;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// An entity kind that can be written as a delimited row.
pub trait Exportable: Send + Sync + 'static {
    /// Column names, matching the import schema so exports re-import cleanly.
    fn header() -> Vec<String>;
    fn to_row(&self) -> Vec<String>;
}

/// External reader that pages entities for export.
#[async_trait]
pub trait ExportPagedDataSource<T>: Send {
    async fn total_count(&mut self) -> anyhow::Result<usize>;

    /// Next page, or `None` once everything has been handed out.
    async fn fetch(&mut self) -> anyhow::Result<Option<Vec<T>>>;
}

/// Pages an in-memory vector.
pub struct VecExportSource<T> {
    items: std::vec::IntoIter<T>,
    total: usize,
    page_size: usize,
}

impl<T> VecExportSource<T> {
    pub fn new(items: Vec<T>, page_size: usize) -> Self {
        Self {
            total: items.len(),
            items: items.into_iter(),
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl<T> ExportPagedDataSource<T> for VecExportSource<T>
where
    T: Send,
{
    async fn total_count(&mut self) -> anyhow::Result<usize> {
        Ok(self.total)
    }

    async fn fetch(&mut self) -> anyhow::Result<Option<Vec<T>>> {
        let page: Vec<T> = self.items.by_ref().take(self.page_size).collect();
        Ok((!page.is_empty()).then_some(page))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportProgressInfo {
    pub total_count: usize,
    pub processed_count: usize,
    pub description: String,
    pub errors: Vec<String>,
}

impl ExportProgressInfo {
    fn new(description: impl Into<String>) -> Self {
        Self {
            total_count: 0,
            processed_count: 0,
            description: description.into(),
            errors: Vec::new(),
        }
    }
}

pub trait ExportProgressSink: Send {
    fn report(&mut self, progress: &ExportProgressInfo);
}

impl<F> ExportProgressSink for F
where
    F: FnMut(&ExportProgressInfo) + Send,
{
    fn report(&mut self, progress: &ExportProgressInfo) {
        self(progress)
    }
}

pub struct CsvDataExporter {
    config: ExportConfig,
}

impl CsvDataExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Write every page of `source` to `writer` and return the terminal
    /// progress snapshot. Failures are reported in its `errors`.
    pub async fn export<T, S, W>(
        &self,
        source: &mut S,
        writer: W,
        progress: &mut dyn ExportProgressSink,
        cancel: &CancellationToken,
    ) -> ExportProgressInfo
    where
        T: Exportable,
        S: ExportPagedDataSource<T> + ?Sized,
        W: AsyncWrite + Unpin + Send,
    {
        let mut state = ExportProgressInfo::new("Export has started");
        progress.report(&state);

        match self.write_pages(source, writer, &mut state, progress, cancel).await {
            Ok(true) => {
                state.description = "Export completed".to_string();
                info!(exported = state.processed_count, "export finished");
            }
            Ok(false) => {
                warn!(exported = state.processed_count, "export cancelled");
                state.description = format!(
                    "Export cancelled: {} out of {} have been exported.",
                    state.processed_count, state.total_count
                );
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "export failed");
                state.errors.push(format!("{e:#}"));
                state.description = "Export failed".to_string();
            }
        }

        progress.report(&state);
        state
    }

    /// Returns `false` when cancelled.
    async fn write_pages<T, S, W>(
        &self,
        source: &mut S,
        writer: W,
        state: &mut ExportProgressInfo,
        progress: &mut dyn ExportProgressSink,
        cancel: &CancellationToken,
    ) -> anyhow::Result<bool>
    where
        T: Exportable,
        S: ExportPagedDataSource<T> + ?Sized,
        W: AsyncWrite + Unpin + Send,
    {
        state.total_count = source.total_count().await?;
        if state.total_count > self.config.limit_of_lines {
            anyhow::bail!(
                "The number of records to export ({}) exceeds the limit of {} lines.",
                state.total_count,
                self.config.limit_of_lines
            );
        }

        let mut wtr = AsyncWriterBuilder::new()
            .delimiter(self.config.dialect.delimiter)
            .has_headers(false)
            .create_writer(writer);
        wtr.write_record(T::header()).await?;

        let mut completed = true;
        loop {
            if cancel.is_cancelled() {
                completed = false;
                break;
            }
            let Some(page) = source.fetch().await? else {
                break;
            };

            for item in &page {
                wtr.write_record(item.to_row()).await?;
            }
            state.processed_count += page.len();
            state.description = format!(
                "{} out of {} have been exported.",
                state.processed_count, state.total_count
            );
            debug!(exported = state.processed_count, total = state.total_count, "page exported");
            progress.report(state);
        }

        wtr.flush().await?;
        Ok(completed)
    }
}

/// `<prefix>_<yyyyMMddHHmmss>.csv` for a data type.
pub fn export_file_name<Tz>(data_type: &str, timestamp: &DateTime<Tz>) -> CsvResult<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let prefix = export_prefix(data_type)
        .ok_or_else(|| CatalogCsvError::UnknownDataType(data_type.to_string()))?;
    Ok(format!("{prefix}_{}.csv", timestamp.format("%Y%m%d%H%M%S")))
}
