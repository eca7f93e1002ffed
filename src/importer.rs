//! Shared import engine.
//!
//! [`CsvPagedDataImporter`] drives one job: discover header and total count,
//! then fetch, validate and report page by page until the source is exhausted,
//! cancellation is observed, or a fatal error stops the loop. Whatever the
//! exit, the report is flushed and one terminal snapshot is published.
//!
//! Entity kinds configure the engine (schema, validator, record sink) rather
//! than override it.

use crate::config::ImportConfig;
use crate::data_source::ImportPagedDataSource;
use crate::decoder::{DecodeErrorHandler, RowDecodeError};
use crate::errors_context::ImportErrorsContext;
use crate::file_validation::{validate_import_file, FileValidationError};
use crate::io::{open_source, public_url, report_file_path};
use crate::model::{ImportDataRequest, ImportError, ImportProgressInfo, ImportStatus, Page};
use crate::reporter::CsvImportReporter;
use crate::schema::{Importable, Schema};
use crate::validation::{merge_by_record, Validator};
use crate::{CatalogCsvError, CsvResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives progress snapshots: after discovery, after every page, on every
/// decode failure and once at the end.
pub trait ProgressSink: Send {
    fn report(&mut self, progress: &ImportProgressInfo);
}

impl<F> ProgressSink for F
where
    F: FnMut(&ImportProgressInfo) + Send,
{
    fn report(&mut self, progress: &ImportProgressInfo) {
        self(progress)
    }
}

/// Destination of records that passed decoding and validation.
#[async_trait]
pub trait RecordSink<T>: Send + Sync {
    async fn save(&self, records: Vec<T>) -> anyhow::Result<()>;
}

/// Drops valid records; useful for dry runs.
pub struct DiscardSink;

#[async_trait]
impl<T> RecordSink<T> for DiscardSink
where
    T: Send + 'static,
{
    async fn save(&self, _records: Vec<T>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Keeps valid records in memory.
pub struct CollectingSink<T> {
    records: Mutex<Vec<T>>,
}

impl<T> Default for CollectingSink<T> {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }
}

impl<T> CollectingSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<T> {
        self.records
            .lock()
            .map(|mut records| std::mem::take(&mut *records))
            .unwrap_or_default()
    }
}

#[async_trait]
impl<T> RecordSink<T> for CollectingSink<T>
where
    T: Send + 'static,
{
    async fn save(&self, records: Vec<T>) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("record sink lock poisoned"))?
            .extend(records);
        Ok(())
    }
}

/// One importer per data type, selected by the registry.
#[async_trait]
pub trait Importer: Send + Sync {
    fn data_type(&self) -> &str;

    /// Run an import job and return the terminal progress snapshot.
    ///
    /// Errors are returned only for invalid requests and when the report
    /// cannot be created; everything else ends up in the snapshot.
    async fn import(
        &self,
        request: &ImportDataRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> CsvResult<ImportProgressInfo>;

    /// Pre-flight checks for a file about to be imported.
    async fn validate_file(&self, path: &Path) -> CsvResult<Vec<FileValidationError>>;
}

enum PipelineExit {
    Completed,
    Cancelled,
}

pub struct CsvPagedDataImporter<T> {
    data_type: String,
    config: ImportConfig,
    validator: Arc<dyn Validator<T>>,
    sink: Arc<dyn RecordSink<T>>,
    schema: Option<Schema>,
    _record: PhantomData<fn() -> T>,
}

impl<T> CsvPagedDataImporter<T>
where
    T: Importable,
{
    pub fn new(
        data_type: impl Into<String>,
        config: ImportConfig,
        validator: Arc<dyn Validator<T>>,
        sink: Arc<dyn RecordSink<T>>,
    ) -> Self {
        Self {
            data_type: data_type.into(),
            config,
            validator,
            sink,
            schema: None,
            _record: PhantomData,
        }
    }

    /// Customize the column binding used for every job.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    fn effective_schema(&self) -> Schema {
        self.schema.clone().unwrap_or_else(T::schema)
    }

    fn validate_request(&self, request: &ImportDataRequest) -> CsvResult<()> {
        if request.file_path.trim().is_empty() {
            return Err(CatalogCsvError::InvalidRequest(
                "file path must not be empty".to_string(),
            ));
        }
        if request.data_type != self.data_type {
            return Err(CatalogCsvError::InvalidRequest(format!(
                "importer for '{}' cannot handle data type '{}'",
                self.data_type, request.data_type
            )));
        }
        Ok(())
    }

    /// Run the page loop over an opened stream.
    ///
    /// `stream` is the outcome of opening the input: a failure there is
    /// treated like any other fatal error. The reporter is finished before the
    /// terminal snapshot is composed.
    pub async fn import_stream<R, W>(
        &self,
        stream: CsvResult<R>,
        reporter: &mut CsvImportReporter<W>,
        report_url: String,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ImportProgressInfo
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut state = ImportProgressInfo::new("Import has started");
        let mut errors = ImportErrorsContext::new();

        let outcome = match stream {
            Ok(stream) => {
                self.run_pages(stream, reporter, &mut errors, &mut state, &mut *progress, cancel)
                    .await
            }
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(PipelineExit::Completed) => state.status = ImportStatus::Completed,
            Ok(PipelineExit::Cancelled) => {
                warn!(data_type = %self.data_type, processed = state.processed_count, "import cancelled");
                state.status = ImportStatus::Cancelled;
            }
            Err(e) => {
                error!(data_type = %self.data_type, error = %format!("{e:#}"), "import failed");
                handle_error(&mut *progress, &mut state, Some(format!("{e:#}")));
                state.status = ImportStatus::Failed;
            }
        }

        // Rows already counted when a fatal error stopped the page
        for error in errors.drain_ordered() {
            if let Err(e) = reporter.write(&error).await {
                error!(row = error.row, error = %e, "failed row could not be reported");
                state.errors.push(e.to_string());
                state.status = ImportStatus::Failed;
                break;
            }
        }

        if let Err(e) = reporter.finish().await {
            error!(error = %e, "report could not be flushed");
            state.errors.push(e.to_string());
            state.status = ImportStatus::Failed;
        }

        let completed = if state.error_count > 0 {
            "Import completed with errors"
        } else {
            "Import completed"
        };
        state.description = format!("{completed}: {}", imported_description(&state));

        if reporter.report_is_not_empty() {
            state.report_url = Some(report_url);
        }

        info!(
            data_type = %self.data_type,
            processed = state.processed_count,
            total = state.total_count,
            errors = state.error_count,
            "import finished"
        );
        progress.report(&state);
        state
    }

    async fn run_pages<R, W>(
        &self,
        stream: R,
        reporter: &mut CsvImportReporter<W>,
        errors: &mut ImportErrorsContext,
        state: &mut ImportProgressInfo,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> anyhow::Result<PipelineExit>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut source = ImportPagedDataSource::<R, T>::open(
            stream,
            self.config.page_size,
            self.config.dialect.clone(),
        )
        .await?;

        if let Some(schema) = &self.schema {
            source.register_schema(schema.clone());
        }

        let header = source.header_raw().await?;
        if !header.is_empty() {
            reporter.write_header(&header).await?;
        }

        state.total_count = source.total_count().await?;
        progress.report(state);
        info!(data_type = %self.data_type, total = state.total_count, "import started");

        state.description = "Fetching...".to_string();
        progress.report(state);

        loop {
            if cancel.is_cancelled() {
                return Ok(PipelineExit::Cancelled);
            }

            let fetched = {
                let mut hooks = DecodeErrorCollector {
                    errors: &mut *errors,
                    state: &mut *state,
                    progress: &mut *progress,
                };
                source.fetch(&mut hooks).await?
            };
            if !fetched {
                break;
            }

            let page = source.take_page();
            let (number, rows_read) = (page.number, page.rows_read);
            self.process_page(page, errors, state).await?;

            for error in errors.drain_ordered() {
                reporter.write(&error).await?;
            }
            state.processed_count += rows_read;

            debug!(
                page = number,
                processed = state.processed_count,
                total = state.total_count,
                errors = state.error_count,
                "page imported"
            );

            if state.processed_count != state.total_count {
                state.description = imported_description(state);
                progress.report(state);
            }
        }

        Ok(PipelineExit::Completed)
    }

    /// Validate a page, record violations and hand valid records to the sink.
    async fn process_page(
        &self,
        page: Page<T>,
        errors: &mut ImportErrorsContext,
        state: &mut ImportProgressInfo,
    ) -> anyhow::Result<()> {
        let violations = self.validator.validate(&page.items).await?;

        let mut invalid = HashSet::new();
        for (index, message) in merge_by_record(violations) {
            let Some(record) = page.items.get(index) else {
                anyhow::bail!("validator reported a violation for unknown record {index}");
            };
            invalid.insert(index);

            let error = ImportError {
                row: record.row,
                raw_row: record.raw_record.clone(),
                error: message,
            };
            if errors.add(error) {
                state.error_count += 1;
            }
        }

        let valid: Vec<T> = page
            .items
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !invalid.contains(index))
            .map(|(_, record)| record.record)
            .collect();

        if !valid.is_empty() {
            self.sink.save(valid).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> Importer for CsvPagedDataImporter<T>
where
    T: Importable,
{
    fn data_type(&self) -> &str {
        &self.data_type
    }

    async fn import(
        &self,
        request: &ImportDataRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> CsvResult<ImportProgressInfo> {
        self.validate_request(request)?;

        let file_path = PathBuf::from(&request.file_path);
        let report_path = report_file_path(&file_path);
        let mut reporter =
            CsvImportReporter::create(&report_path, self.config.dialect.delimiter).await?;
        let report_url = public_url(self.config.report_base_url.as_deref(), &report_path);

        info!(data_type = %self.data_type, file = %file_path.display(), "opening import file");
        let stream = open_source(&file_path).await;

        Ok(self
            .import_stream(stream, &mut reporter, report_url, progress, cancel)
            .await)
    }

    async fn validate_file(&self, path: &Path) -> CsvResult<Vec<FileValidationError>> {
        validate_import_file::<T>(path, &self.effective_schema(), &self.config).await
    }
}

/// Routes decode failures into the errors context, publishing progress once
/// per newly reported row.
struct DecodeErrorCollector<'a, P: ?Sized> {
    errors: &'a mut ImportErrorsContext,
    state: &'a mut ImportProgressInfo,
    progress: &'a mut P,
}

impl<P> DecodeErrorHandler for DecodeErrorCollector<'_, P>
where
    P: ProgressSink + ?Sized,
{
    fn on_decode_error(&mut self, error: RowDecodeError) {
        if self.errors.contains_row(error.row) {
            return;
        }
        self.errors.add(error.into());
        self.state.error_count += 1;
        handle_error(&mut *self.progress, &mut *self.state, None);
    }
}

fn handle_error<P>(progress: &mut P, state: &mut ImportProgressInfo, error: Option<String>)
where
    P: ProgressSink + ?Sized,
{
    if let Some(error) = error {
        state.errors.push(error);
    }
    progress.report(state);
}

fn imported_description(state: &ImportProgressInfo) -> String {
    format!(
        "{} out of {} have been imported.",
        state.processed_count, state.total_count
    )
}
