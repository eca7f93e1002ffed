//! Paged reading of a delimited file.
//!
//! The source keeps one cursor for page fetching. Header discovery and the
//! total count run as isolated passes: they seek to the start of the stream,
//! scan it through a separate framing buffer and restore the cursor position,
//! so they can be called at any time without disturbing paging. Only the
//! current page is held in memory.

use crate::codec::RowCodec;
use crate::decoder::{DecodeErrorHandler, RecordDecoder};
use crate::io::Dialect;
use crate::model::{ImportRecord, Page};
use crate::schema::{HeaderMap, Importable, Schema};
use crate::{CatalogCsvError, CsvResult};
use csv_async::StringRecord;
use futures::{Stream, StreamExt};
use std::io::{self, SeekFrom};
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

pub struct ImportPagedDataSource<R, T> {
    rows: FramedRead<R, RowCodec>,
    dialect: Dialect,
    decoder: RecordDecoder,
    schema: Schema,
    page_size: usize,
    total_count: Option<usize>,
    header: Option<HeaderMap>,
    // Physical row number of the last row read by the paging cursor
    current_row: usize,
    rows_paged: usize,
    exhausted: bool,
    page: Page<T>,
}

struct Scan {
    header: Option<String>,
    data_rows: usize,
}

impl<R, T> ImportPagedDataSource<R, T>
where
    R: AsyncRead + AsyncSeek + Unpin + Send,
    T: Importable,
{
    /// Bind to a seekable stream. Fails with [`CatalogCsvError::Format`] when
    /// the stream has no header row.
    pub async fn open(stream: R, page_size: usize, dialect: Dialect) -> CsvResult<Self> {
        let codec = RowCodec::new(dialect.charset, dialect.max_row_bytes);
        let mut source = Self {
            rows: FramedRead::new(stream, codec),
            decoder: RecordDecoder::new(dialect.delimiter),
            dialect,
            schema: T::schema(),
            page_size: page_size.max(1),
            total_count: None,
            header: None,
            current_row: 0,
            rows_paged: 0,
            exhausted: false,
            page: Page::empty(0),
        };

        if source.isolated_scan(false).await?.header.is_none() {
            return Err(CatalogCsvError::Format(
                "the file does not contain a header row".to_string(),
            ));
        }

        Ok(source)
    }

    /// Replace the column binding. Ignored once fetching has started.
    pub fn register_schema(&mut self, schema: Schema) {
        if self.header.is_some() {
            warn!("schema registration ignored: fetching has already started");
            return;
        }
        self.schema = schema;
        // Header validity feeds the total count
        self.total_count = None;
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn current_page_number(&self) -> usize {
        self.page.number
    }

    pub fn page(&self) -> &Page<T> {
        &self.page
    }

    pub fn items(&self) -> &[ImportRecord<T>] {
        &self.page.items
    }

    /// Hand the current page over to the caller, leaving an empty page with
    /// the same number behind.
    pub fn take_page(&mut self) -> Page<T> {
        let number = self.page.number;
        std::mem::replace(&mut self.page, Page::empty(number))
    }

    /// Raw header row, or an empty string when the header does not carry the
    /// schema's required columns.
    pub async fn header_raw(&mut self) -> CsvResult<String> {
        let Some(header) = self.isolated_scan(false).await?.header else {
            return Ok(String::new());
        };

        if header_is_valid(self.decoder, &self.schema, &header).await {
            Ok(header)
        } else {
            Ok(String::new())
        }
    }

    /// Tokenized header row, whether or not it satisfies the schema.
    pub async fn header_fields(&mut self) -> CsvResult<StringRecord> {
        let Some(header) = self.isolated_scan(false).await?.header else {
            return Ok(StringRecord::new());
        };
        Ok(self
            .decoder
            .tokenize(&header)
            .await
            .unwrap_or_else(|_| StringRecord::new()))
    }

    /// Number of data rows, computed once with a full isolated pass.
    ///
    /// A header that fails schema validation is counted as one more row.
    pub async fn total_count(&mut self) -> CsvResult<usize> {
        if let Some(total) = self.total_count {
            return Ok(total);
        }

        let scan = self.isolated_scan(true).await?;
        let mut total = scan.data_rows;
        if let Some(header) = scan.header {
            if !header_is_valid(self.decoder, &self.schema, &header).await {
                total += 1;
            }
        }

        debug!(total, "counted data rows");
        self.total_count = Some(total);
        Ok(total)
    }

    /// Read the next page. Returns `false` with an empty page once every
    /// counted row has been paged or the stream is exhausted.
    ///
    /// Rows that fail to decode are left out of the page and passed to
    /// `errors`; they still count towards [`Page::rows_read`].
    pub async fn fetch(&mut self, errors: &mut dyn DecodeErrorHandler) -> CsvResult<bool> {
        let total = self.total_count().await?;
        let number = self.page.number;

        if self.exhausted || self.rows_paged >= total {
            self.page = Page::empty(number);
            return Ok(false);
        }

        if self.header.is_none() {
            let header = self.read_header().await?;
            self.header = Some(header);
        }
        let header = self
            .header
            .as_ref()
            .ok_or_else(|| CatalogCsvError::Format("the header row is not bound".to_string()))?;

        let mut items = Vec::with_capacity(self.page_size);
        let mut rows_read = 0;

        while rows_read < self.page_size {
            let Some((row, text)) = next_row(&mut self.rows, &mut self.current_row).await? else {
                self.exhausted = true;
                break;
            };
            rows_read += 1;

            match self.decoder.decode::<T>(&self.schema, header, row, text).await {
                Ok(record) => items.push(record),
                Err(e) => {
                    debug!(row = e.row, failure = %e.failure, "row skipped");
                    errors.on_decode_error(e);
                }
            }
        }

        self.rows_paged += rows_read;
        if rows_read == 0 {
            self.page = Page::empty(number);
            return Ok(false);
        }

        self.page = Page {
            number: number + 1,
            items,
            rows_read,
        };
        Ok(true)
    }

    async fn read_header(&mut self) -> CsvResult<HeaderMap> {
        let fields = match next_row(&mut self.rows, &mut self.current_row).await? {
            Some((_, text)) => self
                .decoder
                .tokenize(&text)
                .await
                .unwrap_or_else(|_| StringRecord::new()),
            None => StringRecord::new(),
        };

        let header = self.schema.bind(&fields);
        if !header.is_valid() {
            warn!(missing = ?header.missing_required(), "header row lacks required columns");
        }
        Ok(header)
    }

    /// Scan from the start of the stream and restore the paging position.
    async fn isolated_scan(&mut self, count_rows: bool) -> CsvResult<Scan> {
        let codec = RowCodec::new(self.dialect.charset, self.dialect.max_row_bytes);
        let inner = self.rows.get_mut();

        let position = inner.stream_position().await?;
        inner.seek(SeekFrom::Start(0)).await?;

        let scan = scan_rows(FramedRead::new(&mut *inner, codec), count_rows).await;

        inner.seek(SeekFrom::Start(position)).await?;
        scan
    }
}

async fn header_is_valid(decoder: RecordDecoder, schema: &Schema, header: &str) -> bool {
    match decoder.tokenize(header).await {
        Ok(fields) => schema.bind(&fields).is_valid(),
        Err(_) => false,
    }
}

/// Next non-blank row and its physical row number.
async fn next_row<S>(rows: &mut S, current_row: &mut usize) -> CsvResult<Option<(usize, String)>>
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    while let Some(text) = rows.next().await {
        let text = text.map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => CatalogCsvError::Format(e.to_string()),
            _ => CatalogCsvError::Io(e),
        })?;
        *current_row += 1;
        if !text.trim().is_empty() {
            return Ok(Some((*current_row, text)));
        }
    }
    Ok(None)
}

async fn scan_rows<S>(mut rows: S, count_rows: bool) -> CsvResult<Scan>
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    let mut scan = Scan {
        header: None,
        data_rows: 0,
    };
    let mut row = 0;

    while let Some((_, text)) = next_row(&mut rows, &mut row).await? {
        if scan.header.is_none() {
            scan.header = Some(text);
            if !count_rows {
                break;
            }
        } else {
            scan.data_rows += 1;
        }
    }

    Ok(scan)
}
