//! Row decoding and decode-failure classification.
//!
//! Each physical row is tokenized on its own, so a broken quote can never
//! swallow the rows after it. A row that cannot be decoded yields exactly one
//! [`RowDecodeError`], classified by the first check it fails:
//! malformed quoting, missing columns, empty required values, then values
//! that do not convert to their column type.

use crate::model::ImportRecord;
use crate::schema::{ColumnSpec, HeaderMap, Importable, RowFields, Schema};
use csv_async::{AsyncReaderBuilder, StringRecord};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Field boundaries cannot be determined (unclosed or stray quotes)
    BadData,
    /// Header columns with no field in this row
    MissingColumns(Vec<String>),
    /// Required columns whose value is empty
    MissingRequiredValues(Vec<String>),
    /// Column whose value does not convert to its type
    InvalidValue(String),
}

impl DecodeFailure {
    pub fn message(&self) -> String {
        match self {
            DecodeFailure::BadData => {
                "This row has invalid data. The data after field with not escaped quote was lost."
                    .to_string()
            }
            DecodeFailure::MissingColumns(columns) => format!(
                "This row has unclosed quote or missed columns: {}.",
                columns.join(", ")
            ),
            DecodeFailure::MissingRequiredValues(columns) if columns.len() == 1 => {
                format!("The required value in column '{}' is missing.", columns[0])
            }
            DecodeFailure::MissingRequiredValues(columns) => format!(
                "The required values in columns: {} - are missing.",
                columns.join(", ")
            ),
            DecodeFailure::InvalidValue(column) => {
                format!("This row has invalid value in the column '{column}'.")
            }
        }
    }
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// A row that could not be decoded, with its position and original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDecodeError {
    pub row: usize,
    pub raw_row: String,
    pub failure: DecodeFailure,
}

/// Receives decode failures synchronously while a page is being fetched.
pub trait DecodeErrorHandler: Send {
    fn on_decode_error(&mut self, error: RowDecodeError);
}

/// Drops every failure; used by passes that only need counts.
pub struct IgnoreDecodeErrors;

impl DecodeErrorHandler for IgnoreDecodeErrors {
    fn on_decode_error(&mut self, _error: RowDecodeError) {}
}

impl DecodeErrorHandler for Vec<RowDecodeError> {
    fn on_decode_error(&mut self, error: RowDecodeError) {
        self.push(error);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecordDecoder {
    delimiter: u8,
}

impl RecordDecoder {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Split one physical row into fields.
    pub async fn tokenize(&self, text: &str) -> Result<StringRecord, DecodeFailure> {
        if !quotes_well_formed(text.as_bytes(), self.delimiter) {
            return Err(DecodeFailure::BadData);
        }

        let mut rdr = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .buffer_capacity(text.len().max(64))
            .create_reader(text.as_bytes());

        let mut record = StringRecord::new();
        match rdr.read_record(&mut record).await {
            Ok(_) => Ok(record),
            Err(_) => Err(DecodeFailure::BadData),
        }
    }

    /// Decode one data row into a record of `T`.
    pub async fn decode<T: Importable>(
        &self,
        schema: &Schema,
        header: &HeaderMap,
        row: usize,
        raw_row: String,
    ) -> Result<ImportRecord<T>, RowDecodeError> {
        let decoded = match self.tokenize(&raw_row).await {
            Ok(fields) => match check_fields(schema, header, &fields) {
                Some(failure) => Err(failure),
                None => T::decode(&RowFields::new(schema, header, &fields)),
            },
            Err(failure) => Err(failure),
        };

        match decoded {
            Ok(record) => Ok(ImportRecord {
                row,
                raw_record: raw_row,
                record,
            }),
            Err(failure) => Err(RowDecodeError {
                row,
                raw_row,
                failure,
            }),
        }
    }
}

/// A quote may only wrap a whole field, and inside a wrapped field it must be
/// doubled.
fn quotes_well_formed(row: &[u8], delimiter: u8) -> bool {
    let mut bytes = row.iter().copied().peekable();

    loop {
        // Start of a field
        if bytes.peek() == Some(&b'"') {
            bytes.next();
            loop {
                match bytes.next() {
                    None => return false,
                    Some(b'"') => match bytes.peek() {
                        Some(&b'"') => {
                            bytes.next();
                        }
                        Some(&b) if b == delimiter => break,
                        None => return true,
                        Some(_) => return false,
                    },
                    Some(_) => {}
                }
            }
            // Closing quote was followed by the delimiter
            bytes.next();
        } else {
            loop {
                match bytes.next() {
                    None => return true,
                    Some(b'"') => return false,
                    Some(b) if b == delimiter => break,
                    Some(_) => {}
                }
            }
        }
    }
}

/// Shape, required-value and type checks shared by every entity kind.
fn check_fields(schema: &Schema, header: &HeaderMap, fields: &StringRecord) -> Option<DecodeFailure> {
    let names = header.names();

    if fields.len() < names.len() {
        return Some(DecodeFailure::MissingColumns(names[fields.len()..].to_vec()));
    }
    if !header.is_valid() {
        return Some(DecodeFailure::MissingColumns(header.missing_required().to_vec()));
    }

    let empty_required: Vec<String> = bound_columns(schema, header)
        .filter(|(column, index)| {
            column.required && fields.get(*index).map(str::trim).unwrap_or_default().is_empty()
        })
        .map(|(_, index)| names[index].clone())
        .collect();
    if !empty_required.is_empty() {
        return Some(DecodeFailure::MissingRequiredValues(empty_required));
    }

    bound_columns(schema, header)
        .find(|(column, index)| {
            let value = fields.get(*index).map(str::trim).unwrap_or_default();
            !value.is_empty() && !column.kind.accepts(value)
        })
        .map(|(_, index)| DecodeFailure::InvalidValue(names[index].clone()))
}

/// Schema columns present in the header, with their header index.
fn bound_columns<'a>(
    schema: &'a Schema,
    header: &'a HeaderMap,
) -> impl Iterator<Item = (&'a ColumnSpec, usize)> + 'a {
    schema
        .columns()
        .iter()
        .enumerate()
        .filter_map(move |(position, column)| header.index(position).map(|index| (column, index)))
}
