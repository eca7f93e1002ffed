//! Column-to-field binding for importable entities.
//!
//! A [`Schema`] lists the columns an entity expects. Binding it against a
//! file header yields a [`HeaderMap`]; decoders then read typed values through
//! [`RowFields`].

use crate::decoder::DecodeFailure;
use csv_async::StringRecord;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Decimal,
    Boolean,
}

impl ValueKind {
    /// Whether a non-empty value converts to this kind.
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        match self {
            ValueKind::Text => true,
            ValueKind::Integer => value.parse::<i64>().is_ok(),
            ValueKind::Decimal => value.parse::<f64>().map(f64::is_finite).unwrap_or(false),
            ValueKind::Boolean => parse_flag(value).is_some(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Stable field key used by decoders
    pub key: &'static str,
    /// Header name as it appears in files
    pub name: String,
    /// An empty value in this column is a decode failure
    pub required: bool,
    pub kind: ValueKind,
}

impl ColumnSpec {
    pub fn new(key: &'static str, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            required: false,
            kind: ValueKind::Text,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, key: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.key == key)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.key == key)
    }

    /// Bind a field to a different header name.
    pub fn rename(mut self, key: &str, name: impl Into<String>) -> Self {
        if let Some(column) = self.columns.iter_mut().find(|c| c.key == key) {
            column.name = name.into();
        }
        self
    }

    pub fn header_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Match header fields to columns, case-insensitively and ignoring
    /// surrounding whitespace.
    pub fn bind(&self, header: &StringRecord) -> HeaderMap {
        let names: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();

        let indices: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|column| {
                names
                    .iter()
                    .position(|name| name.eq_ignore_ascii_case(column.name.trim()))
            })
            .collect();

        let missing_required = self
            .columns
            .iter()
            .zip(&indices)
            .filter(|(column, index)| column.required && index.is_none())
            .map(|(column, _)| column.name.clone())
            .collect();

        HeaderMap {
            names,
            indices,
            missing_required,
        }
    }
}

/// A schema bound to one file header.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    names: Vec<String>,
    // One entry per schema column
    indices: Vec<Option<usize>>,
    missing_required: Vec<String>,
}

impl HeaderMap {
    /// Header field names in file order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_valid(&self) -> bool {
        self.missing_required.is_empty()
    }

    /// Required schema columns the header does not carry.
    pub fn missing_required(&self) -> &[String] {
        &self.missing_required
    }

    /// Header index of the schema column at `position`.
    pub fn index(&self, position: usize) -> Option<usize> {
        self.indices.get(position).copied().flatten()
    }
}

/// Typed view over one tokenized row.
pub struct RowFields<'a> {
    schema: &'a Schema,
    header: &'a HeaderMap,
    fields: &'a StringRecord,
}

impl<'a> RowFields<'a> {
    pub fn new(schema: &'a Schema, header: &'a HeaderMap, fields: &'a StringRecord) -> Self {
        Self {
            schema,
            header,
            fields,
        }
    }

    fn column_name(&self, key: &str) -> String {
        self.schema
            .column(key)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| key.to_string())
    }

    /// Trimmed value of a column, `None` when absent or empty.
    pub fn value(&self, key: &str) -> Option<&'a str> {
        let position = self.schema.position(key)?;
        let index = self.header.index(position)?;
        self.fields
            .get(index)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.value(key).map(str::to_string)
    }

    pub fn required_text(&self, key: &str) -> Result<String, DecodeFailure> {
        self.text(key)
            .ok_or_else(|| DecodeFailure::MissingRequiredValues(vec![self.column_name(key)]))
    }

    pub fn parse<V: FromStr>(&self, key: &str) -> Result<Option<V>, DecodeFailure> {
        self.value(key)
            .map(|v| {
                v.parse::<V>()
                    .map_err(|_| DecodeFailure::InvalidValue(self.column_name(key)))
            })
            .transpose()
    }

    pub fn flag(&self, key: &str) -> Result<Option<bool>, DecodeFailure> {
        self.value(key)
            .map(|v| parse_flag(v).ok_or_else(|| DecodeFailure::InvalidValue(self.column_name(key))))
            .transpose()
    }
}

/// An entity kind that can be decoded from a delimited row.
pub trait Importable: Sized + Send + Sync + 'static {
    /// Columns expected in import files.
    fn schema() -> Schema;

    /// Build a record from a row that already passed shape, required-value
    /// and type checks.
    fn decode(row: &RowFields<'_>) -> Result<Self, DecodeFailure>;
}
