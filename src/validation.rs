//! Business-rule validation of decoded pages.
//!
//! A [`Validator`] sees a whole page at once so that rules spanning records
//! (uniqueness, references between rows) can be checked. It returns every
//! violation it finds; the engine merges violations per row.

use crate::model::ImportRecord;
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    MissingRequiredValues,
    ExceedingMaxLength,
    ArrayValuesExceedingMaxLength,
    InvalidValue,
    NotUniqueValue,
    NotUniqueMultiValue,
    CycleSelfReference,
    MainProductIsVariation,
}

impl ValidationErrorKind {
    /// Machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationErrorKind::MissingRequiredValues => "missing-required-values",
            ValidationErrorKind::ExceedingMaxLength => "exceeding-max-length",
            ValidationErrorKind::ArrayValuesExceedingMaxLength => "array-values-exceeding-max-length",
            ValidationErrorKind::InvalidValue => "invalid-value",
            ValidationErrorKind::NotUniqueValue => "not-unique-value",
            ValidationErrorKind::NotUniqueMultiValue => "not-unique-multi-value",
            ValidationErrorKind::CycleSelfReference => "cycle-self-reference",
            ValidationErrorKind::MainProductIsVariation => "main-product-is-variation",
        }
    }
}

/// One rule violation for one record of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Index of the record within the validated page
    pub record: usize,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl Violation {
    pub fn new(record: usize, kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            record,
            kind,
            message: message.into(),
        }
    }

    pub fn missing_required_value(record: usize, column: &str) -> Self {
        Self::new(
            record,
            ValidationErrorKind::MissingRequiredValues,
            format!("The required value in column '{column}' is missing."),
        )
    }

    pub fn exceeding_max_length(record: usize, column: &str, max: usize) -> Self {
        Self::new(
            record,
            ValidationErrorKind::ExceedingMaxLength,
            format!("Value in column '{column}' may have maximum {max} characters."),
        )
    }

    pub fn array_values_exceeding_max_length(record: usize, column: &str, max: usize) -> Self {
        Self::new(
            record,
            ValidationErrorKind::ArrayValuesExceedingMaxLength,
            format!(
                "Every value in column '{column}' may have maximum {max} characters. The number of values is unlimited."
            ),
        )
    }

    pub fn invalid_value(record: usize, column: &str) -> Self {
        Self::new(
            record,
            ValidationErrorKind::InvalidValue,
            format!("This row has invalid value in the column '{column}'."),
        )
    }

    pub fn not_unique_value(record: usize, column: &str) -> Self {
        Self::new(
            record,
            ValidationErrorKind::NotUniqueValue,
            format!("Value in column '{column}' should be unique."),
        )
    }

    pub fn not_unique_multi_value(record: usize, column: &str) -> Self {
        Self::new(
            record,
            ValidationErrorKind::NotUniqueMultiValue,
            format!("Values in column '{column}' should be unique for the item."),
        )
    }

    pub fn cycle_self_reference(record: usize) -> Self {
        Self::new(
            record,
            ValidationErrorKind::CycleSelfReference,
            "The main product id is the same as product. It means self cycle reference.",
        )
    }

    pub fn main_product_is_variation(record: usize) -> Self {
        Self::new(
            record,
            ValidationErrorKind::MainProductIsVariation,
            "The main product is variation. You should not import variations for variations.",
        )
    }
}

#[async_trait]
pub trait Validator<T>: Send + Sync {
    async fn validate(&self, records: &[ImportRecord<T>]) -> anyhow::Result<Vec<Violation>>;
}

/// Accepts every record.
pub struct AcceptAll;

#[async_trait]
impl<T> Validator<T> for AcceptAll
where
    T: Send + Sync + 'static,
{
    async fn validate(&self, _records: &[ImportRecord<T>]) -> anyhow::Result<Vec<Violation>> {
        Ok(Vec::new())
    }
}

/// Group violations by record, keeping the order of first appearance, and
/// join each record's messages with a space.
pub fn merge_by_record(violations: Vec<Violation>) -> Vec<(usize, String)> {
    let mut order: Vec<usize> = Vec::new();
    let mut messages: HashMap<usize, Vec<String>> = HashMap::new();

    for violation in violations {
        let entry = messages.entry(violation.record).or_default();
        if entry.is_empty() {
            order.push(violation.record);
        }
        entry.push(violation.message);
    }

    order
        .into_iter()
        .map(|record| {
            let joined = messages.remove(&record).unwrap_or_default().join(" ");
            (record, joined)
        })
        .collect()
}

/// Length check shared by entity validators.
pub(crate) fn check_max_length(
    violations: &mut Vec<Violation>,
    record: usize,
    column: &str,
    value: Option<&str>,
    max: usize,
) {
    if value.is_some_and(|v| v.chars().count() > max) {
        violations.push(Violation::exceeding_max_length(record, column, max));
    }
}
