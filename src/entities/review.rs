use crate::decoder::DecodeFailure;
use crate::export::Exportable;
use crate::model::ImportRecord;
use crate::schema::{ColumnSpec, Importable, RowFields, Schema};
use crate::validation::{check_max_length, Validator, Violation};
use async_trait::async_trait;
use std::collections::HashMap;

const PRODUCT_NAME: &str = "product_name";
const PRODUCT_SKU: &str = "product_sku";
const PRODUCT_ID: &str = "product_id";
const DESCRIPTION_ID: &str = "description_id";
const DESCRIPTION_TYPE: &str = "description_type";
const LANGUAGE: &str = "language";
const CONTENT: &str = "content";

const PRODUCT_ID_MAX: usize = 128;

/// Localized description of a product.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditorialReview {
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
    pub product_id: String,
    pub id: Option<String>,
    pub review_type: String,
    pub language: String,
    pub content: String,
}

impl Importable for EditorialReview {
    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSpec::new(PRODUCT_NAME, "Product Name"),
            ColumnSpec::new(PRODUCT_SKU, "Product SKU"),
            ColumnSpec::new(PRODUCT_ID, "Product Id").required(),
            ColumnSpec::new(DESCRIPTION_ID, "Description Id"),
            ColumnSpec::new(DESCRIPTION_TYPE, "Description Type").required(),
            ColumnSpec::new(LANGUAGE, "Language").required(),
            ColumnSpec::new(CONTENT, "Description Content").required(),
        ])
    }

    fn decode(row: &RowFields<'_>) -> Result<Self, DecodeFailure> {
        Ok(Self {
            product_name: row.text(PRODUCT_NAME),
            product_sku: row.text(PRODUCT_SKU),
            product_id: row.required_text(PRODUCT_ID)?,
            id: row.text(DESCRIPTION_ID),
            review_type: row.required_text(DESCRIPTION_TYPE)?,
            language: row.required_text(LANGUAGE)?,
            content: row.required_text(CONTENT)?,
        })
    }
}

impl Exportable for EditorialReview {
    fn header() -> Vec<String> {
        Self::schema()
            .header_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.product_name.clone().unwrap_or_default(),
            self.product_sku.clone().unwrap_or_default(),
            self.product_id.clone(),
            self.id.clone().unwrap_or_default(),
            self.review_type.clone(),
            self.language.clone(),
            self.content.clone(),
        ]
    }
}

/// Store settings the review validator checks against.
#[derive(Debug, Clone)]
pub struct ReviewRules {
    pub languages: Vec<String>,
    pub review_types: Vec<String>,
}

impl Default for ReviewRules {
    fn default() -> Self {
        Self {
            languages: vec!["en-US".to_string()],
            review_types: vec!["QuickReview".to_string(), "FullReview".to_string()],
        }
    }
}

fn listed(allowed: &[String], value: &str) -> bool {
    allowed.iter().any(|a| a.eq_ignore_ascii_case(value))
}

#[derive(Debug, Default)]
pub struct EditorialReviewValidator {
    rules: ReviewRules,
}

impl EditorialReviewValidator {
    pub fn new(rules: ReviewRules) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl Validator<EditorialReview> for EditorialReviewValidator {
    async fn validate(
        &self,
        records: &[ImportRecord<EditorialReview>],
    ) -> anyhow::Result<Vec<Violation>> {
        let mut violations = Vec::new();

        // (product id, type, language) must identify one review per page
        let mut keys: HashMap<(String, String, String), usize> = HashMap::new();
        for record in records {
            *keys.entry(review_key(&record.record)).or_default() += 1;
        }

        for (index, record) in records.iter().enumerate() {
            let review = &record.record;

            check_max_length(&mut violations, index, "Product Id", Some(review.product_id.as_str()), PRODUCT_ID_MAX);

            if !listed(&self.rules.languages, &review.language) {
                violations.push(Violation::invalid_value(index, "Language"));
            }
            if !listed(&self.rules.review_types, &review.review_type) {
                violations.push(Violation::invalid_value(index, "Description Type"));
            }

            if keys.get(&review_key(review)).copied().unwrap_or_default() > 1 {
                violations.push(Violation::not_unique_multi_value(index, "Product Id, Description Type, Language"));
            }
        }

        Ok(violations)
    }
}

fn review_key(review: &EditorialReview) -> (String, String, String) {
    (
        review.product_id.to_lowercase(),
        review.review_type.to_lowercase(),
        review.language.to_lowercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(row: usize, product_id: &str, review_type: &str, language: &str) -> ImportRecord<EditorialReview> {
        ImportRecord {
            row,
            raw_record: String::new(),
            record: EditorialReview {
                product_id: product_id.into(),
                review_type: review_type.into(),
                language: language.into(),
                content: "Nice".into(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn checks_configured_languages_and_types() {
        let records = vec![
            record(2, "p1", "QuickReview", "en-US"),
            record(3, "p1", "Teaser", "de-DE"),
        ];
        let violations = EditorialReviewValidator::default()
            .validate(&records)
            .await
            .unwrap();

        assert_eq!(
            violations,
            vec![
                Violation::invalid_value(1, "Language"),
                Violation::invalid_value(1, "Description Type"),
            ]
        );
    }

    #[tokio::test]
    async fn one_review_per_product_type_and_language() {
        let records = vec![
            record(2, "p1", "QuickReview", "en-US"),
            record(3, "P1", "quickreview", "en-us"),
            record(4, "p1", "FullReview", "en-US"),
        ];
        let violations = EditorialReviewValidator::default()
            .validate(&records)
            .await
            .unwrap();

        let flagged: Vec<usize> = violations.iter().map(|v| v.record).collect();
        assert_eq!(flagged, vec![0, 1]);
    }
}
