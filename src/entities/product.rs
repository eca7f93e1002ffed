use crate::decoder::DecodeFailure;
use crate::export::Exportable;
use crate::model::ImportRecord;
use crate::schema::{ColumnSpec, Importable, RowFields, Schema, ValueKind};
use crate::validation::{check_max_length, Validator, Violation};
use async_trait::async_trait;
use std::collections::HashMap;

const NAME: &str = "name";
const ID: &str = "id";
const SKU: &str = "sku";
const OUTER_ID: &str = "outer_id";
const PRODUCT_TYPE: &str = "product_type";
const CATEGORY_ID: &str = "category_id";
const MAIN_PRODUCT_ID: &str = "main_product_id";
const CAN_BE_PURCHASED: &str = "can_be_purchased";
const VISIBLE: &str = "visible";
const TRACK_INVENTORY: &str = "track_inventory";
const PACKAGE_TYPE: &str = "package_type";
const LENGTH: &str = "length";
const WIDTH: &str = "width";
const HEIGHT: &str = "height";
const MEASURE_UNIT: &str = "measure_unit";
const WEIGHT: &str = "weight";
const WEIGHT_UNIT: &str = "weight_unit";
const TAX_TYPE: &str = "tax_type";
const VENDOR: &str = "vendor";
const PRIORITY: &str = "priority";

/// The only product type accepted in a physical product file.
pub const PHYSICAL_TYPE: &str = "Physical";

const NAME_MAX: usize = 1024;
const SKU_MAX: usize = 64;
const ID_MAX: usize = 128;
const ATTRIBUTE_MAX: usize = 64;
const VENDOR_MAX: usize = 128;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhysicalProduct {
    pub name: String,
    pub id: Option<String>,
    pub sku: String,
    pub outer_id: Option<String>,
    pub product_type: Option<String>,
    pub category_id: String,
    /// Set for variations
    pub main_product_id: Option<String>,
    pub can_be_purchased: Option<bool>,
    pub visible: Option<bool>,
    pub track_inventory: Option<bool>,
    pub package_type: Option<String>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub measure_unit: Option<String>,
    pub weight: Option<f64>,
    pub weight_unit: Option<String>,
    pub tax_type: Option<String>,
    pub vendor: Option<String>,
    pub priority: Option<i64>,
}

impl PhysicalProduct {
    pub fn is_variation(&self) -> bool {
        self.main_product_id.is_some()
    }
}

impl Importable for PhysicalProduct {
    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSpec::new(NAME, "Product Name").required(),
            ColumnSpec::new(ID, "Product Id"),
            ColumnSpec::new(SKU, "Product SKU").required(),
            ColumnSpec::new(OUTER_ID, "Product Outer Id"),
            ColumnSpec::new(PRODUCT_TYPE, "Product Type"),
            ColumnSpec::new(CATEGORY_ID, "Category Id").required(),
            ColumnSpec::new(MAIN_PRODUCT_ID, "Main Product Id"),
            ColumnSpec::new(CAN_BE_PURCHASED, "Can Be Purchased").kind(ValueKind::Boolean),
            ColumnSpec::new(VISIBLE, "Visible").kind(ValueKind::Boolean),
            ColumnSpec::new(TRACK_INVENTORY, "Track Inventory").kind(ValueKind::Boolean),
            ColumnSpec::new(PACKAGE_TYPE, "Package Type"),
            ColumnSpec::new(LENGTH, "Length").kind(ValueKind::Decimal),
            ColumnSpec::new(WIDTH, "Width").kind(ValueKind::Decimal),
            ColumnSpec::new(HEIGHT, "Height").kind(ValueKind::Decimal),
            ColumnSpec::new(MEASURE_UNIT, "Measure Unit"),
            ColumnSpec::new(WEIGHT, "Weight").kind(ValueKind::Decimal),
            ColumnSpec::new(WEIGHT_UNIT, "Weight Unit"),
            ColumnSpec::new(TAX_TYPE, "Tax Type"),
            ColumnSpec::new(VENDOR, "Vendor"),
            ColumnSpec::new(PRIORITY, "Priority").kind(ValueKind::Integer),
        ])
    }

    fn decode(row: &RowFields<'_>) -> Result<Self, DecodeFailure> {
        Ok(Self {
            name: row.required_text(NAME)?,
            id: row.text(ID),
            sku: row.required_text(SKU)?,
            outer_id: row.text(OUTER_ID),
            product_type: row.text(PRODUCT_TYPE),
            category_id: row.required_text(CATEGORY_ID)?,
            main_product_id: row.text(MAIN_PRODUCT_ID),
            can_be_purchased: row.flag(CAN_BE_PURCHASED)?,
            visible: row.flag(VISIBLE)?,
            track_inventory: row.flag(TRACK_INVENTORY)?,
            package_type: row.text(PACKAGE_TYPE),
            length: row.parse(LENGTH)?,
            width: row.parse(WIDTH)?,
            height: row.parse(HEIGHT)?,
            measure_unit: row.text(MEASURE_UNIT),
            weight: row.parse(WEIGHT)?,
            weight_unit: row.text(WEIGHT_UNIT),
            tax_type: row.text(TAX_TYPE),
            vendor: row.text(VENDOR),
            priority: row.parse(PRIORITY)?,
        })
    }
}

impl Exportable for PhysicalProduct {
    fn header() -> Vec<String> {
        Self::schema()
            .header_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn to_row(&self) -> Vec<String> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let flag = |v: Option<bool>| v.map(|b| b.to_string()).unwrap_or_default();
        let number = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();

        vec![
            self.name.clone(),
            text(&self.id),
            self.sku.clone(),
            text(&self.outer_id),
            text(&self.product_type),
            self.category_id.clone(),
            text(&self.main_product_id),
            flag(self.can_be_purchased),
            flag(self.visible),
            flag(self.track_inventory),
            text(&self.package_type),
            number(self.length),
            number(self.width),
            number(self.height),
            text(&self.measure_unit),
            number(self.weight),
            text(&self.weight_unit),
            text(&self.tax_type),
            text(&self.vendor),
            self.priority.map(|p| p.to_string()).unwrap_or_default(),
        ]
    }
}

/// Page-local business rules for physical products.
#[derive(Debug, Default)]
pub struct PhysicalProductValidator;

#[async_trait]
impl Validator<PhysicalProduct> for PhysicalProductValidator {
    async fn validate(
        &self,
        records: &[ImportRecord<PhysicalProduct>],
    ) -> anyhow::Result<Vec<Violation>> {
        let mut violations = Vec::new();

        let mut skus: HashMap<String, usize> = HashMap::new();
        for record in records {
            *skus.entry(record.record.sku.to_lowercase()).or_default() += 1;
        }
        let by_id: HashMap<&str, &PhysicalProduct> = records
            .iter()
            .filter_map(|r| r.record.id.as_deref().map(|id| (id, &r.record)))
            .collect();

        for (index, record) in records.iter().enumerate() {
            let product = &record.record;

            check_max_length(&mut violations, index, "Product Name", Some(product.name.as_str()), NAME_MAX);
            check_max_length(&mut violations, index, "Product SKU", Some(product.sku.as_str()), SKU_MAX);
            check_max_length(&mut violations, index, "Product Outer Id", product.outer_id.as_deref(), ID_MAX);
            check_max_length(&mut violations, index, "Package Type", product.package_type.as_deref(), ATTRIBUTE_MAX);
            check_max_length(&mut violations, index, "Measure Unit", product.measure_unit.as_deref(), ATTRIBUTE_MAX);
            check_max_length(&mut violations, index, "Weight Unit", product.weight_unit.as_deref(), ATTRIBUTE_MAX);
            check_max_length(&mut violations, index, "Tax Type", product.tax_type.as_deref(), ATTRIBUTE_MAX);
            check_max_length(&mut violations, index, "Vendor", product.vendor.as_deref(), VENDOR_MAX);

            if product
                .product_type
                .as_deref()
                .is_some_and(|t| !t.eq_ignore_ascii_case(PHYSICAL_TYPE))
            {
                violations.push(Violation::invalid_value(index, "Product Type"));
            }

            for (column, value) in [
                ("Length", product.length),
                ("Width", product.width),
                ("Height", product.height),
                ("Weight", product.weight),
            ] {
                if value.is_some_and(|v| v < 0.0) {
                    violations.push(Violation::invalid_value(index, column));
                }
            }

            if skus.get(&product.sku.to_lowercase()).copied().unwrap_or_default() > 1 {
                violations.push(Violation::not_unique_value(index, "Product SKU"));
            }

            if let Some(main) = product.main_product_id.as_deref() {
                if product.id.as_deref() == Some(main) {
                    violations.push(Violation::cycle_self_reference(index));
                } else if by_id.get(main).is_some_and(|p| p.is_variation()) {
                    violations.push(Violation::main_product_is_variation(index));
                }
            }
        }

        Ok(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    fn record(row: usize, product: PhysicalProduct) -> ImportRecord<PhysicalProduct> {
        ImportRecord {
            row,
            raw_record: String::new(),
            record: product,
        }
    }

    fn product(sku: &str) -> PhysicalProduct {
        PhysicalProduct {
            name: "Chair".into(),
            sku: sku.into(),
            category_id: "furniture".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn flags_duplicate_skus_on_every_occurrence() {
        let records = vec![
            record(2, product("A-1")),
            record(3, product("a-1")),
            record(4, product("B-2")),
        ];
        let violations = PhysicalProductValidator.validate(&records).await.unwrap();

        let flagged: Vec<usize> = violations
            .iter()
            .filter(|v| v.kind == ValidationErrorKind::NotUniqueValue)
            .map(|v| v.record)
            .collect();
        assert_eq!(flagged, vec![0, 1]);
    }

    #[tokio::test]
    async fn detects_variation_references() {
        let mut main = product("M");
        main.id = Some("p1".into());
        main.main_product_id = Some("p0".into());

        let mut variation = product("V");
        variation.id = Some("p2".into());
        variation.main_product_id = Some("p1".into());

        let mut cycle = product("C");
        cycle.id = Some("p3".into());
        cycle.main_product_id = Some("p3".into());

        let records = vec![record(2, main), record(3, variation), record(4, cycle)];
        let violations = PhysicalProductValidator.validate(&records).await.unwrap();

        assert_eq!(
            violations,
            vec![
                Violation::main_product_is_variation(1),
                Violation::cycle_self_reference(2),
            ]
        );
    }

    #[tokio::test]
    async fn rejects_other_product_types_and_negative_sizes() {
        let mut digital = product("D");
        digital.product_type = Some("Digital".into());
        digital.weight = Some(-1.0);

        let violations = PhysicalProductValidator
            .validate(&[record(2, digital)])
            .await
            .unwrap();
        assert_eq!(
            violations,
            vec![
                Violation::invalid_value(0, "Product Type"),
                Violation::invalid_value(0, "Weight"),
            ]
        );
    }

    #[test]
    fn export_row_matches_header_width() {
        assert_eq!(product("A").to_row().len(), PhysicalProduct::header().len());
    }
}
