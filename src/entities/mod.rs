//! The entity kinds the catalog imports and exports.

pub mod product;
pub mod review;

pub use product::{PhysicalProduct, PhysicalProductValidator};
pub use review::{EditorialReview, EditorialReviewValidator, ReviewRules};

pub const PHYSICAL_PRODUCT: &str = "PhysicalProduct";
pub const EDITORIAL_REVIEW: &str = "EditorialReview";

/// File name prefix used for exports of a data type.
pub fn export_prefix(data_type: &str) -> Option<&'static str> {
    match data_type {
        PHYSICAL_PRODUCT => Some("Physical_products"),
        EDITORIAL_REVIEW => Some("Descriptions"),
        _ => None,
    }
}
