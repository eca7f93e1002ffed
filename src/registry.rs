//! Data type to importer lookup and the import job entry point.

use crate::config::ImportConfig;
use crate::entities::{
    EditorialReview, EditorialReviewValidator, PhysicalProduct, PhysicalProductValidator,
    ReviewRules, EDITORIAL_REVIEW, PHYSICAL_PRODUCT,
};
use crate::importer::{CsvPagedDataImporter, Importer, ProgressSink, RecordSink};
use crate::model::{ImportDataRequest, ImportProgressInfo};
use crate::{CatalogCsvError, CsvResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Default, Clone)]
pub struct ImporterRegistry {
    importers: HashMap<String, Arc<dyn Importer>>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with both catalog entity kinds.
    pub fn catalog(
        config: ImportConfig,
        rules: ReviewRules,
        products: Arc<dyn RecordSink<PhysicalProduct>>,
        reviews: Arc<dyn RecordSink<EditorialReview>>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CsvPagedDataImporter::new(
            PHYSICAL_PRODUCT,
            config.clone(),
            Arc::new(PhysicalProductValidator),
            products,
        )));
        registry.register(Arc::new(CsvPagedDataImporter::new(
            EDITORIAL_REVIEW,
            config,
            Arc::new(EditorialReviewValidator::new(rules)),
            reviews,
        )));
        registry
    }

    /// Add an importer, replacing any previous one for the same data type.
    pub fn register(&mut self, importer: Arc<dyn Importer>) {
        self.importers
            .insert(importer.data_type().to_string(), importer);
    }

    pub fn resolve(&self, data_type: &str) -> CsvResult<Arc<dyn Importer>> {
        self.importers
            .get(data_type)
            .cloned()
            .ok_or_else(|| CatalogCsvError::UnknownDataType(data_type.to_string()))
    }

    /// Registered data types, sorted.
    pub fn data_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.importers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// One background import: resolve the importer, run it, hand back the
/// terminal snapshot.
pub struct ImportJob {
    registry: ImporterRegistry,
}

impl ImportJob {
    pub fn new(registry: ImporterRegistry) -> Self {
        Self { registry }
    }

    pub async fn run(
        &self,
        request: &ImportDataRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> CsvResult<ImportProgressInfo> {
        let importer = self.registry.resolve(&request.data_type)?;
        info!(data_type = %request.data_type, file = %request.file_path, "import job started");
        importer.import(request, progress, cancel).await
    }
}
