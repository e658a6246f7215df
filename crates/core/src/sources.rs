//! Backend seams the customization engine reads through. The database and
//! object-storage crates implement these; tests use in-memory versions.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    customization::CustomizationSetting,
    product::{Product, ProductId, ProductType},
    rule::LogicRule,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend returned malformed data: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Key of a filename slug mapping: `(setting_id, option_id)`.
pub type SlugKey = (String, String);

#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Active rules for the product, oldest first.
    async fn active_rules(&self, product_id: &ProductId) -> Result<Vec<LogicRule>, SourceError>;
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn product(&self, product_id: &ProductId) -> Result<Option<Product>, SourceError>;

    /// Settings ordered for display, each carrying its options ordered for display.
    async fn settings_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<CustomizationSetting>, SourceError>;
}

#[async_trait]
pub trait FilenameMappingSource: Send + Sync {
    /// Explicit `filename_slug` values for every option used by the product type.
    async fn filename_slugs(
        &self,
        product_type: &ProductType,
    ) -> Result<HashMap<SlugKey, String>, SourceError>;
}

#[async_trait]
pub trait StorageLister: Send + Sync {
    /// Object names directly inside `folder` of `bucket`.
    async fn list(&self, bucket: &str, folder: &str) -> Result<Vec<String>, SourceError>;
}
