use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use atelier_core::domain::customization::CustomizationSetting;
use atelier_core::domain::email::{EmailTemplate, EmailTemplateGroup, EmailTemplateId};
use atelier_core::domain::product::{Product, ProductId, ProductType};
use atelier_core::domain::rule::{LogicRule, RuleId};
use atelier_core::domain::site::SiteStyle;
use atelier_core::domain::variant::ProductVariant;
use atelier_core::sources::{SlugKey, SourceError};

pub mod customization;
pub mod email_template;
pub mod logic_rule;
pub mod memory;
pub mod product;
pub mod site_settings;
pub mod variant_image;

pub use customization::SqlCustomizationRepository;
pub use email_template::SqlEmailTemplateRepository;
pub use logic_rule::SqlLogicRuleRepository;
pub use memory::{
    InMemoryCustomizationRepository, InMemoryEmailTemplateRepository,
    InMemoryLogicRuleRepository, InMemoryProductRepository, InMemorySiteSettingsRepository,
    InMemoryVariantImageRepository,
};
pub use product::SqlProductRepository;
pub use site_settings::SqlSiteSettingsRepository;
pub use variant_image::SqlVariantImageRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for SourceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(error) => SourceError::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => SourceError::Decode(message),
        }
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn list_active(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CustomizationRepository: Send + Sync {
    /// Settings in display order, each with its options in display order.
    /// Inactive options are included; callers filter.
    async fn settings_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<CustomizationSetting>, RepositoryError>;

    /// Replaces the setting and all of its options.
    async fn save_setting(
        &self,
        product_id: &ProductId,
        setting: CustomizationSetting,
    ) -> Result<(), RepositoryError>;

    /// Explicit filename slugs of options used by products of this type.
    async fn filename_slugs(
        &self,
        product_type: &ProductType,
    ) -> Result<HashMap<SlugKey, String>, RepositoryError>;
}

#[async_trait]
pub trait LogicRuleRepository: Send + Sync {
    /// Every rule of the product, active or not, oldest first.
    async fn list_for_product(&self, product_id: &ProductId)
        -> Result<Vec<LogicRule>, RepositoryError>;
    async fn save(&self, rule: LogicRule) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &RuleId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait EmailTemplateRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<EmailTemplate>, RepositoryError>;
    async fn find_by_id(
        &self,
        id: &EmailTemplateId,
    ) -> Result<Option<EmailTemplate>, RepositoryError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<EmailTemplate>, RepositoryError>;
    async fn save(&self, template: EmailTemplate) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &EmailTemplateId) -> Result<bool, RepositoryError>;
    async fn list_groups(&self) -> Result<Vec<EmailTemplateGroup>, RepositoryError>;
    async fn save_group(&self, group: EmailTemplateGroup) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SiteSettingsRepository: Send + Sync {
    /// Stored style, or the default theme when none was saved yet.
    async fn site_style(&self) -> Result<SiteStyle, RepositoryError>;
    async fn save_site_style(&self, style: &SiteStyle) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VariantImageRepository: Send + Sync {
    /// Replaces the recorded variants of the product.
    async fn record(
        &self,
        product_id: &ProductId,
        variants: &[ProductVariant],
    ) -> Result<(), RepositoryError>;
    async fn list_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<ProductVariant>, RepositoryError>;
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&chrono::Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        })
}

pub(crate) fn parse_decimal(
    column: &str,
    value: &str,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    value.trim().parse::<rust_decimal::Decimal>().map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}
