pub mod config;
pub mod customization;
pub mod domain;
pub mod errors;
pub mod sources;
pub mod variants;

#[cfg(test)]
mod test_support;

pub use customization::{
    evaluate_customization,
    rules::{LogicRulesEngine, RulesEngineResult},
    selection::{apply_engine_selections, resolve_selections, SelectionLayers, SelectionSource},
    CustomizationEvaluation,
};
pub use domain::customization::{CustomizationOption, CustomizationSetting, CustomizationState};
pub use domain::product::{Product, ProductId, ProductType};
pub use domain::rule::{LogicRule, RuleAction, RuleId};
pub use domain::variant::{ProductVariant, VariantOption};
pub use errors::{ApplicationError, CheckoutErrorKind, DomainError, InterfaceError};
pub use sources::{CatalogSource, FilenameMappingSource, RuleSource, SourceError, StorageLister};
pub use variants::{FilenameService, SlugCache, VariantGenerator};
