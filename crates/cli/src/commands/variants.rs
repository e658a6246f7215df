use std::sync::Arc;

use atelier_core::customization::rules::LogicRulesEngine;
use atelier_core::domain::product::ProductId;
use atelier_core::domain::variant::ProductVariant;
use atelier_core::sources::CatalogSource;
use atelier_core::variants::{FilenameService, SlugCache, VariantGenerator};
use atelier_db::repositories::{
    SqlCustomizationRepository, SqlLogicRuleRepository, SqlVariantImageRepository,
    VariantImageRepository,
};
use atelier_db::{connect_with_config, storage_lister_from_config};

use crate::commands::{load_config, runtime, CommandFailure, CommandResult};

/// Generates every image variant of a product, records the snapshot and
/// reports one line per variant.
pub fn run(product_id: &str) -> CommandResult {
    let config = match load_config("variants") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("variants") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    let product_id = ProductId(product_id.trim().to_string());

    let result = runtime.block_on(async {
        let storage = storage_lister_from_config(&config.storage)
            .map_err(|error| ("storage_config", error.to_string(), 2u8))?;
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let catalog = Arc::new(SqlCustomizationRepository::new(pool.clone()));
        let filenames = Arc::new(FilenameService::new(
            catalog.clone(),
            SlugCache::with_system_clock(config.customization.slug_cache_ttl()),
        ));
        let generator =
            VariantGenerator::new(filenames, storage, config.storage.variant_bucket.clone());

        let outcome = async {
            let product = catalog
                .product(&product_id)
                .await
                .map_err(|error| ("catalog", error.to_string(), 4u8))?
                .ok_or_else(|| {
                    ("not_found", format!("product `{product_id}` was not found"), 7u8)
                })?;
            let settings = catalog
                .settings_for_product(&product_id)
                .await
                .map_err(|error| ("catalog", error.to_string(), 4u8))?;
            let rules = SqlLogicRuleRepository::new(pool.clone());
            let engine = LogicRulesEngine::load(&rules, &product_id).await;

            let (variants, stats) =
                generator.generate_variants_with_stats(&engine, &product, &settings).await;
            SqlVariantImageRepository::new(pool.clone())
                .record(&product_id, &variants)
                .await
                .map_err(|error| ("variant_snapshot", error.to_string(), 5u8))?;

            let mut lines = vec![format!(
                "{} variant(s) for {product_id} (combinations: {}, rejected by rules: {}, duplicate filenames: {}, existing images: {})",
                variants.len(),
                stats.combinations,
                stats.rejected_by_rules,
                stats.duplicate_filenames,
                stats.existing_images
            )];
            lines.extend(variants.iter().map(render_variant));
            Ok::<String, CommandFailure>(lines.join("\n"))
        }
        .await;

        pool.close().await;
        outcome
    });

    match result {
        Ok(message) => CommandResult::success("variants", message),
        Err(failure) => CommandResult::from_failure("variants", failure),
    }
}

fn render_variant(variant: &ProductVariant) -> String {
    match &variant.image_path {
        Some(path) => format!("  - {}: {} [stored at {path}]", variant.display_name, variant.filename),
        None => format!("  - {}: {} [missing]", variant.display_name, variant.filename),
    }
}
