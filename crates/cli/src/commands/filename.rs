use std::sync::Arc;

use atelier_core::domain::product::ProductType;
use atelier_core::variants::{FilenameService, SlugCache};
use atelier_db::connect_with_config;
use atelier_db::repositories::SqlCustomizationRepository;

use crate::commands::{load_config, runtime, CommandFailure, CommandResult};

/// Prints the variant image filename for `setting=option` pairs, in the
/// order given, using the slugs stored for the product type.
pub fn run(product_type: &str, selections: &[String]) -> CommandResult {
    let product_type = match product_type.parse::<ProductType>() {
        Ok(product_type) => product_type,
        Err(error) => {
            return CommandResult::failure("filename", "invalid_argument", error.to_string(), 2);
        }
    };
    let selections = match parse_selections(selections) {
        Ok(selections) => selections,
        Err(message) => return CommandResult::failure("filename", "invalid_argument", message, 2),
    };

    let config = match load_config("filename") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("filename") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let service = FilenameService::new(
            Arc::new(SqlCustomizationRepository::new(pool.clone())),
            SlugCache::with_system_clock(config.customization.slug_cache_ttl()),
        );

        let filename = service.generate_dynamic_filename(&product_type, &selections).await;
        pool.close().await;
        Ok::<String, CommandFailure>(filename)
    });

    match result {
        Ok(filename) => CommandResult::success("filename", filename),
        Err(failure) => CommandResult::from_failure("filename", failure),
    }
}

fn parse_selections(raw: &[String]) -> Result<Vec<(String, String)>, String> {
    raw.iter()
        .map(|pair| {
            let (setting_id, option_id) = pair
                .split_once('=')
                .map(|(setting_id, option_id)| (setting_id.trim(), option_id.trim()))
                .filter(|(setting_id, option_id)| !setting_id.is_empty() && !option_id.is_empty())
                .ok_or_else(|| format!("expected `setting=option`, got `{pair}`"))?;
            Ok((setting_id.to_string(), option_id.to_string()))
        })
        .collect()
}
