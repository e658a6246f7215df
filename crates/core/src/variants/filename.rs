use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::customization::setting_ids;
use crate::domain::product::ProductType;
use crate::sources::FilenameMappingSource;
use crate::variants::cache::{SlugCache, SlugMap};

pub const DEFAULT_EXTENSION: &str = "webp";

/// Extensions tried, in order, when matching a filename stem against storage.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["webp", "PNG", "png"];

const DIAMOND: &str = "diamond";

/// Maps option selections onto the naming scheme of the pre-rendered image
/// library, using backend-maintained slugs cached per product type.
pub struct FilenameService {
    source: Arc<dyn FilenameMappingSource>,
    cache: SlugCache,
}

impl FilenameService {
    pub fn new(source: Arc<dyn FilenameMappingSource>, cache: SlugCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &SlugCache {
        &self.cache
    }

    async fn slugs(&self, product_type: &ProductType) -> SlugMap {
        if let Some(cached) = self.cache.get(product_type) {
            return cached;
        }

        match self.source.filename_slugs(product_type).await {
            Ok(slugs) => {
                debug!(
                    event_name = "filename.cache.loaded",
                    product_type = %product_type,
                    slug_count = slugs.len(),
                    "filename slugs loaded"
                );
                let slugs = Arc::new(slugs);
                self.cache.insert(product_type.clone(), Arc::clone(&slugs));
                slugs
            }
            Err(error) => {
                warn!(
                    event_name = "filename.cache.load_failed",
                    product_type = %product_type,
                    error = %error,
                    "filename slugs unavailable; falling back to option ids"
                );
                Arc::new(HashMap::new())
            }
        }
    }

    pub async fn slug_for(
        &self,
        product_type: &ProductType,
        setting_id: &str,
        option_id: &str,
    ) -> String {
        let slugs = self.slugs(product_type).await;
        lookup(&slugs, setting_id, option_id)
    }

    pub async fn filename_stem<S: AsRef<str>>(
        &self,
        product_type: &ProductType,
        selections: &[(S, S)],
    ) -> String {
        let slugs = self.slugs(product_type).await;
        compose_filename_stem(product_type, selections, |setting_id, option_id| {
            lookup(&slugs, setting_id, option_id)
        })
    }

    pub async fn generate_dynamic_filename<S: AsRef<str>>(
        &self,
        product_type: &ProductType,
        selections: &[(S, S)],
    ) -> String {
        format!("{}.{DEFAULT_EXTENSION}", self.filename_stem(product_type, selections).await)
    }

    pub fn invalidate(&self, product_type: &ProductType) -> bool {
        self.cache.invalidate(product_type)
    }

    /// Clears the cache after an admin edit and reloads every product type
    /// that was cached before. Returns the product types re-warmed.
    pub async fn refresh_after_db_change(&self) -> Vec<ProductType> {
        let product_types = self.cache.clear();
        for product_type in &product_types {
            self.slugs(product_type).await;
        }

        info!(
            event_name = "filename.cache.refreshed",
            product_type_count = product_types.len(),
            "filename slug cache refreshed"
        );
        product_types
    }
}

fn lookup(slugs: &HashMap<(String, String), String>, setting_id: &str, option_id: &str) -> String {
    slugs
        .get(&(setting_id.to_string(), option_id.to_string()))
        .filter(|slug| !slug.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| option_id.to_string())
}

/// Builds `<product>-<chain>-<stones>-<metal>-<extras...>` from selections.
///
/// Chain, stones and metal land in fixed slots whatever their input order.
/// Stones: a diamond first stone yields to a chosen second stone, any other
/// first stone is joined with the second, and a lone stone stands alone.
/// Options of any other setting are appended in the order given.
pub fn compose_filename_stem<S, F>(
    product_type: &ProductType,
    selections: &[(S, S)],
    slug: F,
) -> String
where
    S: AsRef<str>,
    F: Fn(&str, &str) -> String,
{
    let mut chain = None;
    let mut first_stone = None;
    let mut second_stone = None;
    let mut metal = None;
    let mut extras = Vec::new();

    for (setting_id, option_id) in selections {
        let (setting_id, option_id) = (setting_id.as_ref(), option_id.as_ref());
        if option_id.trim().is_empty() {
            continue;
        }

        match setting_id {
            setting_ids::CHAIN_TYPE => chain = Some(slug(setting_id, option_id)),
            setting_ids::FIRST_STONE => {
                first_stone = Some((option_id, slug(setting_id, option_id)));
            }
            setting_ids::SECOND_STONE => second_stone = Some(slug(setting_id, option_id)),
            setting_ids::METAL => metal = Some(slug(setting_id, option_id)),
            _ => extras.push(slug(setting_id, option_id)),
        }
    }

    let mut segments = vec![product_type.slug().to_string()];
    segments.extend(chain);
    match (first_stone, second_stone) {
        (Some((DIAMOND, _)), Some(second)) => segments.push(second),
        (Some((_, first)), Some(second)) => {
            segments.push(first);
            segments.push(second);
        }
        (Some((_, first)), None) => segments.push(first),
        (None, Some(second)) => segments.push(second),
        (None, None) => {}
    }
    segments.extend(metal);
    segments.extend(extras);

    segments.join("-")
}
