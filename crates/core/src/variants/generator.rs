use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use crate::customization::rules::LogicRulesEngine;
use crate::domain::{
    customization::{CustomizationOption, CustomizationSetting, CustomizationState},
    product::{Product, ProductType},
    variant::{ProductVariant, VariantOption},
};
use crate::sources::StorageLister;
use crate::variants::filename::{FilenameService, IMAGE_EXTENSIONS};
use crate::variants::generation::LookupGeneration;

/// Active options of every setting that changes the product photo. Settings
/// such as ring size or diamond origin never enter variant enumeration.
pub fn image_variant_groups(
    settings: &[CustomizationSetting],
) -> Vec<(&CustomizationSetting, Vec<&CustomizationOption>)> {
    settings
        .iter()
        .filter(|setting| setting.affects_image_variant)
        .filter_map(|setting| {
            let options: Vec<&CustomizationOption> =
                setting.options.iter().filter(|option| option.active).collect();
            (!options.is_empty()).then_some((setting, options))
        })
        .collect()
}

/// Every combination picking one element from each group, in group order.
pub fn cartesian_product<T: Clone>(groups: &[Vec<T>]) -> Vec<Vec<T>> {
    let Some((head, tail)) = groups.split_first() else {
        return vec![Vec::new()];
    };

    let rest = cartesian_product(tail);
    let mut combinations = Vec::with_capacity(head.len() * rest.len());
    for item in head {
        for suffix in &rest {
            let mut combination = Vec::with_capacity(suffix.len() + 1);
            combination.push(item.clone());
            combination.extend(suffix.iter().cloned());
            combinations.push(combination);
        }
    }
    combinations
}

/// Names found for one stem, tried in [`IMAGE_EXTENSIONS`] order.
fn match_stored_name(stem: &str, stored: &HashSet<String>) -> Option<String> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|extension| format!("{stem}.{extension}"))
        .find(|candidate| stored.contains(candidate))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VariantGenerationStats {
    pub combinations: usize,
    pub rejected_by_rules: usize,
    pub duplicate_filenames: usize,
    pub existing_images: usize,
}

pub struct VariantGenerator {
    filenames: Arc<FilenameService>,
    storage: Arc<dyn StorageLister>,
    bucket: String,
}

impl VariantGenerator {
    pub fn new(
        filenames: Arc<FilenameService>,
        storage: Arc<dyn StorageLister>,
        bucket: impl Into<String>,
    ) -> Self {
        Self { filenames, storage, bucket: bucket.into() }
    }

    pub fn filenames(&self) -> &FilenameService {
        &self.filenames
    }

    /// Lists the product type's folder once. A failed listing is treated as
    /// an empty folder so callers fall back to the base product image.
    async fn stored_names(&self, product_type: &ProductType) -> HashSet<String> {
        match self.storage.list(&self.bucket, product_type.slug()).await {
            Ok(names) => names.into_iter().collect(),
            Err(error) => {
                warn!(
                    event_name = "variants.storage.list_failed",
                    bucket = %self.bucket,
                    folder = %product_type,
                    error = %error,
                    "variant image listing failed; treating folder as empty"
                );
                HashSet::new()
            }
        }
    }

    pub async fn generate_variants(
        &self,
        engine: &LogicRulesEngine,
        product: &Product,
        settings: &[CustomizationSetting],
    ) -> Vec<ProductVariant> {
        self.generate_variants_with_stats(engine, product, settings).await.0
    }

    pub async fn generate_variants_with_stats(
        &self,
        engine: &LogicRulesEngine,
        product: &Product,
        settings: &[CustomizationSetting],
    ) -> (Vec<ProductVariant>, VariantGenerationStats) {
        let groups = image_variant_groups(settings);
        let option_groups: Vec<Vec<(&CustomizationSetting, &CustomizationOption)>> = groups
            .iter()
            .map(|(setting, options)| options.iter().map(|option| (*setting, *option)).collect())
            .collect();
        let combinations = cartesian_product(&option_groups);

        let mut stats =
            VariantGenerationStats { combinations: combinations.len(), ..Default::default() };
        let dedupe = product.product_type.dedupes_variant_filenames();
        let mut seen_filenames = HashSet::new();
        let mut variants = Vec::new();

        for combination in combinations {
            let state: CustomizationState = combination
                .iter()
                .map(|(setting, option)| (setting.id.clone(), option.id.clone()))
                .collect();
            let evaluation = engine.apply_rules(settings, &state);
            let survives = combination
                .iter()
                .all(|(setting, option)| evaluation.is_option_available(&setting.id, &option.id));
            if !survives {
                stats.rejected_by_rules += 1;
                continue;
            }

            let selections: Vec<(&str, &str)> = combination
                .iter()
                .map(|(setting, option)| (setting.id.as_str(), option.id.as_str()))
                .collect();
            let filename =
                self.filenames.generate_dynamic_filename(&product.product_type, &selections).await;
            if dedupe && !seen_filenames.insert(filename.clone()) {
                stats.duplicate_filenames += 1;
                continue;
            }

            let options: Vec<VariantOption> = combination
                .iter()
                .map(|(setting, option)| VariantOption {
                    setting_id: setting.id.clone(),
                    setting_title: setting.title.clone(),
                    option_id: option.id.clone(),
                    option_name: option.name.clone(),
                })
                .collect();
            variants.push(ProductVariant {
                display_name: display_name(product, &options),
                options,
                filename,
                image_path: None,
                exists: false,
            });
        }

        let stored = self.stored_names(&product.product_type).await;
        for variant in &mut variants {
            let stem =
                variant.filename.rsplit_once('.').map_or(variant.filename.as_str(), |(stem, _)| stem);
            if let Some(name) = match_stored_name(stem, &stored) {
                variant.image_path = Some(format!("{}/{name}", product.product_type.slug()));
                variant.filename = name;
                variant.exists = true;
                stats.existing_images += 1;
            }
        }

        info!(
            event_name = "variants.generated",
            product_id = %product.id.0,
            combinations = stats.combinations,
            rejected_by_rules = stats.rejected_by_rules,
            duplicate_filenames = stats.duplicate_filenames,
            variants = variants.len(),
            existing_images = stats.existing_images,
            "product variants generated"
        );

        (variants, stats)
    }

    /// Image path for the current selections, or `None` when no pre-rendered
    /// image exists and the base product image should be shown.
    pub async fn resolve_variant_image(
        &self,
        engine: &LogicRulesEngine,
        product: &Product,
        settings: &[CustomizationSetting],
        state: &CustomizationState,
    ) -> Option<String> {
        let evaluation = engine.apply_rules(settings, state);
        let selections: Vec<(&str, &str)> = image_variant_groups(&evaluation.settings)
            .into_iter()
            .filter_map(|(setting, _)| {
                state
                    .get(&setting.id)
                    .filter(|option_id| setting.has_option(option_id))
                    .map(|option_id| (setting.id.as_str(), option_id))
            })
            .collect();

        let stem = self.filenames.filename_stem(&product.product_type, &selections).await;
        let stored = self.stored_names(&product.product_type).await;
        match_stored_name(&stem, &stored)
            .map(|name| format!("{}/{name}", product.product_type.slug()))
    }
}

fn display_name(product: &Product, options: &[VariantOption]) -> String {
    if options.is_empty() {
        return product.name.clone();
    }
    let names: Vec<&str> = options.iter().map(|option| option.option_name.as_str()).collect();
    format!("{} - {}", product.name, names.join(" / "))
}

/// Storefront preview of one customization session. Each selection change
/// starts a lookup; a lookup superseded before it resolves is discarded.
pub struct PreviewSession {
    generator: Arc<VariantGenerator>,
    generation: LookupGeneration,
    current_image: Mutex<Option<String>>,
    applied: Mutex<BTreeMap<String, String>>,
}

impl PreviewSession {
    pub fn new(generator: Arc<VariantGenerator>) -> Self {
        Self {
            generator,
            generation: LookupGeneration::new(),
            current_image: Mutex::new(None),
            applied: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn current_image(&self) -> Option<String> {
        self.current_image.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Resolves the image for `state`. Returns `false` when a newer call
    /// started meanwhile and this result was dropped.
    pub async fn update(
        &self,
        engine: &LogicRulesEngine,
        product: &Product,
        settings: &[CustomizationSetting],
        state: &CustomizationState,
    ) -> bool {
        let ticket = self.generation.begin();
        let image = self.generator.resolve_variant_image(engine, product, settings, state).await;

        let mut current = self.current_image.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let committed = self.generation.commit_if_current(ticket, &mut *current, image);
        if committed {
            let mut applied = self.applied.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            *applied = state.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        }
        committed
    }

    /// Selections behind the currently displayed image.
    pub fn applied_state(&self) -> CustomizationState {
        self.applied.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone().into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::{cartesian_product, image_variant_groups, PreviewSession, VariantGenerator};
    use crate::customization::rules::LogicRulesEngine;
    use crate::domain::{
        customization::CustomizationState,
        product::{Product, ProductType},
        rule::RuleAction,
    };
    use crate::sources::{FilenameMappingSource, SlugKey, SourceError, StorageLister};
    use crate::test_support::{necklace_product, necklace_settings, rule, setting};
    use crate::variants::cache::{SlugCache, DEFAULT_SLUG_CACHE_TTL};
    use crate::variants::filename::FilenameService;

    struct NoSlugs;

    #[async_trait]
    impl FilenameMappingSource for NoSlugs {
        async fn filename_slugs(
            &self,
            _product_type: &ProductType,
        ) -> Result<HashMap<SlugKey, String>, SourceError> {
            Ok(HashMap::new())
        }
    }

    struct Folder(Vec<&'static str>);

    #[async_trait]
    impl StorageLister for Folder {
        async fn list(&self, _bucket: &str, _folder: &str) -> Result<Vec<String>, SourceError> {
            Ok(self.0.iter().map(|name| name.to_string()).collect())
        }
    }

    struct BrokenStorage;

    #[async_trait]
    impl StorageLister for BrokenStorage {
        async fn list(&self, _bucket: &str, _folder: &str) -> Result<Vec<String>, SourceError> {
            Err(SourceError::Unavailable("bucket offline".to_string()))
        }
    }

    fn generator(storage: Arc<dyn StorageLister>) -> VariantGenerator {
        let filenames = FilenameService::new(
            Arc::new(NoSlugs),
            SlugCache::with_system_clock(DEFAULT_SLUG_CACHE_TTL),
        );
        VariantGenerator::new(Arc::new(filenames), storage, "customization-item")
    }

    fn small_settings() -> Vec<crate::domain::customization::CustomizationSetting> {
        vec![
            setting("chain_type", &["cable", "black_leather"]),
            setting("first_stone", &["diamond", "emerald"]),
            setting("second_stone", &["ruby"]),
            crate::domain::customization::CustomizationSetting {
                affects_image_variant: false,
                ..setting("size", &["16in", "18in"])
            },
        ]
    }

    #[test]
    fn cartesian_product_enumerates_all_combinations_in_order() {
        let combinations = cartesian_product(&[vec![1, 2], vec![10, 20, 30]]);
        assert_eq!(combinations.len(), 6);
        assert_eq!(combinations[0], vec![1, 10]);
        assert_eq!(combinations[5], vec![2, 30]);
        assert_eq!(cartesian_product::<u8>(&[]), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn non_image_settings_and_inactive_options_are_excluded() {
        let mut settings = necklace_settings();
        settings[3].options[1].active = false;

        let groups = image_variant_groups(&settings);
        let ids: Vec<_> = groups.iter().map(|(setting, _)| setting.id.as_str()).collect();
        assert_eq!(ids, vec!["chain_type", "first_stone", "second_stone", "metal"]);
        assert_eq!(groups[3].1.len(), 1);
    }

    #[tokio::test]
    async fn rejected_combinations_and_duplicate_filenames_are_dropped() {
        let product = necklace_product();
        let engine = LogicRulesEngine::from_rules(
            product.id.clone(),
            vec![rule(
                "leather-no-emerald",
                ("chain_type", "black_leather"),
                RuleAction::ExcludeOptions,
                "first_stone",
                &["emerald"],
            )],
        );

        let (variants, stats) = generator(Arc::new(Folder(vec![])))
            .generate_variants_with_stats(&engine, &product, &small_settings())
            .await;

        assert_eq!(stats.combinations, 4);
        assert_eq!(stats.rejected_by_rules, 1);
        assert_eq!(stats.duplicate_filenames, 0);
        let filenames: Vec<_> = variants.iter().map(|variant| variant.filename.as_str()).collect();
        assert_eq!(
            filenames,
            vec![
                "necklace-cable-ruby.webp",
                "necklace-cable-emerald-ruby.webp",
                "necklace-black_leather-ruby.webp",
            ]
        );
        assert!(variants.iter().all(|variant| variant.options.iter().all(|o| o.setting_id != "size")));
    }

    struct SharedMetalSlugs;

    #[async_trait]
    impl FilenameMappingSource for SharedMetalSlugs {
        async fn filename_slugs(
            &self,
            _product_type: &ProductType,
        ) -> Result<HashMap<SlugKey, String>, SourceError> {
            Ok(HashMap::from([
                (("metal".to_string(), "white_gold".to_string()), "white_gold".to_string()),
                (("metal".to_string(), "white_gold_14k".to_string()), "white_gold".to_string()),
            ]))
        }
    }

    #[tokio::test]
    async fn necklaces_and_bracelets_keep_first_variant_per_filename() {
        let filenames = FilenameService::new(
            Arc::new(SharedMetalSlugs),
            SlugCache::with_system_clock(DEFAULT_SLUG_CACHE_TTL),
        );
        let generator = VariantGenerator::new(
            Arc::new(filenames),
            Arc::new(Folder(vec![])),
            "customization-item",
        );
        let engine = LogicRulesEngine::default();
        let settings = vec![
            setting("chain_type", &["cable"]),
            setting("metal", &["white_gold", "white_gold_14k"]),
        ];

        let necklace = necklace_product();
        let (variants, stats) =
            generator.generate_variants_with_stats(&engine, &necklace, &settings).await;
        assert_eq!(variants.len(), 1);
        assert_eq!(stats.duplicate_filenames, 1);
        assert_eq!(variants[0].filename, "necklace-cable-white_gold.webp");
        assert_eq!(variants[0].options[1].option_id, "white_gold");

        let bracelet = Product { product_type: ProductType::Bracelet, ..necklace.clone() };
        assert_eq!(generator.generate_variants(&engine, &bracelet, &settings).await.len(), 1);

        let ring = Product { product_type: ProductType::Ring, ..necklace };
        let rings = generator.generate_variants(&engine, &ring, &settings).await;
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0].filename, rings[1].filename);
    }

    #[tokio::test]
    async fn existing_images_match_any_supported_extension() {
        let product = necklace_product();
        let engine = LogicRulesEngine::default();
        let settings = vec![setting("chain_type", &["cable", "rope", "black_leather"])];
        let storage = Folder(vec!["necklace-cable.PNG", "necklace-rope.webp", "necklace-rope.png"]);

        let variants =
            generator(Arc::new(storage)).generate_variants(&engine, &product, &settings).await;

        assert_eq!(variants[0].filename, "necklace-cable.PNG");
        assert_eq!(variants[0].image_path.as_deref(), Some("necklace/necklace-cable.PNG"));
        assert_eq!(variants[1].filename, "necklace-rope.webp");
        assert!(!variants[2].exists);
        assert_eq!(variants[2].filename, "necklace-black_leather.webp");
        assert_eq!(variants[0].display_name, "Classic Necklace - cable");
    }

    #[tokio::test]
    async fn storage_failure_marks_variants_missing() {
        let product = necklace_product();
        let variants = generator(Arc::new(BrokenStorage))
            .generate_variants(&LogicRulesEngine::default(), &product, &small_settings())
            .await;

        assert_eq!(variants.len(), 4);
        assert!(variants.iter().all(|variant| !variant.exists));
    }

    #[tokio::test]
    async fn resolve_variant_image_uses_only_surviving_selections() {
        let product = necklace_product();
        let engine = LogicRulesEngine::default();
        let storage = Folder(vec!["necklace-cable-emerald-ruby.webp"]);
        let generator = generator(Arc::new(storage));

        let state = CustomizationState::new()
            .with("chain_type", "cable")
            .with("first_stone", "emerald")
            .with("second_stone", "ruby")
            .with("size", "18in");
        let image = generator.resolve_variant_image(&engine, &product, &small_settings(), &state).await;
        assert_eq!(image.as_deref(), Some("necklace/necklace-cable-emerald-ruby.webp"));

        let missing = state.clone().with("first_stone", "diamond");
        assert!(generator
            .resolve_variant_image(&engine, &product, &small_settings(), &missing)
            .await
            .is_none());
    }

    struct GatedStorage {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl StorageLister for GatedStorage {
        async fn list(&self, _bucket: &str, _folder: &str) -> Result<Vec<String>, SourceError> {
            self.gate.notified().await;
            Ok(vec!["necklace-cable.webp".to_string(), "necklace-rope.webp".to_string()])
        }
    }

    #[tokio::test]
    async fn superseded_preview_lookup_is_discarded() {
        let gate = Arc::new(Notify::new());
        let session = Arc::new(PreviewSession::new(Arc::new(generator(Arc::new(GatedStorage {
            gate: Arc::clone(&gate),
        })))));
        let product = necklace_product();
        let settings = vec![setting("chain_type", &["cable", "rope"])];
        let engine = LogicRulesEngine::default();

        let slow = {
            let session = Arc::clone(&session);
            let product = product.clone();
            let settings = settings.clone();
            let engine = engine.clone();
            tokio::spawn(async move {
                let state = CustomizationState::new().with("chain_type", "cable");
                session.update(&engine, &product, &settings, &state).await
            })
        };
        tokio::task::yield_now().await;

        let fast = {
            let session = Arc::clone(&session);
            let product = product.clone();
            let settings = settings.clone();
            let engine = engine.clone();
            tokio::spawn(async move {
                let state = CustomizationState::new().with("chain_type", "rope");
                session.update(&engine, &product, &settings, &state).await
            })
        };
        tokio::task::yield_now().await;

        gate.notify_waiters();
        let fast_committed = fast.await.expect("fast task");
        let slow_committed = slow.await.expect("slow task");

        assert!(fast_committed);
        assert!(!slow_committed);
        assert_eq!(session.current_image().as_deref(), Some("necklace/necklace-rope.webp"));
        assert_eq!(session.applied_state().get("chain_type"), Some("rope"));
    }
}
