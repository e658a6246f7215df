use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use atelier_core::domain::customization::{
    CustomizationOption, CustomizationSetting, CustomizationState, SettingKind,
};
use atelier_core::domain::product::{Product, ProductId, ProductType};
use atelier_core::domain::rule::{LogicRule, RuleAction, RuleId};
use atelier_core::sources::{FilenameMappingSource, SlugKey, SourceError, StorageLister};
use atelier_core::variants::{compose_filename_stem, FilenameService, SlugCache, VariantGenerator};
use atelier_core::LogicRulesEngine;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

const SETTING_IDS: [&str; 5] = ["chain_type", "first_stone", "second_stone", "metal", "clasp"];
const OPTION_IDS: [&str; 5] = ["diamond", "ruby", "emerald", "cable", "white_gold"];

fn option(setting_id: &str, option_id: &str) -> CustomizationOption {
    CustomizationOption {
        id: option_id.to_string(),
        setting_id: setting_id.to_string(),
        name: option_id.to_string(),
        price: Decimal::new(1_000, 2),
        price_lab_grown: None,
        image_url: None,
        color_hex: None,
        filename_slug: None,
        active: true,
        display_order: 0,
    }
}

fn arb_settings() -> impl Strategy<Value = Vec<CustomizationSetting>> {
    prop::collection::vec(
        (prop::sample::subsequence(OPTION_IDS.to_vec(), 1..=OPTION_IDS.len()), any::<bool>()),
        SETTING_IDS.len(),
    )
    .prop_map(|groups| {
        groups
            .into_iter()
            .zip(SETTING_IDS)
            .enumerate()
            .map(|(index, ((option_ids, affects_image_variant), setting_id))| {
                CustomizationSetting {
                    id: setting_id.to_string(),
                    title: setting_id.replace('_', " "),
                    required: false,
                    affects_image_variant,
                    kind: SettingKind::Options,
                    display_order: index as i32,
                    options: option_ids.into_iter().map(|id| option(setting_id, id)).collect(),
                }
            })
            .collect()
    })
}

fn arb_action() -> impl Strategy<Value = RuleAction> {
    prop_oneof![
        Just(RuleAction::ExcludeOptions),
        Just(RuleAction::IncludeOnly),
        any::<bool>().prop_map(|required| RuleAction::SetRequirement { required }),
        (1i64..400).prop_map(|value| RuleAction::SetPriceMultiplier {
            multiplier: Decimal::new(value, 2)
        }),
        Just(RuleAction::ExcludeSetting),
        Just(RuleAction::AutoSelect),
        Just(RuleAction::ProposeSelection),
    ]
}

fn arb_rule() -> impl Strategy<Value = LogicRule> {
    (
        prop::sample::select(SETTING_IDS.to_vec()),
        prop::sample::select(OPTION_IDS.to_vec()),
        arb_action(),
        prop::sample::select(SETTING_IDS.to_vec()),
        prop::sample::subsequence(OPTION_IDS.to_vec(), 0..=3),
        0i64..1_000,
    )
        .prop_map(|(condition_setting, condition_option, action, target, targets, offset)| {
            LogicRule {
                id: RuleId(format!("rule-{offset}")),
                product_id: ProductId("prop-product".to_string()),
                name: "generated".to_string(),
                condition_setting_id: condition_setting.to_string(),
                condition_option_id: condition_option.to_string(),
                action,
                target_setting_id: target.to_string(),
                target_option_ids: targets.into_iter().map(str::to_string).collect(),
                active: true,
                created_at: Utc
                    .timestamp_opt(1_767_225_600 + offset, 0)
                    .single()
                    .unwrap_or_else(Utc::now),
            }
        })
}

fn arb_state() -> impl Strategy<Value = CustomizationState> {
    prop::collection::vec(
        (prop::sample::select(SETTING_IDS.to_vec()), prop::sample::select(OPTION_IDS.to_vec())),
        0..=SETTING_IDS.len(),
    )
    .prop_map(|pairs| {
        pairs.into_iter().map(|(setting, option)| (setting.to_string(), option.to_string())).collect()
    })
}

fn engine(rules: Vec<LogicRule>) -> LogicRulesEngine {
    LogicRulesEngine::from_rules(ProductId("prop-product".to_string()), rules)
}

fn option_ids(setting: &CustomizationSetting) -> Vec<&str> {
    setting.options.iter().map(|option| option.id.as_str()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn apply_rules_is_repeatable(
        settings in arb_settings(),
        rules in prop::collection::vec(arb_rule(), 0..8),
        state in arb_state(),
    ) {
        let engine = engine(rules);
        let first = engine.apply_rules(&settings, &state);
        let second = engine.apply_rules(&settings, &state);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn option_filters_never_grow_or_invent_options(
        settings in arb_settings(),
        rule in arb_rule(),
    ) {
        prop_assume!(matches!(rule.action, RuleAction::ExcludeOptions | RuleAction::IncludeOnly));
        let state = CustomizationState::new()
            .with(rule.condition_setting_id.clone(), rule.condition_option_id.clone());

        let result = engine(vec![rule.clone()]).apply_rules(&settings, &state);

        for before in &settings {
            let after = result.setting(&before.id);
            prop_assert!(after.is_some());
            let after = after.map(option_ids).unwrap_or_default();
            let before_ids = option_ids(before);
            prop_assert!(after.len() <= before_ids.len());
            prop_assert!(after.iter().all(|id| before_ids.contains(id)));
            if before.id == rule.target_setting_id {
                let targeted = |id: &&str| rule.target_option_ids.iter().any(|target| target == id);
                match rule.action {
                    RuleAction::ExcludeOptions => prop_assert!(!after.iter().any(targeted)),
                    _ => prop_assert!(after.iter().all(targeted)),
                }
            }
        }
    }

    #[test]
    fn rules_after_setting_exclusion_are_no_ops(
        settings in arb_settings(),
        follow_up in arb_rule(),
        target_index in 0..SETTING_IDS.len(),
    ) {
        let target = SETTING_IDS[target_index];
        let mut excluding = follow_up.clone();
        excluding.id = RuleId("exclude-first".to_string());
        excluding.action = RuleAction::ExcludeSetting;
        excluding.target_setting_id = target.to_string();
        let mut later = follow_up;
        later.condition_setting_id = excluding.condition_setting_id.clone();
        later.condition_option_id = excluding.condition_option_id.clone();
        later.target_setting_id = target.to_string();

        let state = CustomizationState::new()
            .with(excluding.condition_setting_id.clone(), excluding.condition_option_id.clone());
        let only_exclusion = engine(vec![excluding.clone()]).apply_rules(&settings, &state);
        let with_follow_up = engine(vec![excluding, later]).apply_rules(&settings, &state);

        prop_assert!(with_follow_up.setting(target).is_none());
        prop_assert_eq!(&only_exclusion.settings, &with_follow_up.settings);
        prop_assert!(!with_follow_up.price_multipliers.contains_key(target));
        prop_assert!(!with_follow_up.auto_selections.contains_key(target));
        prop_assert!(!with_follow_up.proposed_selections.contains_key(target));
    }

    #[test]
    fn classified_slots_do_not_depend_on_input_order(
        chain in prop::sample::select(OPTION_IDS.to_vec()),
        first in prop::sample::select(OPTION_IDS.to_vec()),
        second in prop::sample::select(OPTION_IDS.to_vec()),
        metal in prop::sample::select(OPTION_IDS.to_vec()),
        rotation in 0usize..4,
    ) {
        let canonical = vec![
            ("chain_type", chain),
            ("first_stone", first),
            ("second_stone", second),
            ("metal", metal),
        ];
        let mut rotated = canonical.clone();
        rotated.rotate_left(rotation);
        let raw = |_: &str, option_id: &str| option_id.to_string();

        prop_assert_eq!(
            compose_filename_stem(&ProductType::Necklace, &canonical, raw),
            compose_filename_stem(&ProductType::Necklace, &rotated, raw)
        );
    }
}

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

struct EmptyFolder;

#[async_trait]
impl StorageLister for EmptyFolder {
    async fn list(&self, _bucket: &str, _folder: &str) -> Result<Vec<String>, SourceError> {
        Ok(Vec::new())
    }
}

fn generator() -> VariantGenerator {
    let filenames = FilenameService::new(
        Arc::new(NoSlugs),
        SlugCache::with_system_clock(std::time::Duration::from_secs(300)),
    );
    VariantGenerator::new(Arc::new(filenames), Arc::new(EmptyFolder), "customization-item")
}

fn product(product_type: ProductType) -> Product {
    Product {
        id: ProductId("prop-product".to_string()),
        name: "Generated".to_string(),
        product_type,
        base_price: Decimal::new(10_000, 2),
        category_id: None,
        active: true,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_variants_respect_image_flags_and_dedupe(
        settings in arb_settings(),
        rules in prop::collection::vec(arb_rule(), 0..4),
        product_type in prop_oneof![
            Just(ProductType::Necklace),
            Just(ProductType::Bracelet),
            Just(ProductType::Ring),
        ],
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        let product = product(product_type.clone());
        let variants =
            runtime.block_on(generator().generate_variants(&engine(rules), &product, &settings));

        let hidden: HashSet<&str> = settings
            .iter()
            .filter(|setting| !setting.affects_image_variant)
            .map(|setting| setting.id.as_str())
            .collect();
        for variant in &variants {
            prop_assert!(variant.options.iter().all(|option| !hidden.contains(option.setting_id.as_str())));
        }

        if product_type.dedupes_variant_filenames() {
            let mut seen = HashSet::new();
            for variant in &variants {
                prop_assert!(seen.insert(variant.filename.clone()));
            }
        }
    }
}
