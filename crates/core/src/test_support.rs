use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    customization::{CustomizationOption, CustomizationSetting, SettingKind},
    product::{Product, ProductId, ProductType},
    rule::{LogicRule, RuleAction, RuleId},
};

pub fn option(setting_id: &str, option_id: &str, price_cents: i64) -> CustomizationOption {
    CustomizationOption {
        id: option_id.to_string(),
        setting_id: setting_id.to_string(),
        name: option_id.replace('_', " "),
        price: Decimal::new(price_cents, 2),
        price_lab_grown: None,
        image_url: None,
        color_hex: None,
        filename_slug: None,
        active: true,
        display_order: 0,
    }
}

pub fn setting(id: &str, option_ids: &[&str]) -> CustomizationSetting {
    CustomizationSetting {
        id: id.to_string(),
        title: id.replace('_', " "),
        required: false,
        affects_image_variant: true,
        kind: SettingKind::Options,
        display_order: 0,
        options: option_ids.iter().map(|option_id| option(id, option_id, 0)).collect(),
    }
}

pub fn necklace_settings() -> Vec<CustomizationSetting> {
    vec![
        setting("chain_type", &["black_leather", "cable", "rope"]),
        setting("first_stone", &["diamond", "emerald", "ruby"]),
        setting("second_stone", &["emerald", "ruby", "sapphire"]),
        setting("metal", &["white_gold", "yellow_gold"]),
        CustomizationSetting {
            affects_image_variant: false,
            ..setting("size", &["16in", "18in"])
        },
    ]
}

pub fn rule(
    id: &str,
    condition: (&str, &str),
    action: RuleAction,
    target_setting_id: &str,
    target_option_ids: &[&str],
) -> LogicRule {
    LogicRule {
        id: RuleId(id.to_string()),
        product_id: ProductId("necklace-classic".to_string()),
        name: id.replace('-', " "),
        condition_setting_id: condition.0.to_string(),
        condition_option_id: condition.1.to_string(),
        action,
        target_setting_id: target_setting_id.to_string(),
        target_option_ids: target_option_ids.iter().map(|value| value.to_string()).collect(),
        active: true,
        created_at: fixed_time(0),
    }
}

pub fn fixed_time(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + offset_secs, 0).single().unwrap_or_else(Utc::now)
}

pub fn necklace_product() -> Product {
    Product {
        id: ProductId("necklace-classic".to_string()),
        name: "Classic Necklace".to_string(),
        product_type: ProductType::Necklace,
        base_price: Decimal::new(25_000, 2),
        category_id: Some("necklaces".to_string()),
        active: true,
    }
}
