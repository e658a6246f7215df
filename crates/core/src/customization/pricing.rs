use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::customization::rules::RulesEngineResult;
use crate::domain::customization::{setting_ids, CustomizationState};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiamondOrigin {
    #[default]
    Natural,
    LabGrown,
}

impl DiamondOrigin {
    pub fn from_state(state: &CustomizationState) -> Self {
        match state.get(setting_ids::DIAMOND_ORIGIN) {
            Some("lab_grown") => Self::LabGrown,
            _ => Self::Natural,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationPrice {
    pub base_price: Decimal,
    pub options_total: Decimal,
    pub total: Decimal,
    pub steps: Vec<PricingTraceStep>,
}

/// Prices the selected options on top of the product's base price. Each
/// option contributes its natural or lab-grown price times the multiplier the
/// rules recorded for its setting. Selections outside the filtered settings
/// contribute nothing.
pub fn price_customization(
    base_price: Decimal,
    evaluation: &RulesEngineResult,
    state: &CustomizationState,
) -> CustomizationPrice {
    let origin = DiamondOrigin::from_state(state);
    let mut steps = vec![PricingTraceStep {
        stage: "base".to_string(),
        detail: "product base price".to_string(),
        amount: base_price,
    }];
    let mut options_total = Decimal::ZERO;

    for setting in &evaluation.settings {
        let Some(option) = state.get(&setting.id).and_then(|option_id| setting.option(option_id))
        else {
            continue;
        };

        let unit = match (origin, option.price_lab_grown) {
            (DiamondOrigin::LabGrown, Some(lab_price)) => lab_price,
            _ => option.price,
        };
        let multiplier = evaluation.multiplier_for(&setting.id);
        let amount = (unit * multiplier).round_dp(2);
        if amount.is_zero() {
            continue;
        }

        let detail = if multiplier == Decimal::ONE {
            format!("{}: {}", setting.title, option.name)
        } else {
            format!("{}: {} x{}", setting.title, option.name, multiplier.normalize())
        };
        steps.push(PricingTraceStep { stage: "option".to_string(), detail, amount });
        options_total += amount;
    }

    let total = base_price + options_total;
    steps.push(PricingTraceStep {
        stage: "total".to_string(),
        detail: "base price + sum(option price * multiplier)".to_string(),
        amount: total,
    });

    CustomizationPrice { base_price, options_total, total, steps }
}
