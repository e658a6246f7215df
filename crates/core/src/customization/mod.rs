pub mod pricing;
pub mod rules;
pub mod selection;
pub mod validation;

use serde::{Deserialize, Serialize};

use crate::domain::customization::{CustomizationSetting, CustomizationState};
use crate::domain::product::Product;

use self::{
    pricing::{price_customization, CustomizationPrice},
    rules::{LogicRulesEngine, RulesEngineResult},
    selection::{resolve_selections, ResolvedSelections, SelectionLayers},
    validation::{validate_selections, ValidationResult},
};

/// Everything the product page needs after one selection change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationEvaluation {
    pub rules: RulesEngineResult,
    pub selections: ResolvedSelections,
    pub validation: ValidationResult,
    pub price: CustomizationPrice,
}

/// Runs the rules, merges competing selections by priority, and re-runs the
/// rules on the merged state until it settles, so selections forced by an
/// earlier auto-select are applied too. Validation and pricing see the final
/// filter.
pub fn evaluate_customization(
    engine: &LogicRulesEngine,
    product: &Product,
    settings: &[CustomizationSetting],
    user_state: &CustomizationState,
) -> CustomizationEvaluation {
    let mut evaluated = user_state.clone();
    let mut rules = engine.apply_rules(settings, &evaluated);
    let mut layers = SelectionLayers::from_engine(user_state.clone(), &rules);
    let mut selections = resolve_selections(&layers);

    // Each pass can only add selections, so one pass per rule is enough.
    for _ in 0..engine.rules().len() {
        if selections.state == evaluated {
            break;
        }
        evaluated = selections.state.clone();
        rules = engine.apply_rules(settings, &evaluated);
        layers.absorb(&rules);
        selections = resolve_selections(&layers);
    }

    let validation = validate_selections(&rules.settings, &selections.state);
    let price = price_customization(product.base_price, &rules, &selections.state);

    CustomizationEvaluation { rules, selections, validation, price }
}
