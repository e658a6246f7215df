use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{
    customization::{find_setting, CustomizationSetting, CustomizationState},
    product::ProductId,
    rule::{LogicRule, RuleAction, RuleId},
};
use crate::sources::RuleSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Applied,
    ConditionNotMet,
    TargetSettingMissing,
    NoTargetOptions,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_id: RuleId,
    pub action_type: String,
    pub status: RuleStatus,
}

/// Output of one evaluation pass. Recomputed on every state change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesEngineResult {
    pub settings: Vec<CustomizationSetting>,
    pub evaluations: Vec<RuleEvaluation>,
    pub price_multipliers: BTreeMap<String, Decimal>,
    pub auto_selections: BTreeMap<String, String>,
    pub proposed_selections: BTreeMap<String, String>,
}

impl RulesEngineResult {
    pub fn applied_rules(&self) -> impl Iterator<Item = &RuleId> {
        self.evaluations
            .iter()
            .filter(|evaluation| evaluation.status == RuleStatus::Applied)
            .map(|evaluation| &evaluation.rule_id)
    }

    pub fn setting(&self, setting_id: &str) -> Option<&CustomizationSetting> {
        find_setting(&self.settings, setting_id)
    }

    pub fn is_option_available(&self, setting_id: &str, option_id: &str) -> bool {
        self.setting(setting_id).is_some_and(|setting| setting.has_option(option_id))
    }

    pub fn multiplier_for(&self, setting_id: &str) -> Decimal {
        self.price_multipliers.get(setting_id).copied().unwrap_or(Decimal::ONE)
    }
}

/// Evaluates a product's logic rules against the current selections.
///
/// Rules run strictly in load order, each against the settings list as left by
/// the rules before it. A rule that removes a setting therefore turns every
/// later rule targeting that setting into a no-op, and overlapping targets
/// resolve as last write wins. Authors layering rules on one setting must
/// order them deliberately.
#[derive(Clone, Debug, Default)]
pub struct LogicRulesEngine {
    product_id: Option<ProductId>,
    rules: Vec<LogicRule>,
}

impl LogicRulesEngine {
    pub fn from_rules(product_id: ProductId, rules: Vec<LogicRule>) -> Self {
        Self { product_id: Some(product_id), rules }
    }

    /// Loads the product's active rules. Load failures degrade to an engine
    /// with no rules so the customization page keeps working.
    pub async fn load(source: &dyn RuleSource, product_id: &ProductId) -> Self {
        let rules = match source.active_rules(product_id).await {
            Ok(mut rules) => {
                rules.retain(|rule| rule.active && &rule.product_id == product_id);
                rules.sort_by(|left, right| left.created_at.cmp(&right.created_at));
                info!(
                    event_name = "customization.rules.loaded",
                    product_id = %product_id.0,
                    rule_count = rules.len(),
                    "logic rules loaded"
                );
                rules
            }
            Err(error) => {
                warn!(
                    event_name = "customization.rules.load_failed",
                    product_id = %product_id.0,
                    error = %error,
                    "logic rules could not be loaded; continuing without rules"
                );
                Vec::new()
            }
        };

        Self { product_id: Some(product_id.clone()), rules }
    }

    pub fn product_id(&self) -> Option<&ProductId> {
        self.product_id.as_ref()
    }

    pub fn rules(&self) -> &[LogicRule] {
        &self.rules
    }

    pub fn apply_rules(
        &self,
        settings: &[CustomizationSetting],
        state: &CustomizationState,
    ) -> RulesEngineResult {
        let mut result = RulesEngineResult {
            settings: settings.to_vec(),
            evaluations: Vec::with_capacity(self.rules.len()),
            ..RulesEngineResult::default()
        };

        for rule in &self.rules {
            let condition_met = state.get(&rule.condition_setting_id)
                == Some(rule.condition_option_id.as_str());
            let status = if condition_met {
                self.apply_rule(rule, &mut result)
            } else {
                RuleStatus::ConditionNotMet
            };

            result.evaluations.push(RuleEvaluation {
                rule_id: rule.id.clone(),
                action_type: rule.action.action_type().to_string(),
                status,
            });
        }

        result
    }

    fn apply_rule(&self, rule: &LogicRule, result: &mut RulesEngineResult) -> RuleStatus {
        let Some(index) =
            result.settings.iter().position(|setting| setting.id == rule.target_setting_id)
        else {
            let product_id = self.product_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown");
            warn!(
                event_name = "customization.rules.target_missing",
                product_id = %product_id,
                rule_id = %rule.id,
                target_setting_id = %rule.target_setting_id,
                "logic rule target setting is not present; skipping"
            );
            return RuleStatus::TargetSettingMissing;
        };

        let targets = &rule.target_option_ids;
        match &rule.action {
            RuleAction::ExcludeOptions => {
                result.settings[index].options.retain(|option| !targets.contains(&option.id));
            }
            RuleAction::IncludeOnly => {
                result.settings[index].options.retain(|option| targets.contains(&option.id));
            }
            RuleAction::SetRequirement { required } => {
                result.settings[index].required = *required;
            }
            RuleAction::SetPriceMultiplier { multiplier } => {
                result.price_multipliers.insert(rule.target_setting_id.clone(), *multiplier);
            }
            RuleAction::ExcludeSetting => {
                result.settings.remove(index);
            }
            RuleAction::AutoSelect => {
                let Some(first) = targets.first() else {
                    return RuleStatus::NoTargetOptions;
                };
                result.auto_selections.insert(rule.target_setting_id.clone(), first.clone());
            }
            RuleAction::ProposeSelection => {
                let Some(first) = targets.first() else {
                    return RuleStatus::NoTargetOptions;
                };
                result.proposed_selections.insert(rule.target_setting_id.clone(), first.clone());
            }
        }

        RuleStatus::Applied
    }
}
