use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a logic rule does to its target setting once its condition holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    ExcludeOptions,
    IncludeOnly,
    SetRequirement { required: bool },
    SetPriceMultiplier { multiplier: Decimal },
    ExcludeSetting,
    AutoSelect,
    ProposeSelection,
}

impl RuleAction {
    /// Builds an action from its persisted `action_type` column. The price
    /// multiplier column is only consulted for `set_price_multiplier`.
    pub fn from_parts(action_type: &str, multiplier: Option<Decimal>) -> Result<Self, DomainError> {
        match action_type.trim() {
            "exclude_options" => Ok(Self::ExcludeOptions),
            "include_only" => Ok(Self::IncludeOnly),
            "set_required" => Ok(Self::SetRequirement { required: true }),
            "set_optional" => Ok(Self::SetRequirement { required: false }),
            "set_price_multiplier" => {
                let multiplier = multiplier.ok_or_else(|| {
                    DomainError::InvariantViolation(
                        "set_price_multiplier rule is missing a multiplier value".to_string(),
                    )
                })?;
                if multiplier < Decimal::ZERO {
                    return Err(DomainError::InvariantViolation(format!(
                        "price multiplier must not be negative, got {multiplier}"
                    )));
                }
                Ok(Self::SetPriceMultiplier { multiplier })
            }
            "exclude_setting" => Ok(Self::ExcludeSetting),
            "auto_select" => Ok(Self::AutoSelect),
            "propose_selection" => Ok(Self::ProposeSelection),
            other => Err(DomainError::UnknownRuleAction(other.to_string())),
        }
    }

    pub fn action_type(&self) -> &'static str {
        match self {
            Self::ExcludeOptions => "exclude_options",
            Self::IncludeOnly => "include_only",
            Self::SetRequirement { required: true } => "set_required",
            Self::SetRequirement { required: false } => "set_optional",
            Self::SetPriceMultiplier { .. } => "set_price_multiplier",
            Self::ExcludeSetting => "exclude_setting",
            Self::AutoSelect => "auto_select",
            Self::ProposeSelection => "propose_selection",
        }
    }

    pub fn multiplier(&self) -> Option<Decimal> {
        match self {
            Self::SetPriceMultiplier { multiplier } => Some(*multiplier),
            _ => None,
        }
    }
}

/// A conditional rewrite rule scoped to one product: when the condition
/// setting holds the condition option, the action runs against the target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicRule {
    pub id: RuleId,
    pub product_id: ProductId,
    pub name: String,
    pub condition_setting_id: String,
    pub condition_option_id: String,
    pub action: RuleAction,
    pub target_setting_id: String,
    pub target_option_ids: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
