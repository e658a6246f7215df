use serde::{Deserialize, Serialize};

use crate::domain::customization::{CustomizationSetting, CustomizationState, SettingKind};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionViolation {
    pub code: String,
    pub setting_id: String,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<SelectionViolation>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self { valid: true, violations: Vec::new() }
    }
}

/// Checks selections against the rule-filtered settings. Selections for
/// settings the rules removed are ignored, since they can no longer render.
pub fn validate_selections(
    settings: &[CustomizationSetting],
    state: &CustomizationState,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    for setting in settings {
        // A blank option id is an unselected setting, not an unknown option.
        let value = state
            .get(&setting.id)
            .filter(|value| matches!(setting.kind, SettingKind::Text) || !value.trim().is_empty());

        match (setting.kind, value) {
            (_, None) if setting.required => result.violations.push(SelectionViolation {
                code: "MISSING_REQUIRED_SELECTION".to_string(),
                setting_id: setting.id.clone(),
                message: format!("{} is required", setting.title),
                suggestion: Some(format!("Choose a {} to continue", setting.title.to_lowercase())),
            }),
            (_, None) => {}
            (SettingKind::Text, Some(text)) => {
                if setting.required && text.trim().is_empty() {
                    result.violations.push(SelectionViolation {
                        code: "EMPTY_TEXT_VALUE".to_string(),
                        setting_id: setting.id.clone(),
                        message: format!("{} must not be blank", setting.title),
                        suggestion: Some("Enter the text to engrave".to_string()),
                    });
                }
            }
            (SettingKind::Options, Some(option_id)) => {
                if !setting.has_option(option_id) {
                    result.violations.push(SelectionViolation {
                        code: "UNKNOWN_OPTION".to_string(),
                        setting_id: setting.id.clone(),
                        message: format!(
                            "{option_id} is not available for {}",
                            setting.title.to_lowercase()
                        ),
                        suggestion: Some("Pick one of the available options".to_string()),
                    });
                }
            }
        }
    }

    result.valid = result.violations.is_empty();
    result
}
