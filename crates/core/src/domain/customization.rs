use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Well-known setting identifiers used by the image library naming scheme.
pub mod setting_ids {
    pub const CHAIN_TYPE: &str = "chain_type";
    pub const FIRST_STONE: &str = "first_stone";
    pub const SECOND_STONE: &str = "second_stone";
    pub const METAL: &str = "metal";
    pub const DIAMOND_ORIGIN: &str = "diamond_origin";
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    #[default]
    Options,
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationOption {
    pub id: String,
    pub setting_id: String,
    pub name: String,
    pub price: Decimal,
    pub price_lab_grown: Option<Decimal>,
    pub image_url: Option<String>,
    pub color_hex: Option<String>,
    pub filename_slug: Option<String>,
    pub active: bool,
    pub display_order: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationSetting {
    pub id: String,
    pub title: String,
    pub required: bool,
    pub affects_image_variant: bool,
    #[serde(default)]
    pub kind: SettingKind,
    pub display_order: i32,
    pub options: Vec<CustomizationOption>,
}

impl CustomizationSetting {
    pub fn option(&self, option_id: &str) -> Option<&CustomizationOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    pub fn has_option(&self, option_id: &str) -> bool {
        self.option(option_id).is_some()
    }
}

pub fn find_setting<'a>(
    settings: &'a [CustomizationSetting],
    setting_id: &str,
) -> Option<&'a CustomizationSetting> {
    settings.iter().find(|setting| setting.id == setting_id)
}

/// The user's current choices: setting id to option id, or free text for
/// text settings such as engraving.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomizationState(BTreeMap<String, String>);

impl CustomizationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, setting_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(setting_id, value);
        self
    }

    pub fn get(&self, setting_id: &str) -> Option<&str> {
        self.0.get(setting_id).map(String::as_str)
    }

    /// Returns the previously selected value, if any.
    pub fn set(&mut self, setting_id: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(setting_id.into(), value.into())
    }

    pub fn remove(&mut self, setting_id: &str) -> Option<String> {
        self.0.remove(setting_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl FromIterator<(String, String)> for CustomizationState {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for CustomizationState {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::CustomizationState;

    #[test]
    fn state_set_reports_previous_value() {
        let mut state = CustomizationState::new().with("metal", "white_gold");

        assert_eq!(state.set("metal", "rose_gold"), Some("white_gold".to_string()));
        assert_eq!(state.get("metal"), Some("rose_gold"));
        assert_eq!(state.set("chain_type", "cable"), None);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn state_serializes_as_flat_map() {
        let state = CustomizationState::new().with("engraving", "A & J");
        let json = serde_json::to_string(&state).expect("serialize state");
        assert_eq!(json, r#"{"engraving":"A & J"}"#);
    }
}
