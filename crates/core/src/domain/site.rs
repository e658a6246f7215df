use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Storefront theme edited from the admin console and stored as JSON in
/// `site_settings` under the `site_style` key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteStyle {
    pub primary_color: String,
    pub accent_color: String,
    pub background_color: String,
    pub font_family: String,
    #[serde(default)]
    pub hero_image_url: Option<String>,
}

impl Default for SiteStyle {
    fn default() -> Self {
        Self {
            primary_color: "#1f1f1f".to_string(),
            accent_color: "#c8a96a".to_string(),
            background_color: "#ffffff".to_string(),
            font_family: "Cormorant Garamond".to_string(),
            hero_image_url: None,
        }
    }
}

impl SiteStyle {
    pub const SETTINGS_KEY: &'static str = "site_style";

    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("primary_color", &self.primary_color),
            ("accent_color", &self.accent_color),
            ("background_color", &self.background_color),
        ] {
            if !is_hex_color(value) {
                return Err(DomainError::InvariantViolation(format!(
                    "{field} must be a hex color like #aabbcc, got `{value}`"
                )));
            }
        }

        if self.font_family.trim().is_empty() {
            return Err(DomainError::InvariantViolation(
                "font_family must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|ch| ch.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::SiteStyle;

    #[test]
    fn default_style_is_valid() {
        assert!(SiteStyle::default().validate().is_ok());
    }

    #[test]
    fn rejects_malformed_colors() {
        let style = SiteStyle { accent_color: "gold".to_string(), ..SiteStyle::default() };
        let error = style.validate().expect_err("named colors are rejected");
        assert!(error.to_string().contains("accent_color"));
    }
}
