use serde::{Deserialize, Serialize};

/// One (setting, option) pair inside a variant combination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOption {
    pub setting_id: String,
    pub setting_title: String,
    pub option_id: String,
    pub option_name: String,
}

/// A concrete option combination with its pre-rendered image filename.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub options: Vec<VariantOption>,
    pub display_name: String,
    /// Canonical `.webp` filename; replaced by the stored name when an image
    /// with another extension was found.
    pub filename: String,
    /// `<product_type>/<filename>` inside the variant bucket when the image exists.
    pub image_path: Option<String>,
    pub exists: bool,
}

impl ProductVariant {
    pub fn selections(&self) -> Vec<(String, String)> {
        self.options
            .iter()
            .map(|option| (option.setting_id.clone(), option.option_id.clone()))
            .collect()
    }
}
