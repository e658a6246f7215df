use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Jewelry family of a product. Drives the filename prefix and the storage
/// folder that holds pre-rendered variant images.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ProductType {
    Necklace,
    Bracelet,
    Ring,
    Earrings,
    Other(String),
}

impl ProductType {
    pub fn slug(&self) -> &str {
        match self {
            Self::Necklace => "necklace",
            Self::Bracelet => "bracelet",
            Self::Ring => "ring",
            Self::Earrings => "earrings",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Necklaces and bracelets reuse one photo across cosmetically irrelevant
    /// option variations, so duplicate filenames collapse to the first variant.
    pub fn dedupes_variant_filenames(&self) -> bool {
        matches!(self, Self::Necklace | Self::Bracelet)
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ProductType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "necklace" => Ok(Self::Necklace),
            "bracelet" => Ok(Self::Bracelet),
            "ring" => Ok(Self::Ring),
            "earrings" => Ok(Self::Earrings),
            "" => Err(DomainError::InvalidProductType(value.to_string())),
            other if other.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') => {
                Ok(Self::Other(other.to_string()))
            }
            _ => Err(DomainError::InvalidProductType(value.to_string())),
        }
    }
}

impl From<ProductType> for String {
    fn from(value: ProductType) -> Self {
        value.slug().to_string()
    }
}

impl TryFrom<String> for ProductType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub product_type: ProductType,
    pub base_price: Decimal,
    pub category_id: Option<String>,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::ProductType;

    #[test]
    fn parses_known_and_custom_product_types() {
        assert_eq!("Necklace".parse::<ProductType>().ok(), Some(ProductType::Necklace));
        assert_eq!(" bracelet ".parse::<ProductType>().ok(), Some(ProductType::Bracelet));
        assert_eq!(
            "anklet".parse::<ProductType>().ok(),
            Some(ProductType::Other("anklet".to_string()))
        );
        assert!("".parse::<ProductType>().is_err());
        assert!("../etc".parse::<ProductType>().is_err());
    }

    #[test]
    fn only_necklaces_and_bracelets_dedupe_filenames() {
        assert!(ProductType::Necklace.dedupes_variant_filenames());
        assert!(ProductType::Bracelet.dedupes_variant_filenames());
        assert!(!ProductType::Ring.dedupes_variant_filenames());
        assert!(!ProductType::Other("anklet".to_string()).dedupes_variant_filenames());
    }
}
