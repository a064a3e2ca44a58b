//! # Data Outfit
//!
//! `data-outfit` holds the catalog data model: outfits that can be tried on
//! over a user photo, the shoppable products attached to them, and the
//! identifier type the rest of the workspace keys favorites and cached
//! composites by.
//!
//! The serialized shape is camelCase, matching the catalog documents the
//! backend produces.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use app_error::AppError;

/// Identifier of an outfit in the catalog.
///
/// Identifiers are opaque strings assigned by the backend. They are stable
/// across sessions, so favorites and cached composites keyed by them
/// survive a restart.
#[derive(
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    Hash,
    Clone,
    Debug,
    Deserialize,
    Serialize,
)]
#[serde(transparent)]
pub struct OutfitId(String);

impl OutfitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OutfitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsing is for user-typed input and rejects the empty string;
/// [`OutfitId::new`] trusts ids that already exist in catalog data.
impl FromStr for OutfitId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AppError::Parse);
        }
        Ok(Self(s.to_owned()))
    }
}

/// A shoppable product attached to an outfit ("Shop This Look").
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,
    pub link: String,
    pub image_url: String,
    pub category: String,
}

/// A published catalog outfit.
///
/// `image_url` points at the combined garment image used for try-on;
/// `thumbnail_url` is the card-sized variant when the backend provides one.
/// `category` and `tags` come from the admin upload and drive catalog
/// filtering; older documents omit them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outfit {
    pub id: OutfitId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Outfit {
    /// Create an outfit with just the required fields set.
    pub fn new(
        id: OutfitId,
        name: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            category: None,
            image_url: image_url.into(),
            thumbnail_url: None,
            tags: Vec::new(),
            created_at: None,
            products: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Outfit, OutfitId};

    #[test]
    fn test_outfit_id_roundtrip() {
        let id = OutfitId::from_str("outfit-42").expect("Failed to parse id");
        assert_eq!(id.to_string(), "outfit-42");
        assert_eq!(id, OutfitId::new("outfit-42"));
    }

    #[test]
    fn test_outfit_id_rejects_empty() {
        assert!(OutfitId::from_str("").is_err());
    }

    #[test]
    fn test_outfit_id_serializes_transparent() {
        let id = OutfitId::new("o1");
        let json = serde_json::to_string(&id).expect("Failed to serialize");
        assert_eq!(json, "\"o1\"");
    }

    #[test]
    fn test_parse_catalog_document() {
        let json = r#"{
            "id": "o1",
            "name": "Summer Linen",
            "description": "Light two-piece set",
            "category": "casual",
            "imageUrl": "https://cdn.example/outfits/o1.png",
            "thumbnailUrl": "https://cdn.example/outfits/o1-thumb.png",
            "tags": ["summer", "linen"],
            "createdAt": "2024-05-01T10:00:00Z",
            "products": [
                {
                    "name": "Linen Shirt",
                    "link": "https://shop.example/shirt",
                    "imageUrl": "https://cdn.example/products/shirt.png",
                    "category": "tops"
                }
            ]
        }"#;

        let outfit: Outfit =
            serde_json::from_str(json).expect("Failed to parse outfit");
        assert_eq!(outfit.id, OutfitId::new("o1"));
        assert_eq!(outfit.name, "Summer Linen");
        assert_eq!(outfit.category.as_deref(), Some("casual"));
        assert_eq!(outfit.tags, vec!["summer", "linen"]);
        assert_eq!(outfit.products.len(), 1);
        assert_eq!(outfit.products[0].category, "tops");
    }

    #[test]
    fn test_parse_minimal_document() {
        // Optional fields may be missing entirely
        let json = r#"{
            "id": "o2",
            "name": "Denim",
            "imageUrl": "https://cdn.example/outfits/o2.png"
        }"#;

        let outfit: Outfit =
            serde_json::from_str(json).expect("Failed to parse outfit");
        assert_eq!(outfit.description, None);
        assert_eq!(outfit.category, None);
        assert!(outfit.tags.is_empty());
        assert!(outfit.products.is_empty());
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let outfit = Outfit::new(OutfitId::new("o3"), "Knit", "url");
        let json =
            serde_json::to_string(&outfit).expect("Failed to serialize");
        assert!(json.contains("\"imageUrl\""));
        assert!(!json.contains("image_url"));
    }
}
