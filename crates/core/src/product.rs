//! Product catalog entry
//!
//! A product is identified by its numeric id; name, description and tags
//! are descriptive only. Tags are normalized to lowercase on every write
//! so membership tests are case-insensitive by construction.

use crate::ids::ProductId;
use serde::{Deserialize, Serialize};

/// A good that can be produced, offered and purchased.
///
/// Equality and hashing consider only the id: two `Product` values with
/// the same id describe the same good even if their display data drifted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    description: String,
    tags: Vec<String>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = normalize(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Lowercase-normalized tag set.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replaces the tag set, re-normalizing to lowercase.
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = normalize(tags);
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into().to_lowercase();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Case-insensitive tag membership test.
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tags.iter().any(|t| *t == tag)
    }

    /// True if the product carries any of the requested tags.
    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|t| self.has_tag(t.as_ref()))
    }
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Product {}

impl std::hash::Hash for Product {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn normalize(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.to_lowercase();
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_lowercased_on_construction() {
        let product = Product::new(1, "Iron").with_tags(["Metal", "RAW"]);
        assert_eq!(product.tags(), &["metal", "raw"]);
    }

    #[test]
    fn set_tags_renormalizes() {
        let mut product = Product::new(1, "Iron");
        product.set_tags(vec!["Ore".to_string(), "ORE".to_string(), "heavy".to_string()]);
        assert_eq!(product.tags(), &["ore", "heavy"]);
    }

    #[test]
    fn tag_membership_is_case_insensitive() {
        let product = Product::new(1, "Iron").with_tags(["metal"]);
        assert!(product.has_tag("METAL"));
        assert!(product.has_any_tag(&["wood", "Metal"]));
        assert!(!product.has_any_tag(&["wood", "stone"]));
    }

    #[test]
    fn equality_is_by_id_only() {
        let a = Product::new(7, "Iron");
        let b = Product::new(7, "Renamed iron").with_description("different");
        let c = Product::new(8, "Iron");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
