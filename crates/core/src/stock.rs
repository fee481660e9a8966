//! Stock items and query filters
//!
//! A `StockItem` is one producer's offer of a product: a unit price and
//! an available quantity. Offers handed out by a producer are always
//! clones, so holding one never grants access to the producer's live
//! inventory.

use crate::ids::ProductId;
use crate::product::Product;
use serde::{Deserialize, Serialize};

/// A priced, quantified offer of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    pub product: Product,
    /// Current unit price. Positive in steady state; a pricing strategy
    /// may transiently return any non-negative value.
    pub price: f64,
    pub quantity: u32,
}

impl StockItem {
    pub fn new(product: Product, price: f64, quantity: u32) -> Self {
        Self {
            product,
            price,
            quantity,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product.id()
    }

    /// Total value of the offer at the current unit price.
    pub fn total_price(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

/// Optional criteria for inventory queries.
///
/// An empty filter matches every item. The tag list uses ANY semantics:
/// an item matches when it carries at least one of the requested tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    /// Case-insensitive substring match against the product name.
    pub name: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub tags: Vec<String>,
}

impl ItemFilter {
    /// Filter that matches everything.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_min_price(mut self, min: f64) -> Self {
        self.min_price = Some(min);
        self
    }

    pub fn with_max_price(mut self, max: f64) -> Self {
        self.max_price = Some(max);
        self
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, item: &StockItem) -> bool {
        if let Some(name) = &self.name {
            if !item
                .product
                .name()
                .to_lowercase()
                .contains(&name.to_lowercase())
            {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if item.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if item.price > max {
                return false;
            }
        }
        if !self.tags.is_empty() && !item.product.has_any_tag(&self.tags) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iron_offer() -> StockItem {
        let product = Product::new(1, "Iron ingot").with_tags(["metal", "smelted"]);
        StockItem::new(product, 12.5, 40)
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(ItemFilter::any().matches(&iron_offer()));
    }

    #[test]
    fn name_filter_is_substring_and_case_insensitive() {
        assert!(ItemFilter::any().with_name("IRON").matches(&iron_offer()));
        assert!(!ItemFilter::any().with_name("copper").matches(&iron_offer()));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let offer = iron_offer();
        assert!(ItemFilter::any().with_min_price(12.5).matches(&offer));
        assert!(ItemFilter::any().with_max_price(12.5).matches(&offer));
        assert!(!ItemFilter::any().with_min_price(12.6).matches(&offer));
        assert!(!ItemFilter::any().with_max_price(12.4).matches(&offer));
    }

    #[test]
    fn tag_filter_uses_any_semantics() {
        let offer = iron_offer();
        assert!(ItemFilter::any().with_tags(["wood", "metal"]).matches(&offer));
        assert!(!ItemFilter::any().with_tags(["wood", "stone"]).matches(&offer));
    }

    #[test]
    fn total_price_scales_with_quantity() {
        assert_eq!(iron_offer().total_price(), 12.5 * 40.0);
    }
}
