//! Consumer-local purchase order
//!
//! An `Order` lives for one purchase cycle: created when a product is
//! chosen, filled in through the later stages and replaced once it is
//! realized or abandoned.

use agora_core::{ProducerId, Product, ProductId, StockItem};
use std::collections::BTreeMap;

/// Weight of the price term in the dealer score. The original model
/// wrote these as integer fractions, which truncate to zero; the
/// floating-point weights are the intended behavior.
const PRICE_WEIGHT: f64 = 0.75;
const QUANTITY_WEIGHT: f64 = 0.25;

/// Ephemeral state of one purchase attempt.
#[derive(Debug, Clone)]
pub struct Order {
    pub product_id: ProductId,
    pub product: Option<Product>,
    /// Desired quantity, fixed in the details stage (possibly relaxed
    /// once during dealer search).
    pub quantity: u32,
    /// Maximum acceptable unit price (possibly relaxed once).
    pub max_unit_price: f64,
    /// Candidate sellers and their offers at scan time. Sorted by
    /// producer id, which fixes the tie-break order during scoring.
    pub dealers: BTreeMap<ProducerId, StockItem>,
    pub best_dealer: Option<ProducerId>,
    pub realized: bool,
}

impl Order {
    pub fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            product: None,
            quantity: 0,
            max_unit_price: 0.0,
            dealers: BTreeMap::new(),
            best_dealer: None,
            realized: false,
        }
    }

    /// Scores an offer against this order, or `None` if ineligible.
    ///
    /// Eligibility requires the offer to be strictly better than the
    /// limits: price below the maximum and quantity above the desired
    /// amount. Higher scores are better.
    pub fn score(&self, offer: &StockItem) -> Option<f64> {
        if offer.price < self.max_unit_price && offer.quantity > self.quantity {
            Some(
                PRICE_WEIGHT * (self.max_unit_price / offer.price)
                    + QUANTITY_WEIGHT * (offer.quantity as f64 / self.quantity as f64),
            )
        } else {
            None
        }
    }

    /// Highest-scoring eligible dealer; ties keep the candidate that
    /// appears first in the map's iteration order.
    pub fn best_by_score(&self) -> Option<ProducerId> {
        let mut best: Option<(ProducerId, f64)> = None;
        for (id, offer) in &self.dealers {
            if let Some(score) = self.score(offer) {
                match best {
                    None => best = Some((*id, score)),
                    Some((_, best_score)) if score > best_score => best = Some((*id, score)),
                    Some(_) => {}
                }
            }
        }
        best.map(|(id, _)| id)
    }

    /// One-shot constraint relaxation: accept 5% more on price, settle
    /// for 10% less quantity (never below one unit).
    pub fn relax(&mut self) {
        self.max_unit_price *= 1.05;
        self.quantity = (((self.quantity as f64) * 0.9).floor() as u32).max(1);
    }
}
