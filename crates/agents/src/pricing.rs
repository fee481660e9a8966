//! Pricing strategies
//!
//! A producer reprices every inventory item once per tick by calling a
//! [`PricingStrategy`] with the item's fill factor (quantity divided by
//! storage capacity), its base price and its current price. Strategies
//! are pure functions of those three inputs, so any closure with the
//! right shape can stand in for the built-in ones.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Strategy applied by a producer to recompute an item's unit price.
pub trait PricingStrategy: Send + Sync {
    fn price(&self, fill_factor: f64, base_price: f64, current_price: f64) -> f64;
}

impl<F> PricingStrategy for F
where
    F: Fn(f64, f64, f64) -> f64 + Send + Sync,
{
    fn price(&self, fill_factor: f64, base_price: f64, current_price: f64) -> f64 {
        self(fill_factor, base_price, current_price)
    }
}

/// Multiplies the **current** price by a fill-level band factor, then
/// clamps the result to `[0.5 * base, 2.0 * base]`.
///
/// A fuller magazine pushes the price down, an emptier one pulls it up,
/// and the clamp keeps a long run of one-sided ticks from walking the
/// price arbitrarily far from the base.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticAroundCurrent;

impl PricingStrategy for ElasticAroundCurrent {
    fn price(&self, fill_factor: f64, base_price: f64, current_price: f64) -> f64 {
        let factor = if fill_factor > 0.8 {
            0.90
        } else if fill_factor > 0.6 {
            0.95
        } else if fill_factor > 0.4 {
            1.00
        } else if fill_factor > 0.2 {
            1.05
        } else {
            1.10
        };
        (current_price * factor).clamp(0.5 * base_price, 2.0 * base_price)
    }
}

/// Multiplies the **base** price by a fill-level band factor.
///
/// The output only ever depends on the base price, so no clamp is
/// needed: the bands themselves bound the range to `[0.7, 1.3]` of base.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticAroundBase;

impl PricingStrategy for ElasticAroundBase {
    fn price(&self, fill_factor: f64, base_price: f64, _current_price: f64) -> f64 {
        let factor = if fill_factor > 0.8 {
            0.70
        } else if fill_factor > 0.6 {
            0.85
        } else if fill_factor > 0.4 {
            1.00
        } else if fill_factor > 0.2 {
            1.15
        } else {
            1.30
        };
        base_price * factor
    }
}

/// Config-level selector for the built-in strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PricingKind {
    #[default]
    ElasticAroundCurrent,
    ElasticAroundBase,
}

impl PricingKind {
    pub fn strategy(self) -> Arc<dyn PricingStrategy> {
        match self {
            PricingKind::ElasticAroundCurrent => Arc::new(ElasticAroundCurrent),
            PricingKind::ElasticAroundBase => Arc::new(ElasticAroundBase),
        }
    }
}
