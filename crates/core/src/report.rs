//! Per-item stock reports
//!
//! Producers emit one `StockReport` per inventory item per tick. The
//! `Display` impl renders the CSV record consumed by external sinks;
//! where the line ends up (console, file) is the runner's concern.

use crate::ids::{ProducerId, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one inventory item at report time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReport {
    pub timestamp: DateTime<Utc>,
    pub producer: ProducerId,
    pub product_id: ProductId,
    pub product_name: String,
    pub current_price: f64,
    pub base_price: f64,
    pub current_quantity: u32,
    pub max_quantity: u32,
}

impl StockReport {
    /// Header matching the `Display` column order.
    pub const CSV_HEADER: &'static str =
        "timestamp,productId,productName,currentPrice,basePrice,currentQuantity,maxQuantity";

    #[allow(clippy::too_many_arguments)]
    pub fn now(
        producer: ProducerId,
        product_id: ProductId,
        product_name: impl Into<String>,
        current_price: f64,
        base_price: f64,
        current_quantity: u32,
        max_quantity: u32,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            producer,
            product_id,
            product_name: product_name.into(),
            current_price,
            base_price,
            current_quantity,
            max_quantity,
        }
    }
}

impl std::fmt::Display for StockReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{:.2},{:.2},{},{}",
            self.timestamp.to_rfc3339(),
            self.product_id,
            self.product_name,
            self.current_price,
            self.base_price,
            self.current_quantity,
            self.max_quantity,
        )
    }
}
