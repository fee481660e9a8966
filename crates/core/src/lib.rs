//! Shared domain types for the Agora market simulation
//!
//! This crate holds the catalog entities exchanged between agents
//! (products, stock items, filters), the market error taxonomy and the
//! per-item report records. Everything here is a plain value type:
//! whenever one of these crosses an agent boundary it is a snapshot
//! copy, never a live handle into another agent's state.

pub mod error;
pub mod ids;
pub mod product;
pub mod report;
pub mod stock;

pub use error::{MarketError, Result};
pub use ids::{ConsumerId, ProducerId, ProductId};
pub use product::Product;
pub use report::StockReport;
pub use stock::{ItemFilter, StockItem};
