//! Identifier newtypes
//!
//! Numeric identities for catalog entries and agents. Products and
//! producers are equal exactly when their ids are equal.

use serde::{Deserialize, Serialize};

/// Unique identifier for a product
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProductId(pub u32);

/// Unique identifier for a producer agent
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProducerId(pub u32);

/// Unique identifier for a consumer agent
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ConsumerId(pub u32);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: u32) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }
    };
}

impl_id!(ProductId);
impl_id!(ProducerId);
impl_id!(ConsumerId);
