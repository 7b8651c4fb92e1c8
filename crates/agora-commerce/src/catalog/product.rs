//! Product summary as seen by the commerce core.
//!
//! The catalog itself (descriptions, media, variants, seller tooling) is
//! an external collaborator; the core only consumes this projection. The
//! `cached_stock` field is a denormalized copy of the inventory ledger's
//! current stock and must never be treated as authoritative during
//! checkout.

use crate::ids::{CategoryId, ProductId, ShopId};
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Catalog lifecycle status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    OutOfStock,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::OutOfStock => "out_of_stock",
        }
    }
}

/// The slice of a catalog product the commerce core needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSummary {
    /// Product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Primary image URL, if any.
    pub image: Option<String>,
    /// Catalog list price.
    pub price: Money,
    /// Denormalized stock count, refreshed by the inventory ledger.
    pub cached_stock: i64,
    /// Owning shop (None for platform-listed products).
    pub shop_id: Option<ShopId>,
    /// Categories the product belongs to.
    pub category_ids: Vec<CategoryId>,
    /// Catalog status.
    pub status: ProductStatus,
}

impl ProductSummary {
    /// Create a minimal summary.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, cached_stock: i64) -> Self {
        Self {
            id,
            name: name.into(),
            image: None,
            price,
            cached_stock,
            shop_id: None,
            category_ids: Vec::new(),
            status: ProductStatus::Active,
        }
    }

    /// Apply a refreshed stock figure, keeping the status in sync.
    pub fn set_cached_stock(&mut self, stock: i64) {
        self.cached_stock = stock;
        if stock <= 0 {
            self.status = ProductStatus::OutOfStock;
        } else if self.status == ProductStatus::OutOfStock {
            self.status = ProductStatus::Active;
        }
    }
}
