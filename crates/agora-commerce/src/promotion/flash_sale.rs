//! Flash sale documents.
//!
//! A flash sale lists products at a reduced price with a dedicated
//! stock allotment. `sold_count` per product is advanced at settlement
//! and never beyond `flash_stock`.

use crate::clock::current_timestamp;
use crate::ids::{FlashSaleId, ProductId};
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a flash sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FlashSaleStatus {
    #[default]
    Scheduled,
    Active,
    Ended,
}

impl FlashSaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashSaleStatus::Scheduled => "scheduled",
            FlashSaleStatus::Active => "active",
            FlashSaleStatus::Ended => "ended",
        }
    }
}

/// One product's allotment inside a flash sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashSaleProduct {
    /// Discounted product.
    pub product_id: ProductId,
    /// Sale price.
    pub flash_price: Money,
    /// Units allotted to the sale.
    pub flash_stock: i64,
    /// Units settled so far, never above `flash_stock`.
    pub sold_count: i64,
}

impl FlashSaleProduct {
    pub fn new(product_id: ProductId, flash_price: Money, flash_stock: i64) -> Self {
        Self {
            product_id,
            flash_price,
            flash_stock,
            sold_count: 0,
        }
    }

    /// Unsold allotment.
    pub fn remaining(&self) -> i64 {
        (self.flash_stock - self.sold_count).max(0)
    }
}

/// A timed sale event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashSale {
    /// Sale identifier.
    pub id: FlashSaleId,
    /// Display name.
    pub name: String,
    /// Unix timestamp the sale opens.
    pub starts_at: i64,
    /// Unix timestamp the sale closes.
    pub ends_at: i64,
    /// Lifecycle status.
    pub status: FlashSaleStatus,
    /// Discounted products.
    pub products: Vec<FlashSaleProduct>,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

impl FlashSale {
    pub fn new(
        name: impl Into<String>,
        starts_at: i64,
        ends_at: i64,
        products: Vec<FlashSaleProduct>,
    ) -> Self {
        Self {
            id: FlashSaleId::generate(),
            name: name.into(),
            starts_at,
            ends_at,
            status: FlashSaleStatus::Scheduled,
            products,
            created_at: current_timestamp(),
        }
    }

    /// Active and inside the sale window at `now`.
    pub fn is_running(&self, now: i64) -> bool {
        self.status == FlashSaleStatus::Active && now >= self.starts_at && now <= self.ends_at
    }

    pub fn product(&self, product_id: &ProductId) -> Option<&FlashSaleProduct> {
        self.products.iter().find(|p| &p.product_id == product_id)
    }

    pub fn product_mut(&mut self, product_id: &ProductId) -> Option<&mut FlashSaleProduct> {
        self.products
            .iter_mut()
            .find(|p| &p.product_id == product_id)
    }
}

impl agora_store::Document for FlashSale {
    fn id(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_running_requires_active_status() {
        let mut sale = FlashSale::new("Noon rush", 100, 200, Vec::new());
        assert!(!sale.is_running(150));

        sale.status = FlashSaleStatus::Active;
        assert!(sale.is_running(150));
        assert!(!sale.is_running(99));
        assert!(!sale.is_running(201));
    }

    #[test]
    fn test_remaining_clamps_at_zero() {
        let mut p = FlashSaleProduct::new(ProductId::new("p1"), Money::vnd(5_000), 10);
        assert_eq!(p.remaining(), 10);
        p.sold_count = 10;
        assert_eq!(p.remaining(), 0);
        p.sold_count = 12;
        assert_eq!(p.remaining(), 0);
    }
}
