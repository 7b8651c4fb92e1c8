//! Inventory rows and the append-only stock movement log.
//!
//! An inventory row is the single source of truth for sellable quantity;
//! the product's `cached_stock` is a denormalized copy. One row per
//! product, created once when initial stock is taken in.

use crate::clock::current_timestamp;
use crate::ids::{InventoryId, InventoryTxnId, OrderId, ProductId};
use serde::{Deserialize, Serialize};

/// Default low-stock warning level for new rows.
pub const DEFAULT_MIN_STOCK_LEVEL: i64 = 10;

/// Stock status derived from available quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StockStatus {
    #[default]
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

/// Per-product stock counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    /// Row identifier.
    pub id: InventoryId,
    /// The product this row tracks (1:1).
    pub product_id: ProductId,
    /// Physical quantity on hand.
    pub current_stock: i64,
    /// Quantity held against open carts / pending orders.
    pub reserved_stock: i64,
    /// Sellable quantity, always `max(0, current - reserved)`.
    pub available_stock: i64,
    /// Low-stock warning level.
    pub min_stock_level: i64,
    /// Derived status.
    pub status: StockStatus,
    /// Cumulative quantity taken in.
    pub total_in: i64,
    /// Cumulative quantity taken out.
    pub total_out: i64,
    /// Cumulative quantity sold.
    pub total_sold: i64,
    /// Unix timestamp of the last restock.
    pub last_restocked_at: Option<i64>,
    /// Unix timestamp of the last sale.
    pub last_sold_at: Option<i64>,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of last update.
    pub updated_at: i64,
}

impl Inventory {
    /// Create a row with its initial stock already taken in.
    pub fn new(product_id: ProductId, initial_stock: i64) -> Self {
        let now = current_timestamp();
        let mut row = Self {
            id: InventoryId::generate(),
            product_id,
            current_stock: initial_stock,
            reserved_stock: 0,
            available_stock: 0,
            min_stock_level: DEFAULT_MIN_STOCK_LEVEL,
            status: StockStatus::InStock,
            total_in: initial_stock,
            total_out: 0,
            total_sold: 0,
            last_restocked_at: Some(now),
            last_sold_at: None,
            created_at: now,
            updated_at: now,
        };
        row.recalculate();
        row
    }

    /// Recompute `available_stock` and the derived status. Must run after
    /// every mutation of the counters.
    pub fn recalculate(&mut self) {
        self.available_stock = (self.current_stock - self.reserved_stock).max(0);
        self.status = if self.available_stock == 0 {
            StockStatus::OutOfStock
        } else if self.available_stock <= self.min_stock_level {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        };
        self.updated_at = current_timestamp();
    }

    /// Whether `qty` units can be taken out right now.
    pub fn can_fulfill(&self, qty: i64) -> bool {
        self.available_stock >= qty
    }
}

impl agora_store::Document for Inventory {
    fn id(&self) -> String {
        self.id.to_string()
    }
}

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Stock received.
    In,
    /// Stock shipped or removed.
    Out,
    /// Stocktake correction to an absolute quantity.
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::In => "in",
            TransactionType::Out => "out",
            TransactionType::Adjustment => "adjustment",
        }
    }
}

/// One entry in the append-only stock movement log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryTransaction {
    /// Entry identifier.
    pub id: InventoryTxnId,
    /// Inventory row this movement belongs to.
    pub inventory_id: InventoryId,
    /// Product for direct history queries.
    pub product_id: ProductId,
    /// Movement direction.
    pub kind: TransactionType,
    /// Free-form reason ("initial_stock", "order_created", ...).
    pub reason: String,
    /// Signed quantity moved.
    pub quantity: i64,
    /// Stock before the movement.
    pub quantity_before: i64,
    /// Stock after the movement; always `before + quantity`.
    pub quantity_after: i64,
    /// Order that caused the movement, if any.
    pub reference_order_id: Option<OrderId>,
    /// Who performed the movement.
    pub actor: String,
    /// Unix timestamp of the movement.
    pub created_at: i64,
}

impl InventoryTransaction {
    /// Record a movement. `quantity` is signed; the before/after pair is
    /// captured from the row being mutated.
    pub fn record(
        inventory: &Inventory,
        kind: TransactionType,
        reason: impl Into<String>,
        quantity: i64,
        quantity_before: i64,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: InventoryTxnId::generate(),
            inventory_id: inventory.id.clone(),
            product_id: inventory.product_id.clone(),
            kind,
            reason: reason.into(),
            quantity,
            quantity_before,
            quantity_after: quantity_before + quantity,
            reference_order_id: None,
            actor: actor.into(),
            created_at: current_timestamp(),
        }
    }

    /// Attach the order that caused this movement.
    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.reference_order_id = Some(order_id);
        self
    }
}

impl agora_store::Document for InventoryTransaction {
    fn id(&self) -> String {
        self.id.to_string()
    }
}
