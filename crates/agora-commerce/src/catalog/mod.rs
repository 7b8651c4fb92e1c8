//! Catalog-facing types: product summaries, membership tiers,
//! inventory rows and the stock movement log.

mod inventory;
mod membership;
mod product;

pub use inventory::{
    Inventory, InventoryTransaction, StockStatus, TransactionType, DEFAULT_MIN_STOCK_LEVEL,
};
pub use membership::MembershipTier;
pub use product::{ProductStatus, ProductSummary};
