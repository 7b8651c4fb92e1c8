//! Marketplace domain types and logic for Agora.
//!
//! This crate provides the core commerce types of the marketplace:
//!
//! - **Catalog**: product summaries, membership tiers, inventory rows
//!   and the append-only stock movement log
//! - **Cart**: shopping cart with flash-price-aware lines and derived
//!   totals
//! - **Promotion**: vouchers, user wallets, usage records, flash sales
//! - **Checkout**: addresses, shipping methods, orders and the order
//!   status state machine
//!
//! Services that move money and stock live in `agora-engine`; this
//! crate is pure data and rules.
//!
//! # Example
//!
//! ```rust,ignore
//! use agora_commerce::prelude::*;
//!
//! let mut cart = Cart::new(UserId::new("user-1"));
//! cart.add_item(CartItem {
//!     product_id: ProductId::new("prod-1"),
//!     name: "Jasmine rice 5kg".to_string(),
//!     image: None,
//!     quantity: 2,
//!     unit_price: Money::vnd(120_000),
//!     flash_sale_id: None,
//! })?;
//! cart.recompute_totals(Money::vnd(0));
//! println!("Total: {}", cart.total_price.display());
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod clock;
pub mod promotion;

pub use error::CommerceError;
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::clock::current_timestamp;
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Catalog
    pub use crate::catalog::{
        Inventory, InventoryTransaction, MembershipTier, ProductStatus, ProductSummary,
        StockStatus, TransactionType, DEFAULT_MIN_STOCK_LEVEL,
    };

    // Cart
    pub use crate::cart::{Cart, CartItem};

    // Promotion
    pub use crate::promotion::{
        FlashSale, FlashSaleProduct, FlashSaleStatus, UsageStatus, UserVoucher, Voucher,
        VoucherRejection, VoucherStatus, VoucherUsage, VoucherValue,
    };

    // Checkout
    pub use crate::checkout::{
        Address, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingMethod,
    };
}
