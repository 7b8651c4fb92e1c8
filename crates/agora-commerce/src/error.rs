//! Commerce error types.

use crate::checkout::OrderStatus;
use crate::promotion::VoucherRejection;
use thiserror::Error;

/// Errors that can occur in marketplace operations.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Malformed input (missing address fields, bad phone number, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Product not found in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// No inventory row for this product.
    #[error("Inventory not found for product: {0}")]
    InventoryNotFound(String),

    /// Inventory row already exists for this product.
    #[error("Inventory already exists for product: {0}")]
    InventoryExists(String),

    /// Voucher code does not exist.
    #[error("Voucher not found: {0}")]
    VoucherNotFound(String),

    /// Flash sale not found.
    #[error("Flash sale not found: {0}")]
    FlashSaleNotFound(String),

    /// User not found.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Not enough sellable stock.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// The voucher failed one of the eligibility checks.
    #[error("Voucher {code} rejected: {reason}")]
    VoucherRejected {
        code: String,
        reason: VoucherRejection,
    },

    /// Illegal order-status transition.
    #[error("Cannot transition order from '{from}' to '{to}'")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Checkout attempted on an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Invalid quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Arithmetic overflow in a money calculation.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// Underlying document store failure.
    #[error("Store error: {0}")]
    Store(#[from] agora_store::StoreError),
}

impl CommerceError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            CommerceError::Validation(_) => "VALIDATION_ERROR",
            CommerceError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            CommerceError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            CommerceError::InventoryNotFound(_) => "INVENTORY_NOT_FOUND",
            CommerceError::InventoryExists(_) => "INVENTORY_EXISTS",
            CommerceError::VoucherNotFound(_) => "VOUCHER_NOT_FOUND",
            CommerceError::FlashSaleNotFound(_) => "FLASH_SALE_NOT_FOUND",
            CommerceError::UserNotFound(_) => "USER_NOT_FOUND",
            CommerceError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CommerceError::VoucherRejected { .. } => "VOUCHER_INVALID",
            CommerceError::InvalidTransition { .. } => "ORDER_STATUS_INVALID",
            CommerceError::EmptyCart => "ORDER_EMPTY_CART",
            CommerceError::InvalidQuantity(_) => "INVALID_QUANTITY",
            CommerceError::Overflow => "OVERFLOW",
            CommerceError::Store(_) => "STORE_ERROR",
        }
    }
}
