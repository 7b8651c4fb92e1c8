//! Orders and the order status state machine.
//!
//! `OrderStatus::can_transition_to` is the only transition table in the
//! codebase. Same-state transitions are allowed so repeated calls are
//! idempotent no-ops at the service layer.

use crate::checkout::address::Address;
use crate::checkout::shipping::ShippingMethod;
use crate::clock::current_timestamp;
use crate::error::CommerceError;
use crate::ids::{FlashSaleId, OrderId, ProductId, UserId};
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Placed, awaiting seller confirmation.
    #[default]
    Processing,
    /// Seller confirmed.
    Confirmed,
    /// Packed, ready for carrier pickup.
    Packed,
    /// Handed to the carrier.
    Shipping,
    /// Received by the buyer.
    Delivered,
    /// Cancelled before delivery.
    Cancelled,
    /// Returned after delivery.
    Returned,
    /// Money returned to the buyer.
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Packed => "packed",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Whether moving to `next` is legal. Cancellation is allowed from
    /// any state before delivery, including shipping.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            OrderStatus::Processing => {
                matches!(next, OrderStatus::Confirmed | OrderStatus::Cancelled)
            }
            OrderStatus::Confirmed => matches!(next, OrderStatus::Packed | OrderStatus::Cancelled),
            OrderStatus::Packed => matches!(next, OrderStatus::Shipping | OrderStatus::Cancelled),
            OrderStatus::Shipping => {
                matches!(next, OrderStatus::Delivered | OrderStatus::Cancelled)
            }
            OrderStatus::Delivered => matches!(next, OrderStatus::Returned | OrderStatus::Refunded),
            OrderStatus::Cancelled => matches!(next, OrderStatus::Refunded),
            OrderStatus::Returned => matches!(next, OrderStatus::Refunded),
            OrderStatus::Refunded => false,
        }
    }

    /// Terminal states accept no further movement (other than the
    /// refund paths encoded above).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Refunded)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the buyer's money has moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// How the buyer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    Cod,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

/// Immutable snapshot of one ordered line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Ordered product.
    pub product_id: ProductId,
    /// Name at order time.
    pub name: String,
    /// Image at order time.
    pub image: Option<String>,
    /// Units ordered.
    pub quantity: i64,
    /// Unit price actually charged.
    pub unit_price: Money,
    /// Flash sale the price came from, if any.
    pub flash_sale_id: Option<FlashSaleId>,
}

impl OrderItem {
    /// Line total (`unit_price * quantity`).
    pub fn line_total(&self) -> Result<Money, CommerceError> {
        self.unit_price
            .try_multiply(self.quantity)
            .ok_or(CommerceError::Overflow)
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier, also the checkout idempotency key.
    pub id: OrderId,
    /// Buying user.
    pub user_id: UserId,
    /// Snapshot lines, never mutated after placement.
    pub items: Vec<OrderItem>,
    /// Sum of line totals.
    pub subtotal: Money,
    /// Voucher discount applied.
    pub discount_amount: Money,
    /// Shipping fee charged (zero if waived).
    pub shipping_fee: Money,
    /// `subtotal - discount + shipping_fee`.
    pub total: Money,
    /// Redeemed voucher code, if any.
    pub voucher_code: Option<String>,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Payment method.
    pub payment_method: PaymentMethod,
    /// Shipping method.
    pub shipping_method: ShippingMethod,
    /// Delivery address.
    pub address: Address,
    /// Why the order was cancelled.
    pub cancellation_reason: Option<String>,
    /// Who cancelled it.
    pub cancelled_by: Option<String>,
    /// Unix timestamp of cancellation.
    pub cancelled_at: Option<i64>,
    /// Why the order was returned.
    pub return_reason: Option<String>,
    /// Why the order was refunded.
    pub refund_reason: Option<String>,
    /// Unix timestamp of delivery.
    pub delivered_at: Option<i64>,
    /// Unix timestamp of placement.
    pub created_at: i64,
    /// Unix timestamp of last status change.
    pub updated_at: i64,
}

impl Order {
    /// Total number of units across all lines.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Apply a legal status transition, refreshing `updated_at`.
    /// A same-state transition is accepted and changes nothing.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), CommerceError> {
        if !self.status.can_transition_to(next) {
            return Err(CommerceError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if self.status != next {
            self.status = next;
            self.updated_at = current_timestamp();
        }
        Ok(())
    }
}

impl agora_store::Document for Order {
    fn id(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let chain = [
            OrderStatus::Processing,
            OrderStatus::Confirmed,
            OrderStatus::Packed,
            OrderStatus::Shipping,
            OrderStatus::Delivered,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_cancel_allowed_until_delivery() {
        for from in [
            OrderStatus::Processing,
            OrderStatus::Confirmed,
            OrderStatus::Packed,
            OrderStatus::Shipping,
        ] {
            assert!(from.can_transition_to(OrderStatus::Cancelled), "{from}");
        }
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_refund_paths() {
        assert!(OrderStatus::Cancelled.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Returned.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Refunded.can_transition_to(OrderStatus::Processing));
    }

    #[test]
    fn test_no_skipping_forward() {
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Shipping));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Processing));
    }

    #[test]
    fn test_same_state_is_noop() {
        assert!(OrderStatus::Shipping.can_transition_to(OrderStatus::Shipping));
    }
}
