//! Checkout orchestration.
//!
//! Checkout runs as a compensating saga keyed by a pre-generated order
//! id. Side effects happen in a fixed sequence: voucher redemption,
//! then per-line stock deduction, then the order write. A deduction
//! failure restocks every line already taken and returns the
//! redemption, so a failed checkout leaves nothing behind. A voucher
//! that fails validation or loses the redemption race is dropped and
//! the order proceeds at full price; vouchers never block a purchase.

use crate::collaborators::{Catalog, NotificationCategory, NotificationSink};
use crate::data::Datastore;
use crate::carts::CartManager;
use crate::flash::FlashSaleTracker;
use crate::ledger::InventoryLedger;
use crate::vouchers::VoucherEngine;
use agora_commerce::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

/// National mobile numbers: leading 0 or +84, then a valid carrier
/// prefix and eight digits.
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|\+84)[35789]\d{8}$").expect("phone pattern must parse"));

pub struct CheckoutOrchestrator {
    store: Arc<Datastore>,
    catalog: Arc<dyn Catalog>,
    sink: Arc<dyn NotificationSink>,
    carts: Arc<CartManager>,
    ledger: Arc<InventoryLedger>,
    vouchers: Arc<VoucherEngine>,
    flash: Arc<FlashSaleTracker>,
}

impl CheckoutOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Datastore>,
        catalog: Arc<dyn Catalog>,
        sink: Arc<dyn NotificationSink>,
        carts: Arc<CartManager>,
        ledger: Arc<InventoryLedger>,
        vouchers: Arc<VoucherEngine>,
        flash: Arc<FlashSaleTracker>,
    ) -> Self {
        Self {
            store,
            catalog,
            sink,
            carts,
            ledger,
            vouchers,
            flash,
        }
    }

    /// Place an order from the user's cart.
    ///
    /// Returns the persisted order, or a typed error with no side
    /// effects left behind.
    pub fn checkout(
        &self,
        user_id: &UserId,
        payment_method: PaymentMethod,
        shipping_method: ShippingMethod,
        address: Address,
        voucher_code: Option<&str>,
    ) -> Result<Order, CommerceError> {
        let cart = self
            .carts
            .find(user_id)?
            .filter(|c| !c.is_empty())
            .ok_or(CommerceError::EmptyCart)?;

        validate_address(&address)?;

        // Immutable snapshot of what the user is buying.
        let mut items = Vec::with_capacity(cart.items.len());
        let mut subtotal = Money::zero(Currency::VND);
        for line in &cart.items {
            let product = self.catalog.product(&line.product_id)?;
            let item = OrderItem {
                product_id: line.product_id.clone(),
                name: product.name,
                image: product.image,
                quantity: line.quantity,
                unit_price: line.unit_price,
                flash_sale_id: line.flash_sale_id.clone(),
            };
            subtotal = subtotal
                .try_add(&item.line_total()?)
                .ok_or(CommerceError::Overflow)?;
            items.push(item);
        }

        // Pre-check before any side effect, so the common failure is
        // side-effect free. The ledger is the sole stock authority at
        // checkout; a product without a ledger row cannot be sold.
        for item in &items {
            let available = self
                .ledger
                .available(&item.product_id)?
                .ok_or_else(|| CommerceError::InventoryNotFound(item.product_id.to_string()))?;
            if available < item.quantity {
                return Err(CommerceError::InsufficientStock {
                    product_id: item.product_id.to_string(),
                    requested: item.quantity,
                    available,
                });
            }
        }

        let mut shipping_fee = shipping_method.fee();
        let mut discount = Money::zero(subtotal.currency);
        // (voucher, discount to record on the usage)
        let mut applied: Option<(Voucher, Money)> = None;

        let chosen = voucher_code
            .map(str::to_string)
            .or_else(|| cart.voucher_code.clone());
        if let Some(code) = &chosen {
            let (product_ids, category_ids, shop_id) = self.carts.context(&cart)?;
            match self.vouchers.validate_for_order(
                code,
                user_id,
                subtotal,
                shop_id.as_ref(),
                &product_ids,
                &category_ids,
            ) {
                Ok(voucher) => {
                    let d = voucher.calculate_discount(subtotal, shipping_fee);
                    if matches!(voucher.value, VoucherValue::FreeShipping) {
                        shipping_fee = Money::zero(shipping_fee.currency);
                    } else {
                        discount = d;
                    }
                    applied = Some((voucher, d));
                }
                Err(CommerceError::VoucherRejected { code, reason }) => {
                    info!(voucher = %code, %reason, "voucher dropped at checkout");
                }
                Err(e) => return Err(e),
            }
        }

        // The order id is minted before any write and keys every side
        // effect, including the compensations.
        let order_id = OrderId::generate();

        let mut redeemed = false;
        if let Some((voucher, d)) = applied.take() {
            match self
                .vouchers
                .redeem(user_id, &order_id, &voucher.code, subtotal, d)
            {
                Ok(_) => {
                    redeemed = true;
                    applied = Some((voucher, d));
                }
                Err(CommerceError::VoucherRejected { code, reason }) => {
                    // Lost the race on the last use. Full price.
                    info!(voucher = %code, %reason, "redemption lost, proceeding without voucher");
                    discount = Money::zero(subtotal.currency);
                    shipping_fee = shipping_method.fee();
                }
                Err(e) => return Err(e),
            }
        }

        let mut deducted: Vec<(ProductId, i64)> = Vec::new();
        for item in &items {
            match self.ledger.stock_out(
                &item.product_id,
                item.quantity,
                Some(&order_id),
                "order_created",
                user_id.as_str(),
            ) {
                Ok(_) => deducted.push((item.product_id.clone(), item.quantity)),
                Err(e) => {
                    self.compensate(&order_id, &deducted, redeemed);
                    return Err(e);
                }
            }
        }

        let total = subtotal
            .try_subtract(&discount)
            .and_then(|m| m.try_add(&shipping_fee))
            .ok_or(CommerceError::Overflow)?;

        let now = current_timestamp();
        let order = Order {
            id: order_id.clone(),
            user_id: user_id.clone(),
            items,
            subtotal,
            discount_amount: discount,
            shipping_fee,
            total,
            voucher_code: applied.as_ref().map(|(v, _)| v.code.clone()),
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Unpaid,
            payment_method,
            shipping_method,
            address,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            return_reason: None,
            refund_reason: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.orders.insert(&order)?;

        self.flash.settle_order(&order);

        if let Err(e) = self.carts.clear(user_id) {
            warn!(user = %user_id, error = %e, "failed to clear cart after checkout");
        }
        self.sink.notify(
            user_id,
            "Order placed",
            &format!("Order {} has been placed, total {}", order.id, order.total),
            NotificationCategory::Order,
        );
        info!(order = %order.id, user = %user_id, total = %order.total, "checkout complete");
        Ok(order)
    }

    /// Undo the saga's side effects after a mid-deduction failure.
    fn compensate(&self, order_id: &OrderId, deducted: &[(ProductId, i64)], redeemed: bool) {
        for (product_id, qty) in deducted {
            if let Err(e) =
                self.ledger
                    .stock_in(product_id, *qty, "checkout_rollback", "system")
            {
                warn!(order = %order_id, product = %product_id, error = %e,
                    "checkout rollback failed to restock");
            }
        }
        if redeemed {
            if let Err(e) = self.vouchers.refund(order_id) {
                warn!(order = %order_id, error = %e, "checkout rollback failed to refund voucher");
            }
        }
    }
}

/// Recipient, street and city must be present; an optional phone must
/// look like a national mobile number.
fn validate_address(address: &Address) -> Result<(), CommerceError> {
    if !address.is_complete() {
        return Err(CommerceError::Validation(
            "address requires recipient, street and city".to_string(),
        ));
    }
    if let Some(phone) = &address.phone {
        if !PHONE_RE.is_match(phone) {
            return Err(CommerceError::Validation(format!(
                "invalid phone number: {phone}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_pattern() {
        for good in ["0912345678", "+84912345678", "0351234567", "0788888888"] {
            assert!(PHONE_RE.is_match(good), "{good}");
        }
        for bad in ["091234567", "09123456789", "0112345678", "84912345678", "hello"] {
            assert!(!PHONE_RE.is_match(bad), "{bad}");
        }
    }

    #[test]
    fn test_address_validation() {
        let ok = Address::new("Nguyen Van A", "12 Hang Bac", "Ha Noi").with_phone("0912345678");
        assert!(validate_address(&ok).is_ok());

        let no_city = Address::new("Nguyen Van A", "12 Hang Bac", " ");
        assert!(validate_address(&no_city).is_err());

        let bad_phone = Address::new("Nguyen Van A", "12 Hang Bac", "Ha Noi").with_phone("12345");
        assert!(validate_address(&bad_phone).is_err());
    }
}
