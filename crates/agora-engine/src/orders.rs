//! Order lifecycle operations.
//!
//! Every move goes through `OrderStatus::can_transition_to`; repeating a
//! call on an order already in the target state is a no-op and skips
//! the side effects. Cancellation returns the voucher and restocks
//! every line; delivery recomputes the buyer's membership tier and
//! grants the purchase reward.

use crate::collaborators::{Identity, NotificationCategory, NotificationSink};
use crate::config::MarketConfig;
use crate::data::Datastore;
use crate::ledger::InventoryLedger;
use crate::vouchers::VoucherEngine;
use agora_commerce::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

pub struct OrderService {
    store: Arc<Datastore>,
    identity: Arc<dyn Identity>,
    sink: Arc<dyn NotificationSink>,
    ledger: Arc<InventoryLedger>,
    vouchers: Arc<VoucherEngine>,
    config: MarketConfig,
}

impl OrderService {
    pub fn new(
        store: Arc<Datastore>,
        identity: Arc<dyn Identity>,
        sink: Arc<dyn NotificationSink>,
        ledger: Arc<InventoryLedger>,
        vouchers: Arc<VoucherEngine>,
        config: MarketConfig,
    ) -> Self {
        Self {
            store,
            identity,
            sink,
            ledger,
            vouchers,
            config,
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        self.store
            .orders
            .get(order_id.as_str())?
            .ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))
    }

    /// Orders of one user, newest first.
    pub fn for_user(&self, user_id: &UserId) -> Result<Vec<Order>, CommerceError> {
        let mut orders = self.store.orders.find(|o| &o.user_id == user_id)?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Seller confirms the order.
    pub fn confirm(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        let (order, changed) = self.transition(order_id, OrderStatus::Confirmed, |_| {})?;
        if changed {
            self.notify_status(&order);
        }
        Ok(order)
    }

    /// Order packed and ready for pickup.
    pub fn pack(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        let (order, changed) = self.transition(order_id, OrderStatus::Packed, |_| {})?;
        if changed {
            self.notify_status(&order);
        }
        Ok(order)
    }

    /// Order handed to the carrier.
    pub fn handover(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        let (order, changed) = self.transition(order_id, OrderStatus::Shipping, |_| {})?;
        if changed {
            self.notify_status(&order);
        }
        Ok(order)
    }

    /// Buyer received the order. Settles COD payment, recomputes the
    /// buyer's membership tier and grants the purchase reward.
    pub fn deliver(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        let now = current_timestamp();
        let (order, changed) = self.transition(order_id, OrderStatus::Delivered, |o| {
            o.delivered_at = Some(now);
            if o.payment_method == PaymentMethod::Cod {
                o.payment_status = PaymentStatus::Paid;
            }
        })?;
        if !changed {
            return Ok(order);
        }

        self.recompute_membership(&order.user_id);
        if let Err(e) = self
            .vouchers
            .grant_purchase_reward(&order.user_id, &order.id)
        {
            warn!(order = %order.id, error = %e, "purchase reward grant failed");
        }
        self.notify_status(&order);
        Ok(order)
    }

    /// Cancel before delivery. Returns the voucher redemption and puts
    /// every line back in stock.
    pub fn cancel(
        &self,
        order_id: &OrderId,
        reason: &str,
        actor: &str,
    ) -> Result<Order, CommerceError> {
        let now = current_timestamp();
        let (order, changed) = self.transition(order_id, OrderStatus::Cancelled, |o| {
            o.cancellation_reason = Some(reason.to_string());
            o.cancelled_by = Some(actor.to_string());
            o.cancelled_at = Some(now);
        })?;
        if !changed {
            return Ok(order);
        }

        // The Cancelled status is already committed; compensations are
        // best-effort and must all get their chance to run, since a
        // retried cancel is a no-op and will not repeat them.
        if let Err(e) = self.vouchers.refund(&order.id) {
            warn!(order = %order.id, error = %e, "voucher refund after cancellation failed");
        }
        for item in &order.items {
            if let Err(e) =
                self.ledger
                    .stock_in(&item.product_id, item.quantity, "order_cancelled", actor)
            {
                warn!(order = %order.id, product = %item.product_id, error = %e,
                    "restock after cancellation failed");
            }
        }
        info!(order = %order.id, reason, actor, "order cancelled");
        self.notify_status(&order);
        Ok(order)
    }

    /// Buyer returns a delivered order.
    pub fn return_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, CommerceError> {
        let (order, changed) = self.transition(order_id, OrderStatus::Returned, |o| {
            o.return_reason = Some(reason.to_string());
        })?;
        if changed {
            self.notify_status(&order);
        }
        Ok(order)
    }

    /// Money goes back to the buyer.
    pub fn refund(&self, order_id: &OrderId, reason: &str) -> Result<Order, CommerceError> {
        let (order, changed) = self.transition(order_id, OrderStatus::Refunded, |o| {
            o.refund_reason = Some(reason.to_string());
            o.payment_status = PaymentStatus::Refunded;
        })?;
        if changed {
            self.notify_status(&order);
        }
        Ok(order)
    }

    /// Apply a transition through the CAS cycle. `mutate` only runs
    /// when the status actually changes.
    fn transition(
        &self,
        order_id: &OrderId,
        next: OrderStatus,
        mutate: impl Fn(&mut Order),
    ) -> Result<(Order, bool), CommerceError> {
        self.store.orders.update(
            order_id.as_str(),
            self.config.max_cas_attempts,
            |order: &mut Order| -> Result<bool, CommerceError> {
                let changed = order.status != next;
                order.transition_to(next)?;
                if changed {
                    mutate(order);
                }
                Ok(changed)
            },
        )
    }

    /// Upgrade the buyer's tier from lifetime delivered spend. Tiers
    /// never downgrade here.
    fn recompute_membership(&self, user_id: &UserId) {
        let spend = self
            .store
            .orders
            .find(|o| &o.user_id == user_id && o.status == OrderStatus::Delivered)
            .map(|orders| {
                orders
                    .iter()
                    .fold(Money::vnd(0), |acc, o| {
                        acc.try_add(&o.total).unwrap_or(acc)
                    })
            });
        let spend = match spend {
            Ok(spend) => spend,
            Err(e) => {
                warn!(user = %user_id, error = %e, "membership recompute failed");
                return;
            }
        };
        let earned = MembershipTier::for_lifetime_spend(spend);
        match self.identity.membership(user_id) {
            Ok(current) if earned > current => {
                if let Err(e) = self.identity.set_membership(user_id, earned) {
                    warn!(user = %user_id, error = %e, "membership upgrade failed");
                } else {
                    info!(user = %user_id, tier = %earned, "membership upgraded");
                    self.sink.notify(
                        user_id,
                        "Membership upgraded",
                        &format!("You are now {earned}"),
                        NotificationCategory::Promotion,
                    );
                }
            }
            Ok(_) => {}
            Err(e) => warn!(user = %user_id, error = %e, "membership lookup failed"),
        }
    }

    fn notify_status(&self, order: &Order) {
        self.sink.notify(
            &order.user_id,
            "Order update",
            &format!("Order {} is now {}", order.id, order.status),
            NotificationCategory::Order,
        );
    }
}
