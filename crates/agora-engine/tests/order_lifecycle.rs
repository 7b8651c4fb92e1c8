//! Order state machine tests: transitions, cancellation side effects,
//! delivery rewards and membership upgrades.

use agora_commerce::prelude::*;
use agora_engine::collaborators::{Identity, InMemoryCatalog, InMemoryIdentity, RecordingSink};
use agora_engine::{MarketConfig, Marketplace};
use std::sync::Arc;

struct Harness {
    market: Marketplace,
    catalog: Arc<InMemoryCatalog>,
    identity: Arc<InMemoryIdentity>,
    sink: Arc<RecordingSink>,
}

fn harness() -> Harness {
    let catalog = Arc::new(InMemoryCatalog::new());
    let identity = Arc::new(InMemoryIdentity::new());
    let sink = Arc::new(RecordingSink::new());
    let market = Marketplace::new(
        catalog.clone(),
        identity.clone(),
        sink.clone(),
        MarketConfig::default(),
    );
    Harness {
        market,
        catalog,
        identity,
        sink,
    }
}

fn seed_product(h: &Harness, id: &str, price: i64, stock: i64) {
    h.catalog.put(ProductSummary::new(
        ProductId::new(id),
        format!("Product {id}"),
        Money::vnd(price),
        stock,
    ));
    h.market.ledger.create(&ProductId::new(id), stock).unwrap();
}

fn address() -> Address {
    Address::new("Nguyen Van A", "12 Hang Bac", "Ha Noi").with_phone("0912345678")
}

fn user(name: &str) -> UserId {
    UserId::new(name)
}

/// Place an order for `qty` units of `p1`.
fn place_order(h: &Harness, buyer: &UserId, qty: i64) -> Order {
    h.market.carts.add_item(buyer, &ProductId::new("p1"), qty).unwrap();
    h.market
        .checkout
        .checkout(
            buyer,
            PaymentMethod::Cod,
            ShippingMethod::Standard,
            address(),
            None,
        )
        .unwrap()
}

#[test]
fn test_happy_path_to_delivery() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);
    let order = place_order(&h, &user("u1"), 1);

    h.market.orders.confirm(&order.id).unwrap();
    h.market.orders.pack(&order.id).unwrap();
    h.market.orders.handover(&order.id).unwrap();
    let delivered = h.market.orders.deliver(&order.id).unwrap();

    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.delivered_at.is_some());
    // COD settles on delivery.
    assert_eq!(delivered.payment_status, PaymentStatus::Paid);
}

#[test]
fn test_no_skipping_states() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);
    let order = place_order(&h, &user("u1"), 1);

    let err = h.market.orders.deliver(&order.id).unwrap_err();
    assert!(matches!(
        err,
        CommerceError::InvalidTransition {
            from: OrderStatus::Processing,
            to: OrderStatus::Delivered,
        }
    ));
}

#[test]
fn test_cancel_restocks_and_refunds_voucher() {
    let h = harness();
    seed_product(&h, "p1", 500_000, 10);

    let mut v = Voucher::new(
        "TEN",
        "Ten percent off",
        VoucherValue::Percentage {
            percent: 10.0,
            max_discount: None,
        },
        0,
        i64::MAX,
    );
    v.usage_limit = Some(10);
    h.market.vouchers.create(&v).unwrap();
    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 2).unwrap();
    h.market.carts.apply_voucher(&user("u1"), "TEN").unwrap();
    let order = h
        .market
        .checkout
        .checkout(
            &user("u1"),
            PaymentMethod::Cod,
            ShippingMethod::Standard,
            address(),
            None,
        )
        .unwrap();
    assert_eq!(
        h.market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(8)
    );

    let cancelled = h
        .market
        .orders
        .cancel(&order.id, "changed my mind", "u1")
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed my mind"));
    assert_eq!(cancelled.cancelled_by.as_deref(), Some("u1"));

    // Stock back, voucher use returned.
    assert_eq!(
        h.market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(10)
    );
    assert_eq!(
        h.market.vouchers.find_by_code("TEN").unwrap().unwrap().used_count,
        0
    );
    let usage = h.market.vouchers.usage_for_order(&order.id).unwrap().unwrap();
    assert_eq!(usage.status, UsageStatus::Refunded);

    // Cancelling again is a no-op, counters stay put.
    h.market.orders.cancel(&order.id, "again", "u1").unwrap();
    assert_eq!(
        h.market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(10)
    );
}

#[test]
fn test_cancel_restocks_even_when_voucher_refund_fails() {
    let h = harness();
    seed_product(&h, "p1", 500_000, 10);

    let mut v = Voucher::new(
        "TEN",
        "Ten percent off",
        VoucherValue::Percentage {
            percent: 10.0,
            max_discount: None,
        },
        0,
        i64::MAX,
    );
    v.usage_limit = Some(10);
    h.market.vouchers.create(&v).unwrap();
    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 2).unwrap();
    h.market.carts.apply_voucher(&user("u1"), "TEN").unwrap();
    let order = h
        .market
        .checkout
        .checkout(
            &user("u1"),
            PaymentMethod::Cod,
            ShippingMethod::Standard,
            address(),
            None,
        )
        .unwrap();

    // The voucher definition disappears before the cancellation, so the
    // refund's counter decrement has nothing to write to.
    h.market.store.vouchers.remove(v.id.as_str()).unwrap();

    let cancelled = h
        .market
        .orders
        .cancel(&order.id, "changed my mind", "u1")
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    // The restock ran despite the failed refund.
    assert_eq!(
        h.market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(10)
    );
}

#[test]
fn test_cancel_allowed_from_shipping() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);
    let order = place_order(&h, &user("u1"), 1);

    h.market.orders.confirm(&order.id).unwrap();
    h.market.orders.pack(&order.id).unwrap();
    h.market.orders.handover(&order.id).unwrap();

    let cancelled = h
        .market
        .orders
        .cancel(&order.id, "lost parcel", "seller")
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(
        h.market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(10)
    );
}

#[test]
fn test_cancel_rejected_after_delivery() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);
    let order = place_order(&h, &user("u1"), 1);

    h.market.orders.confirm(&order.id).unwrap();
    h.market.orders.pack(&order.id).unwrap();
    h.market.orders.handover(&order.id).unwrap();
    h.market.orders.deliver(&order.id).unwrap();

    let err = h
        .market
        .orders
        .cancel(&order.id, "too late", "u1")
        .unwrap_err();
    assert!(matches!(err, CommerceError::InvalidTransition { .. }));
}

#[test]
fn test_refund_after_cancel() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);
    let order = place_order(&h, &user("u1"), 1);

    h.market.orders.cancel(&order.id, "mind changed", "u1").unwrap();
    let refunded = h.market.orders.refund(&order.id, "prepaid online").unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    assert_eq!(refunded.refund_reason.as_deref(), Some("prepaid online"));
}

#[test]
fn test_return_then_refund() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);
    let order = place_order(&h, &user("u1"), 1);

    h.market.orders.confirm(&order.id).unwrap();
    h.market.orders.pack(&order.id).unwrap();
    h.market.orders.handover(&order.id).unwrap();
    h.market.orders.deliver(&order.id).unwrap();

    let returned = h
        .market
        .orders
        .return_order(&order.id, "damaged on arrival")
        .unwrap();
    assert_eq!(returned.status, OrderStatus::Returned);
    assert_eq!(returned.return_reason.as_deref(), Some("damaged on arrival"));

    let refunded = h.market.orders.refund(&order.id, "returned").unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);
    // Terminal: nothing moves from refunded.
    assert!(h.market.orders.confirm(&order.id).is_err());
}

#[test]
fn test_delivery_grants_purchase_reward_once() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);
    let reward = Voucher::new(
        "PURCHASE_REWARD",
        "Thanks for buying",
        VoucherValue::FixedAmount(Money::vnd(20_000)),
        0,
        i64::MAX,
    );
    h.market.vouchers.create(&reward).unwrap();

    let order = place_order(&h, &user("u1"), 1);
    h.market.orders.confirm(&order.id).unwrap();
    h.market.orders.pack(&order.id).unwrap();
    h.market.orders.handover(&order.id).unwrap();
    h.market.orders.deliver(&order.id).unwrap();
    // Repeat delivery is a no-op, no double grant.
    h.market.orders.deliver(&order.id).unwrap();

    let wallet = h.market.vouchers.wallet(&user("u1")).unwrap();
    assert_eq!(wallet.len(), 1);
    assert_eq!(wallet[0].voucher_code, "PURCHASE_REWARD");
    assert_eq!(wallet[0].granted_for_order, Some(order.id.clone()));
}

#[test]
fn test_delivery_upgrades_membership() {
    let h = harness();
    seed_product(&h, "p1", 1_200_000, 10);
    let order = place_order(&h, &user("u1"), 1);

    h.market.orders.confirm(&order.id).unwrap();
    h.market.orders.pack(&order.id).unwrap();
    h.market.orders.handover(&order.id).unwrap();
    h.market.orders.deliver(&order.id).unwrap();

    assert_eq!(
        h.identity.membership(&user("u1")).unwrap(),
        MembershipTier::Vip1
    );
    assert!(h
        .sink
        .sent()
        .iter()
        .any(|n| n.title == "Membership upgraded"));
}

#[test]
fn test_every_transition_notifies() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);
    let order = place_order(&h, &user("u1"), 1);

    h.market.orders.confirm(&order.id).unwrap();
    h.market.orders.pack(&order.id).unwrap();

    let updates = h
        .sink
        .sent()
        .iter()
        .filter(|n| n.title == "Order update")
        .count();
    assert_eq!(updates, 2);
}
