//! End-to-end checkout tests against in-memory collaborators.

use agora_commerce::prelude::*;
use agora_engine::collaborators::{InMemoryCatalog, InMemoryIdentity, RecordingSink};
use agora_engine::{MarketConfig, Marketplace};
use std::sync::Arc;

struct Harness {
    market: Marketplace,
    catalog: Arc<InMemoryCatalog>,
    sink: Arc<RecordingSink>,
}

fn harness() -> Harness {
    let catalog = Arc::new(InMemoryCatalog::new());
    let identity = Arc::new(InMemoryIdentity::new());
    let sink = Arc::new(RecordingSink::new());
    let market = Marketplace::new(
        catalog.clone(),
        identity,
        sink.clone(),
        MarketConfig::default(),
    );
    Harness {
        market,
        catalog,
        sink,
    }
}

/// Seed a product in the catalog and its ledger row.
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

#[test]
fn test_checkout_happy_path() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);

    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 2).unwrap();
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

    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(order.subtotal, Money::vnd(400_000));
    assert_eq!(order.shipping_fee, Money::vnd(30_000));
    assert_eq!(order.total, Money::vnd(430_000));

    // Stock moved and the movement references the order.
    assert_eq!(
        h.market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(8)
    );
    let txns = h.market.ledger.transactions(&ProductId::new("p1")).unwrap();
    assert_eq!(
        txns.last().unwrap().reference_order_id,
        Some(order.id.clone())
    );

    // Cart is empty again and the buyer was told.
    let cart = h.market.carts.get_or_create(&user("u1")).unwrap();
    assert!(cart.is_empty());
    assert!(h.sink.sent().iter().any(|n| n.title == "Order placed"));
}

#[test]
fn test_checkout_empty_cart_rejected() {
    let h = harness();
    let err = h
        .market
        .checkout
        .checkout(
            &user("u1"),
            PaymentMethod::Cod,
            ShippingMethod::Standard,
            address(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CommerceError::EmptyCart));
}

#[test]
fn test_checkout_invalid_address_has_no_side_effects() {
    let h = harness();
    seed_product(&h, "p1", 200_000, 10);
    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 1).unwrap();

    let bad = Address::new("Nguyen Van A", "12 Hang Bac", "Ha Noi").with_phone("12345");
    let err = h
        .market
        .checkout
        .checkout(
            &user("u1"),
            PaymentMethod::Cod,
            ShippingMethod::Standard,
            bad,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)));

    // Nothing moved, the cart is intact.
    assert_eq!(
        h.market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(10)
    );
    let cart = h.market.carts.get_or_create(&user("u1")).unwrap();
    assert_eq!(cart.item_count(), 1);
}

#[test]
fn test_checkout_flash_sale_pricing_and_settlement() {
    let h = harness();
    seed_product(&h, "p1", 100_000, 10);

    let now = current_timestamp();
    let mut sale = FlashSale::new(
        "Noon rush",
        now - 60,
        now + 3_600,
        vec![FlashSaleProduct::new(
            ProductId::new("p1"),
            Money::vnd(70_000),
            5,
        )],
    );
    sale.status = FlashSaleStatus::Active;
    h.market.flash.create(&sale).unwrap();

    let cart = h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 2).unwrap();
    assert_eq!(cart.items[0].unit_price, Money::vnd(70_000));
    assert_eq!(cart.items[0].flash_sale_id, Some(sale.id.clone()));

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
    assert_eq!(order.items[0].unit_price, Money::vnd(70_000));
    assert_eq!(order.subtotal, Money::vnd(140_000));

    // Settlement advanced the sold counter by reference.
    let stored = h.market.flash.get(&sale.id).unwrap();
    assert_eq!(stored.products[0].sold_count, 2);
}

#[test]
fn test_checkout_with_percentage_voucher() {
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
    v.usage_limit = Some(100);
    h.market.vouchers.create(&v).unwrap();

    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 1).unwrap();
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

    assert_eq!(order.discount_amount, Money::vnd(50_000));
    assert_eq!(order.total, Money::vnd(480_000));
    assert_eq!(order.voucher_code.as_deref(), Some("TEN"));

    let stored = h.market.vouchers.find_by_code("TEN").unwrap().unwrap();
    assert_eq!(stored.used_count, 1);
    let usage = h.market.vouchers.usage_for_order(&order.id).unwrap().unwrap();
    assert_eq!(usage.status, UsageStatus::Used);
    assert_eq!(usage.discount_amount, Money::vnd(50_000));
}

#[test]
fn test_checkout_free_shipping_voucher_zeroes_fee() {
    let h = harness();
    seed_product(&h, "p1", 500_000, 10);
    let v = Voucher::new("FREESHIP", "Free shipping", VoucherValue::FreeShipping, 0, i64::MAX);
    h.market.vouchers.create(&v).unwrap();

    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 1).unwrap();
    let order = h
        .market
        .checkout
        .checkout(
            &user("u1"),
            PaymentMethod::Cod,
            ShippingMethod::Express,
            address(),
            Some("FREESHIP"),
        )
        .unwrap();

    assert_eq!(order.shipping_fee, Money::vnd(0));
    assert_eq!(order.discount_amount, Money::vnd(0));
    assert_eq!(order.total, Money::vnd(500_000));
    // The waived fee is what the usage records.
    let usage = h.market.vouchers.usage_for_order(&order.id).unwrap().unwrap();
    assert_eq!(usage.discount_amount, Money::vnd(60_000));
}

#[test]
fn test_checkout_invalid_voucher_dropped_silently() {
    let h = harness();
    seed_product(&h, "p1", 500_000, 10);

    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 1).unwrap();
    let order = h
        .market
        .checkout
        .checkout(
            &user("u1"),
            PaymentMethod::Cod,
            ShippingMethod::Standard,
            address(),
            Some("DOES_NOT_EXIST"),
        )
        .unwrap();

    // Full price, no voucher on the order.
    assert_eq!(order.discount_amount, Money::vnd(0));
    assert_eq!(order.voucher_code, None);
    assert_eq!(order.total, Money::vnd(530_000));
}

#[test]
fn test_checkout_insufficient_stock_aborts_clean() {
    let h = harness();
    seed_product(&h, "p1", 100_000, 1);

    // The cart was filled while stock was there; someone else bought it.
    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 1).unwrap();
    h.market
        .ledger
        .stock_out(&ProductId::new("p1"), 1, None, "order_created", "u2")
        .unwrap();

    let err = h
        .market
        .checkout
        .checkout(
            &user("u1"),
            PaymentMethod::Cod,
            ShippingMethod::Standard,
            address(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CommerceError::InsufficientStock { .. }));

    // Cart untouched, no order written.
    let cart = h.market.carts.get_or_create(&user("u1")).unwrap();
    assert_eq!(cart.item_count(), 1);
    assert!(h.market.orders.for_user(&user("u1")).unwrap().is_empty());
}

#[test]
fn test_checkout_rejects_product_without_ledger_row() {
    let h = harness();
    seed_product(&h, "p1", 100_000, 10);
    // p2 exists in the catalog with stock on paper but has no ledger
    // row; the pre-check refuses it before anything moves.
    h.catalog.put(ProductSummary::new(
        ProductId::new("p2"),
        "Phantom",
        Money::vnd(50_000),
        5,
    ));

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

    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 3).unwrap();
    h.market.carts.add_item(&user("u1"), &ProductId::new("p2"), 1).unwrap();
    h.market.carts.apply_voucher(&user("u1"), "TEN").unwrap();

    let err = h
        .market
        .checkout
        .checkout(
            &user("u1"),
            PaymentMethod::Cod,
            ShippingMethod::Standard,
            address(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, CommerceError::InventoryNotFound(_)));

    // No stock moved, no redemption happened, no order was written and
    // the cart is intact.
    assert_eq!(
        h.market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(10)
    );
    let stored = h.market.vouchers.find_by_code("TEN").unwrap().unwrap();
    assert_eq!(stored.used_count, 0);
    assert!(h.market.orders.for_user(&user("u1")).unwrap().is_empty());
    let cart = h.market.carts.get_or_create(&user("u1")).unwrap();
    assert_eq!(cart.items.len(), 2);
}

#[test]
fn test_losing_checkout_leaves_no_trace() {
    let h = harness();
    seed_product(&h, "p1", 100_000, 10);
    seed_product(&h, "p2", 50_000, 1);

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

    // Both carts take p1 first, then contend on the last unit of p2, so
    // the loser can fail after its p1 deduction and voucher redemption.
    for name in ["u1", "u2"] {
        h.market.carts.add_item(&user(name), &ProductId::new("p1"), 1).unwrap();
        h.market.carts.add_item(&user(name), &ProductId::new("p2"), 1).unwrap();
        h.market.carts.apply_voucher(&user(name), "TEN").unwrap();
    }

    let market = Arc::new(h.market);
    let mut handles = Vec::new();
    for name in ["u1", "u2"] {
        let market = Arc::clone(&market);
        handles.push(std::thread::spawn(move || {
            market
                .checkout
                .checkout(
                    &UserId::new(name),
                    PaymentMethod::Cod,
                    ShippingMethod::Standard,
                    address(),
                    None,
                )
                .is_ok()
        }));
    }
    let wins = handles
        .into_iter()
        .map(|t| t.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(wins, 1);

    // The loser's p1 deduction was rolled back and its redemption
    // returned; only the winner's side effects remain.
    assert_eq!(
        market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(9)
    );
    assert_eq!(
        market.ledger.available(&ProductId::new("p2")).unwrap(),
        Some(0)
    );
    assert_eq!(
        market.vouchers.find_by_code("TEN").unwrap().unwrap().used_count,
        1
    );
    assert_eq!(market.store.orders.all().unwrap().len(), 1);
}

#[test]
fn test_concurrent_checkout_for_last_unit() {
    let h = harness();
    seed_product(&h, "p1", 100_000, 1);

    h.market.carts.add_item(&user("u1"), &ProductId::new("p1"), 1).unwrap();
    h.market.carts.add_item(&user("u2"), &ProductId::new("p1"), 1).unwrap();

    let market = Arc::new(h.market);
    let mut handles = Vec::new();
    for name in ["u1", "u2"] {
        let market = Arc::clone(&market);
        handles.push(std::thread::spawn(move || {
            market
                .checkout
                .checkout(
                    &UserId::new(name),
                    PaymentMethod::Cod,
                    ShippingMethod::Standard,
                    address(),
                    None,
                )
                .is_ok()
        }));
    }
    let wins = handles
        .into_iter()
        .map(|t| t.join().unwrap())
        .filter(|ok| *ok)
        .count();

    // Exactly one buyer got the unit.
    assert_eq!(wins, 1);
    assert_eq!(
        market.ledger.available(&ProductId::new("p1")).unwrap(),
        Some(0)
    );
    let orders = market.store.orders.all().unwrap();
    assert_eq!(orders.len(), 1);
}
