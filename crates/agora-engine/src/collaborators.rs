//! External collaborators the engine depends on.
//!
//! The catalog, the identity provider and the notification channel are
//! owned by other systems; the engine talks to them through these traits.
//! In-memory implementations ship here for tests and demos.

use agora_commerce::prelude::*;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

/// Read access to the product catalog, plus the best-effort hook for
/// keeping its denormalized stock figure fresh.
pub trait Catalog: Send + Sync {
    fn product(&self, id: &ProductId) -> Result<ProductSummary, CommerceError>;
    /// Push a new stock figure into the catalog cache. Callers treat
    /// failures as non-fatal.
    fn update_cached_stock(&self, id: &ProductId, stock: i64) -> Result<(), CommerceError>;
}

/// Membership lookups and updates for the user service.
pub trait Identity: Send + Sync {
    fn membership(&self, user_id: &UserId) -> Result<MembershipTier, CommerceError>;
    fn set_membership(&self, user_id: &UserId, tier: MembershipTier) -> Result<(), CommerceError>;
}

/// Message categories a user notification can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Order,
    Voucher,
    Promotion,
}

/// Fire-and-forget user notifications. Implementations must not fail;
/// a lost notification never fails the operation that produced it.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, user_id: &UserId, title: &str, message: &str, category: NotificationCategory);
}

/// Catalog backed by a map, for tests and demos.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<String, ProductSummary>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, product: ProductSummary) {
        if let Ok(mut map) = self.products.write() {
            map.insert(product.id.to_string(), product);
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn product(&self, id: &ProductId) -> Result<ProductSummary, CommerceError> {
        self.products
            .read()
            .ok()
            .and_then(|map| map.get(id.as_str()).cloned())
            .ok_or_else(|| CommerceError::ProductNotFound(id.to_string()))
    }

    fn update_cached_stock(&self, id: &ProductId, stock: i64) -> Result<(), CommerceError> {
        let mut map = self
            .products
            .write()
            .map_err(|_| CommerceError::Validation("catalog lock poisoned".to_string()))?;
        match map.get_mut(id.as_str()) {
            Some(product) => {
                product.set_cached_stock(stock);
                Ok(())
            }
            None => Err(CommerceError::ProductNotFound(id.to_string())),
        }
    }
}

/// Identity provider backed by a map. Unknown users are Standard tier.
#[derive(Default)]
pub struct InMemoryIdentity {
    tiers: RwLock<HashMap<String, MembershipTier>>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Identity for InMemoryIdentity {
    fn membership(&self, user_id: &UserId) -> Result<MembershipTier, CommerceError> {
        Ok(self
            .tiers
            .read()
            .ok()
            .and_then(|map| map.get(user_id.as_str()).copied())
            .unwrap_or_default())
    }

    fn set_membership(&self, user_id: &UserId, tier: MembershipTier) -> Result<(), CommerceError> {
        let mut map = self
            .tiers
            .write()
            .map_err(|_| CommerceError::Validation("identity lock poisoned".to_string()))?;
        map.insert(user_id.to_string(), tier);
        Ok(())
    }
}

/// A notification captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
}

/// Sink that records every notification, for assertions in tests.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, user_id: &UserId, title: &str, message: &str, category: NotificationCategory) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Notification {
                user_id: user_id.clone(),
                title: title.to_string(),
                message: message.to_string(),
                category,
            });
        }
    }
}

/// Sink that drops everything.
#[derive(Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _: &UserId, _: &str, _: &str, _: NotificationCategory) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_commerce::Money;

    #[test]
    fn test_in_memory_catalog_roundtrip() {
        let catalog = InMemoryCatalog::new();
        catalog.put(ProductSummary::new(
            ProductId::new("p1"),
            "Rice",
            Money::vnd(20_000),
            5,
        ));

        let p = catalog.product(&ProductId::new("p1")).unwrap();
        assert_eq!(p.cached_stock, 5);

        catalog
            .update_cached_stock(&ProductId::new("p1"), 0)
            .unwrap();
        let p = catalog.product(&ProductId::new("p1")).unwrap();
        assert_eq!(p.status, ProductStatus::OutOfStock);
    }

    #[test]
    fn test_unknown_user_is_standard() {
        let identity = InMemoryIdentity::new();
        assert_eq!(
            identity.membership(&UserId::new("nobody")).unwrap(),
            MembershipTier::Standard
        );
    }

    #[test]
    fn test_recording_sink_captures() {
        let sink = RecordingSink::new();
        sink.notify(
            &UserId::new("u1"),
            "Order placed",
            "Your order is on its way",
            NotificationCategory::Order,
        );
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Order placed");
    }
}
