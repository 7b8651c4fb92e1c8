//! Wiring for the full service stack.

use crate::carts::CartManager;
use crate::checkout::CheckoutOrchestrator;
use crate::collaborators::{Catalog, Identity, NotificationSink};
use crate::config::MarketConfig;
use crate::data::Datastore;
use crate::flash::FlashSaleTracker;
use crate::ledger::InventoryLedger;
use crate::orders::OrderService;
use crate::vouchers::VoucherEngine;
use std::sync::Arc;

/// All marketplace services over one shared datastore.
pub struct Marketplace {
    pub store: Arc<Datastore>,
    pub ledger: Arc<InventoryLedger>,
    pub flash: Arc<FlashSaleTracker>,
    pub vouchers: Arc<VoucherEngine>,
    pub carts: Arc<CartManager>,
    pub checkout: Arc<CheckoutOrchestrator>,
    pub orders: Arc<OrderService>,
}

impl Marketplace {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        identity: Arc<dyn Identity>,
        sink: Arc<dyn NotificationSink>,
        config: MarketConfig,
    ) -> Self {
        let store = Arc::new(Datastore::new());
        let ledger = Arc::new(InventoryLedger::new(
            store.clone(),
            catalog.clone(),
            config.clone(),
        ));
        let flash = Arc::new(FlashSaleTracker::new(store.clone(), config.clone()));
        let vouchers = Arc::new(VoucherEngine::new(
            store.clone(),
            identity.clone(),
            sink.clone(),
            config.clone(),
        ));
        let carts = Arc::new(CartManager::new(
            store.clone(),
            catalog.clone(),
            flash.clone(),
            vouchers.clone(),
            ledger.clone(),
            config.clone(),
        ));
        let checkout = Arc::new(CheckoutOrchestrator::new(
            store.clone(),
            catalog.clone(),
            sink.clone(),
            carts.clone(),
            ledger.clone(),
            vouchers.clone(),
            flash.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            store.clone(),
            identity,
            sink,
            ledger.clone(),
            vouchers.clone(),
            config,
        ));
        Self {
            store,
            ledger,
            flash,
            vouchers,
            carts,
            checkout,
            orders,
        }
    }
}
