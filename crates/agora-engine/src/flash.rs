//! Flash sale tracking.
//!
//! Price resolution picks the first running sale that lists the product
//! with unsold allotment, earliest start wins. Settlement advances the
//! per-product `sold_count` through the CAS cycle and is driven by the
//! explicit sale reference carried on order lines.

use crate::config::MarketConfig;
use crate::data::Datastore;
use agora_commerce::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct FlashSaleTracker {
    store: Arc<Datastore>,
    config: MarketConfig,
}

impl FlashSaleTracker {
    pub fn new(store: Arc<Datastore>, config: MarketConfig) -> Self {
        Self { store, config }
    }

    /// Register a new sale.
    pub fn create(&self, sale: &FlashSale) -> Result<(), CommerceError> {
        self.store.flash_sales.insert(sale)?;
        Ok(())
    }

    /// Flip a sale to a new lifecycle status.
    pub fn set_status(
        &self,
        sale_id: &FlashSaleId,
        status: FlashSaleStatus,
    ) -> Result<FlashSale, CommerceError> {
        let (sale, _) = self.store.flash_sales.update(
            sale_id.as_str(),
            self.config.max_cas_attempts,
            |sale: &mut FlashSale| -> Result<(), CommerceError> {
                sale.status = status;
                Ok(())
            },
        )?;
        Ok(sale)
    }

    /// The flash price for a product at `now`, if any sale covers it.
    ///
    /// The earliest-starting running sale with unsold allotment wins;
    /// the winning sale's id is returned so the buying line can carry
    /// the reference through to settlement.
    pub fn resolve_price(
        &self,
        product_id: &ProductId,
        now: i64,
    ) -> Result<Option<(FlashSaleId, Money)>, CommerceError> {
        let mut running = self.store.flash_sales.find(|s| s.is_running(now))?;
        running.sort_by(|a, b| {
            a.starts_at
                .cmp(&b.starts_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        for sale in running {
            if let Some(p) = sale.product(product_id) {
                if p.remaining() > 0 {
                    return Ok(Some((sale.id.clone(), p.flash_price)));
                }
            }
        }
        Ok(None)
    }

    /// Count `qty` units of a product as sold under a sale. The counter
    /// is clamped at the allotment, never beyond.
    pub fn record_sale(
        &self,
        sale_id: &FlashSaleId,
        product_id: &ProductId,
        qty: i64,
    ) -> Result<(), CommerceError> {
        if qty <= 0 {
            return Err(CommerceError::InvalidQuantity(qty));
        }
        let pid = product_id.clone();
        self.store.flash_sales.update(
            sale_id.as_str(),
            self.config.max_cas_attempts,
            move |sale: &mut FlashSale| -> Result<(), CommerceError> {
                let entry = sale
                    .product_mut(&pid)
                    .ok_or_else(|| CommerceError::FlashSaleNotFound(pid.to_string()))?;
                entry.sold_count = (entry.sold_count + qty).min(entry.flash_stock);
                Ok(())
            },
        )?;
        Ok(())
    }

    /// Settle a placed order against its referenced sales. Settlement
    /// is bookkeeping after the fact; failures are logged, the order
    /// stands.
    pub fn settle_order(&self, order: &Order) {
        for item in &order.items {
            let Some(sale_id) = &item.flash_sale_id else {
                continue;
            };
            match self.record_sale(sale_id, &item.product_id, item.quantity) {
                Ok(()) => {
                    debug!(order = %order.id, sale = %sale_id, product = %item.product_id,
                        qty = item.quantity, "flash sale settled");
                }
                Err(e) => {
                    warn!(order = %order.id, sale = %sale_id, product = %item.product_id,
                        error = %e, "flash sale settlement failed");
                }
            }
        }
    }

    pub fn get(&self, sale_id: &FlashSaleId) -> Result<FlashSale, CommerceError> {
        self.store
            .flash_sales
            .get(sale_id.as_str())?
            .ok_or_else(|| CommerceError::FlashSaleNotFound(sale_id.to_string()))
    }
}
