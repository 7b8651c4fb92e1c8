//! Inventory ledger.
//!
//! Every stock mutation goes through a compare-and-swap update cycle so
//! the availability check and the write commit together. The conditional
//! decrement in [`InventoryLedger::stock_out`] is what keeps two buyers
//! from both taking the last unit. Movements of `current_stock` append
//! an entry to the transaction log; the catalog's denormalized stock
//! figure is refreshed best-effort after every commit.

use crate::collaborators::Catalog;
use crate::config::MarketConfig;
use crate::data::Datastore;
use agora_commerce::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

pub struct InventoryLedger {
    store: Arc<Datastore>,
    catalog: Arc<dyn Catalog>,
    config: MarketConfig,
}

impl InventoryLedger {
    pub fn new(store: Arc<Datastore>, catalog: Arc<dyn Catalog>, config: MarketConfig) -> Self {
        Self {
            store,
            catalog,
            config,
        }
    }

    /// Create the inventory row for a product and seed its opening
    /// stock. One row per product.
    pub fn create(&self, product_id: &ProductId, qty: i64) -> Result<Inventory, CommerceError> {
        if qty < 0 {
            return Err(CommerceError::InvalidQuantity(qty));
        }
        if self.row(product_id)?.is_some() {
            return Err(CommerceError::InventoryExists(product_id.to_string()));
        }
        let row = Inventory::new(product_id.clone(), qty);
        self.store.inventories.insert(&row)?;
        self.append_txn(InventoryTransaction::record(
            &row,
            TransactionType::In,
            "initial_stock",
            qty,
            0,
            "system",
        ));
        self.push_cached_stock(product_id, row.current_stock);
        info!(product = %product_id, qty, "inventory row created");
        Ok(row)
    }

    /// Receive stock.
    pub fn stock_in(
        &self,
        product_id: &ProductId,
        qty: i64,
        reason: &str,
        actor: &str,
    ) -> Result<Inventory, CommerceError> {
        if qty <= 0 {
            return Err(CommerceError::InvalidQuantity(qty));
        }
        let now = current_timestamp();
        let (row, before) = self.mutate(product_id, |inv| {
            let before = inv.current_stock;
            inv.current_stock += qty;
            inv.total_in += qty;
            inv.last_restocked_at = Some(now);
            Ok(before)
        })?;
        self.append_txn(InventoryTransaction::record(
            &row,
            TransactionType::In,
            reason,
            qty,
            before,
            actor,
        ));
        self.push_cached_stock(product_id, row.current_stock);
        Ok(row)
    }

    /// Take stock out, failing when fewer than `qty` units are sellable.
    /// The availability check runs inside the update cycle, so a stale
    /// read can never oversell.
    pub fn stock_out(
        &self,
        product_id: &ProductId,
        qty: i64,
        order_id: Option<&OrderId>,
        reason: &str,
        actor: &str,
    ) -> Result<Inventory, CommerceError> {
        if qty <= 0 {
            return Err(CommerceError::InvalidQuantity(qty));
        }
        let now = current_timestamp();
        let pid = product_id.clone();
        let (row, before) = self.mutate(product_id, move |inv| {
            if inv.available_stock < qty {
                return Err(CommerceError::InsufficientStock {
                    product_id: pid.to_string(),
                    requested: qty,
                    available: inv.available_stock,
                });
            }
            let before = inv.current_stock;
            inv.current_stock -= qty;
            inv.total_out += qty;
            if order_id.is_some() {
                inv.total_sold += qty;
                inv.last_sold_at = Some(now);
            }
            Ok(before)
        })?;
        let mut txn =
            InventoryTransaction::record(&row, TransactionType::Out, reason, -qty, before, actor);
        if let Some(order_id) = order_id {
            txn = txn.with_order(order_id.clone());
        }
        self.append_txn(txn);
        self.push_cached_stock(product_id, row.current_stock);
        Ok(row)
    }

    /// Hold units against an open cart or pending order.
    pub fn reserve(&self, product_id: &ProductId, qty: i64) -> Result<Inventory, CommerceError> {
        if qty <= 0 {
            return Err(CommerceError::InvalidQuantity(qty));
        }
        let pid = product_id.clone();
        let (row, _) = self.mutate(product_id, move |inv| {
            if inv.available_stock < qty {
                return Err(CommerceError::InsufficientStock {
                    product_id: pid.to_string(),
                    requested: qty,
                    available: inv.available_stock,
                });
            }
            inv.reserved_stock += qty;
            Ok(())
        })?;
        Ok(row)
    }

    /// Release held units. Releasing more than is held clamps at zero.
    pub fn release(&self, product_id: &ProductId, qty: i64) -> Result<Inventory, CommerceError> {
        if qty <= 0 {
            return Err(CommerceError::InvalidQuantity(qty));
        }
        let (row, _) = self.mutate(product_id, |inv| {
            inv.reserved_stock = (inv.reserved_stock - qty).max(0);
            Ok(())
        })?;
        Ok(row)
    }

    /// Correct the on-hand count to an absolute figure after a
    /// stocktake. Records the signed delta.
    pub fn adjust(
        &self,
        product_id: &ProductId,
        new_qty: i64,
        reason: &str,
        actor: &str,
    ) -> Result<Inventory, CommerceError> {
        if new_qty < 0 {
            return Err(CommerceError::InvalidQuantity(new_qty));
        }
        let (row, (before, delta)) = self.mutate(product_id, |inv| {
            let before = inv.current_stock;
            let delta = new_qty - before;
            inv.current_stock = new_qty;
            if delta > 0 {
                inv.total_in += delta;
            } else {
                inv.total_out += -delta;
            }
            Ok((before, delta))
        })?;
        self.append_txn(InventoryTransaction::record(
            &row,
            TransactionType::Adjustment,
            reason,
            delta,
            before,
            actor,
        ));
        self.push_cached_stock(product_id, row.current_stock);
        Ok(row)
    }

    /// The inventory row for a product, if one exists.
    pub fn row(&self, product_id: &ProductId) -> Result<Option<Inventory>, CommerceError> {
        Ok(self
            .store
            .inventories
            .find_one(|inv| &inv.product_id == product_id)?)
    }

    /// Sellable quantity for a product, `None` when no row exists.
    pub fn available(&self, product_id: &ProductId) -> Result<Option<i64>, CommerceError> {
        Ok(self.row(product_id)?.map(|inv| inv.available_stock))
    }

    /// Movement history for a product, oldest first.
    pub fn transactions(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<InventoryTransaction>, CommerceError> {
        let mut txns = self
            .store
            .inventory_txns
            .find(|t| &t.product_id == product_id)?;
        txns.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(txns)
    }

    /// Run a mutation through the CAS update cycle. The closure must
    /// re-derive its decisions from the fresh row on every attempt;
    /// derived fields are recomputed after it runs.
    fn mutate<R>(
        &self,
        product_id: &ProductId,
        mut f: impl FnMut(&mut Inventory) -> Result<R, CommerceError>,
    ) -> Result<(Inventory, R), CommerceError> {
        let row = self
            .row(product_id)?
            .ok_or_else(|| CommerceError::InventoryNotFound(product_id.to_string()))?;
        self.store
            .inventories
            .update(&row.id.to_string(), self.config.max_cas_attempts, |inv| {
                let out = f(inv)?;
                inv.recalculate();
                Ok(out)
            })
    }

    /// The transaction log is append-only bookkeeping; a failed append
    /// is logged, never surfaced.
    fn append_txn(&self, txn: InventoryTransaction) {
        if let Err(e) = self.store.inventory_txns.insert(&txn) {
            warn!(product = %txn.product_id, error = %e, "failed to append inventory transaction");
        }
    }

    /// Best-effort refresh of the catalog's denormalized stock figure.
    fn push_cached_stock(&self, product_id: &ProductId, stock: i64) {
        if let Err(e) = self.catalog.update_cached_stock(product_id, stock) {
            warn!(product = %product_id, error = %e, "failed to refresh cached stock");
        }
    }
}
