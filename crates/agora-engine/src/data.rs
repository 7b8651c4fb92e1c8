//! The collections every service shares.

use agora_commerce::prelude::*;
use agora_store::Collection;

/// All persisted marketplace collections, one instance per deployment.
pub struct Datastore {
    pub carts: Collection<Cart>,
    pub orders: Collection<Order>,
    pub inventories: Collection<Inventory>,
    pub inventory_txns: Collection<InventoryTransaction>,
    pub vouchers: Collection<Voucher>,
    pub user_vouchers: Collection<UserVoucher>,
    pub voucher_usages: Collection<VoucherUsage>,
    pub flash_sales: Collection<FlashSale>,
}

impl Datastore {
    pub fn new() -> Self {
        Self {
            carts: Collection::new("carts"),
            orders: Collection::new("orders"),
            inventories: Collection::new("inventories"),
            inventory_txns: Collection::new("inventory_transactions"),
            vouchers: Collection::new("vouchers"),
            user_vouchers: Collection::new("user_vouchers"),
            voucher_usages: Collection::new("voucher_usages"),
            flash_sales: Collection::new("flash_sales"),
        }
    }
}

impl Default for Datastore {
    fn default() -> Self {
        Self::new()
    }
}
