//! Cart management.
//!
//! One cart per user. Every read and mutation re-resolves line prices
//! (flash price first, catalog price as fallback), re-validates any
//! attached voucher and recomputes totals. A voucher that stopped
//! validating is dropped silently; the cart never errors because of a
//! stale discount.

use crate::collaborators::Catalog;
use crate::config::MarketConfig;
use crate::data::Datastore;
use crate::flash::FlashSaleTracker;
use crate::ledger::InventoryLedger;
use crate::vouchers::VoucherEngine;
use agora_commerce::prelude::*;
use agora_store::StoreError;
use std::sync::Arc;
use tracing::debug;

pub struct CartManager {
    store: Arc<Datastore>,
    catalog: Arc<dyn Catalog>,
    flash: Arc<FlashSaleTracker>,
    vouchers: Arc<VoucherEngine>,
    ledger: Arc<InventoryLedger>,
    config: MarketConfig,
}

impl CartManager {
    pub fn new(
        store: Arc<Datastore>,
        catalog: Arc<dyn Catalog>,
        flash: Arc<FlashSaleTracker>,
        vouchers: Arc<VoucherEngine>,
        ledger: Arc<InventoryLedger>,
        config: MarketConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            flash,
            vouchers,
            ledger,
            config,
        }
    }

    /// The user's cart, created on first touch and refreshed on read.
    ///
    /// The cart id is derived from the user, so two racing first touches
    /// collide on insert and both end up on the same document.
    pub fn get_or_create(&self, user_id: &UserId) -> Result<Cart, CommerceError> {
        let cart = Cart::new(user_id.clone());
        match self.store.carts.insert(&cart) {
            Ok(()) => Ok(cart),
            Err(StoreError::AlreadyExists { .. }) => self.mutate(&cart.id, |_| Ok(())),
            Err(e) => Err(e.into()),
        }
    }

    /// Add units of a product, quoting the current flash or catalog
    /// price. Availability is checked against the ledger, falling back
    /// to the catalog's cached figure when no ledger row exists.
    pub fn add_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }
        let product = self.catalog.product(product_id)?;
        if product.status == ProductStatus::Inactive {
            return Err(CommerceError::Validation(format!(
                "product is not for sale: {product_id}"
            )));
        }

        let cart = self.get_or_create(user_id)?;
        self.mutate(&cart.id, |cart| {
            let already = cart
                .find_item(product_id)
                .map(|i| i.quantity)
                .unwrap_or(0);
            self.check_stock(&product, already + quantity)?;

            let (unit_price, flash_sale_id) = self.quote(&product)?;
            cart.add_item(CartItem {
                product_id: product_id.clone(),
                name: product.name.clone(),
                image: product.image.clone(),
                quantity,
                unit_price,
                flash_sale_id,
            })
        })
    }

    /// Set a line's quantity. Zero or less removes the line.
    pub fn update_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        let cart = self.require(user_id)?;
        self.mutate(&cart.id, |cart| {
            if quantity <= 0 {
                cart.remove_item(product_id);
                return Ok(());
            }
            let product = self.catalog.product(product_id)?;
            self.check_stock(&product, quantity)?;
            cart.update_quantity(product_id, quantity)
        })
    }

    /// Drop a line.
    pub fn remove_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<Cart, CommerceError> {
        let cart = self.require(user_id)?;
        self.mutate(&cart.id, |cart| {
            cart.remove_item(product_id);
            Ok(())
        })
    }

    /// Attach a voucher after validating it against the cart contents.
    /// A voucher that yields no discount on this cart is rejected.
    pub fn apply_voucher(&self, user_id: &UserId, code: &str) -> Result<Cart, CommerceError> {
        let cart = self.require(user_id)?;
        if cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        let (product_ids, category_ids, shop_id) = self.context(&cart)?;
        let voucher = self.vouchers.validate_for_order(
            code,
            user_id,
            cart.subtotal,
            shop_id.as_ref(),
            &product_ids,
            &category_ids,
        )?;
        let preview =
            voucher.calculate_discount(cart.subtotal, ShippingMethod::default().fee());
        if preview.is_zero() {
            return Err(CommerceError::Validation(format!(
                "voucher {code} yields no discount on this cart"
            )));
        }

        self.mutate(&cart.id, |cart| {
            cart.voucher_code = Some(code.to_string());
            Ok(())
        })
    }

    /// Detach the voucher.
    pub fn remove_voucher(&self, user_id: &UserId) -> Result<Cart, CommerceError> {
        let cart = self.require(user_id)?;
        self.mutate(&cart.id, |cart| {
            cart.voucher_code = None;
            Ok(())
        })
    }

    /// Empty the cart.
    pub fn clear(&self, user_id: &UserId) -> Result<Cart, CommerceError> {
        let cart = self.require(user_id)?;
        self.mutate(&cart.id, |cart| {
            cart.clear();
            Ok(())
        })
    }

    /// The cart as stored, without a refresh pass. Checkout uses this to
    /// snapshot exactly what the user saw.
    pub fn find(&self, user_id: &UserId) -> Result<Option<Cart>, CommerceError> {
        Ok(self.store.carts.get(Cart::id_for(user_id).as_str())?)
    }

    fn require(&self, user_id: &UserId) -> Result<Cart, CommerceError> {
        self.find(user_id)?.ok_or(CommerceError::EmptyCart)
    }

    /// Apply a mutation, then refresh prices, voucher and totals, all
    /// inside one CAS update cycle.
    fn mutate(
        &self,
        cart_id: &CartId,
        f: impl Fn(&mut Cart) -> Result<(), CommerceError>,
    ) -> Result<Cart, CommerceError> {
        let (cart, _) = self.store.carts.update(
            cart_id.as_str(),
            self.config.max_cas_attempts,
            |cart: &mut Cart| -> Result<(), CommerceError> {
                f(cart)?;
                self.refresh(cart)
            },
        )?;
        Ok(cart)
    }

    /// Re-resolve every line price and the voucher, then recompute
    /// totals.
    fn refresh(&self, cart: &mut Cart) -> Result<(), CommerceError> {
        let now = current_timestamp();
        for item in &mut cart.items {
            match self.flash.resolve_price(&item.product_id, now)? {
                Some((sale_id, price)) => {
                    item.unit_price = price;
                    item.flash_sale_id = Some(sale_id);
                }
                None => {
                    item.flash_sale_id = None;
                    if let Ok(product) = self.catalog.product(&item.product_id) {
                        item.unit_price = product.price;
                    }
                }
            }
        }

        // Totals need the fresh subtotal before the voucher is checked.
        cart.recompute_totals(Money::zero(cart.subtotal.currency));

        let voucher_code = cart.voucher_code.clone();
        let discount = match voucher_code {
            Some(code) => {
                let (product_ids, category_ids, shop_id) = self.context(cart)?;
                match self.vouchers.validate_for_order(
                    &code,
                    &cart.user_id,
                    cart.subtotal,
                    shop_id.as_ref(),
                    &product_ids,
                    &category_ids,
                ) {
                    Ok(voucher) => voucher
                        .calculate_discount(cart.subtotal, ShippingMethod::default().fee()),
                    Err(CommerceError::VoucherRejected { code, reason }) => {
                        debug!(voucher = %code, %reason, "dropping voucher from cart");
                        cart.voucher_code = None;
                        Money::zero(cart.subtotal.currency)
                    }
                    Err(e) => return Err(e),
                }
            }
            None => Money::zero(cart.subtotal.currency),
        };
        cart.recompute_totals(discount);
        Ok(())
    }

    /// Product, category and shop context for voucher validation. The
    /// shop is only set when every line belongs to the same shop.
    pub(crate) fn context(
        &self,
        cart: &Cart,
    ) -> Result<(Vec<ProductId>, Vec<CategoryId>, Option<ShopId>), CommerceError> {
        let mut product_ids = Vec::new();
        let mut category_ids: Vec<CategoryId> = Vec::new();
        let mut shops = Vec::new();
        for item in &cart.items {
            product_ids.push(item.product_id.clone());
            if let Ok(product) = self.catalog.product(&item.product_id) {
                for c in product.category_ids {
                    if !category_ids.contains(&c) {
                        category_ids.push(c);
                    }
                }
                shops.push(product.shop_id);
            }
        }
        let shop_id = match shops.split_first() {
            Some((first, rest)) if rest.iter().all(|s| s == first) => first.clone(),
            _ => None,
        };
        Ok((product_ids, category_ids, shop_id))
    }

    fn quote(&self, product: &ProductSummary) -> Result<(Money, Option<FlashSaleId>), CommerceError> {
        match self.flash.resolve_price(&product.id, current_timestamp())? {
            Some((sale_id, price)) => Ok((price, Some(sale_id))),
            None => Ok((product.price, None)),
        }
    }

    fn check_stock(&self, product: &ProductSummary, wanted: i64) -> Result<(), CommerceError> {
        let available = self
            .ledger
            .available(&product.id)?
            .unwrap_or(product.cached_stock);
        if available < wanted {
            return Err(CommerceError::InsufficientStock {
                product_id: product.id.to_string(),
                requested: wanted,
                available,
            });
        }
        Ok(())
    }
}
