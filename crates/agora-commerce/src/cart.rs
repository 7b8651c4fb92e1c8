//! Shopping cart document.
//!
//! One cart per user. Lines carry the unit price that was quoted when
//! the line was added; when that price came from a flash sale the line
//! records which sale, so settlement never has to guess from the price.

use crate::clock::current_timestamp;
use crate::error::CommerceError;
use crate::ids::{CartId, FlashSaleId, ProductId, UserId};
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// One line in a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    /// Product on the line.
    pub product_id: ProductId,
    /// Display name snapshot.
    pub name: String,
    /// Image snapshot.
    pub image: Option<String>,
    /// Units requested.
    pub quantity: i64,
    /// Quoted unit price (flash price when `flash_sale_id` is set).
    pub unit_price: Money,
    /// Flash sale the quoted price came from, if any.
    pub flash_sale_id: Option<FlashSaleId>,
}

impl CartItem {
    /// Line total (`unit_price * quantity`).
    pub fn line_total(&self) -> Result<Money, CommerceError> {
        self.unit_price
            .try_multiply(self.quantity)
            .ok_or(CommerceError::Overflow)
    }
}

/// A user's cart with derived totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    /// Cart identifier.
    pub id: CartId,
    /// Owning user.
    pub user_id: UserId,
    /// Lines, one per product.
    pub items: Vec<CartItem>,
    /// Voucher code the user has attached, not yet redeemed.
    pub voucher_code: Option<String>,
    /// Sum of line totals.
    pub subtotal: Money,
    /// Voucher discount previewed against the current contents.
    pub discount_amount: Money,
    /// `subtotal - discount`, clamped at zero.
    pub total_price: Money,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of last mutation.
    pub updated_at: i64,
}

impl Cart {
    /// The cart id a user owns. Deriving the id from the user makes the
    /// one-cart-per-user rule structural: a second create for the same
    /// user collides on insert instead of producing a sibling cart.
    pub fn id_for(user_id: &UserId) -> CartId {
        CartId::new(format!("cart:{user_id}"))
    }

    /// Create an empty cart for a user.
    pub fn new(user_id: UserId) -> Self {
        let now = current_timestamp();
        Self {
            id: Cart::id_for(&user_id),
            user_id,
            items: Vec::new(),
            voucher_code: None,
            subtotal: Money::zero(Currency::VND),
            discount_amount: Money::zero(Currency::VND),
            total_price: Money::zero(Currency::VND),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn find_item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.product_id == product_id)
    }

    /// Add units of a product. An existing line for the product is
    /// merged (quantity added, price and flash reference refreshed to
    /// the newly quoted values).
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CommerceError> {
        if item.quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(item.quantity));
        }
        match self
            .items
            .iter_mut()
            .find(|i| i.product_id == item.product_id)
        {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or(CommerceError::Overflow)?;
                existing.unit_price = item.unit_price;
                existing.flash_sale_id = item.flash_sale_id;
            }
            None => self.items.push(item),
        }
        Ok(())
    }

    /// Set the quantity of an existing line. Zero removes the line.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), CommerceError> {
        if quantity < 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }
        let pos = self
            .items
            .iter()
            .position(|i| &i.product_id == product_id)
            .ok_or_else(|| CommerceError::ProductNotFound(product_id.to_string()))?;
        if quantity == 0 {
            self.items.remove(pos);
        } else {
            self.items[pos].quantity = quantity;
        }
        Ok(())
    }

    /// Remove a line. Returns whether a line was present.
    pub fn remove_item(&mut self, product_id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| &i.product_id != product_id);
        self.items.len() != before
    }

    /// Empty the cart and drop any attached voucher.
    pub fn clear(&mut self) {
        self.items.clear();
        self.voucher_code = None;
        self.recompute_totals(Money::zero(self.subtotal.currency));
    }

    /// Recompute `subtotal` and `total_price` from the lines and a
    /// previewed discount. The discount is clamped to the subtotal so
    /// the total never goes negative.
    pub fn recompute_totals(&mut self, discount: Money) -> &mut Self {
        let currency = self
            .items
            .first()
            .map(|i| i.unit_price.currency)
            .unwrap_or_default();
        let mut subtotal = Money::zero(currency);
        for item in &self.items {
            if let Ok(line) = item.line_total() {
                subtotal = subtotal.try_add(&line).unwrap_or(subtotal);
            }
        }
        self.subtotal = subtotal;
        self.discount_amount = discount.min(subtotal);
        self.total_price = self
            .subtotal
            .try_subtract(&self.discount_amount)
            .unwrap_or(Money::zero(currency));
        self.updated_at = current_timestamp();
        self
    }
}

impl agora_store::Document for Cart {
    fn id(&self) -> String {
        self.id.to_string()
    }
}
