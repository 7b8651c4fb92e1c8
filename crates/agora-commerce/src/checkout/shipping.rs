//! Shipping methods and their flat fees.

use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Flat fee for standard delivery, in dong.
pub const STANDARD_SHIPPING_FEE: i64 = 30_000;
/// Flat fee for express delivery, in dong.
pub const EXPRESS_SHIPPING_FEE: i64 = 60_000;

/// How an order ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
}

impl ShippingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "standard",
            ShippingMethod::Express => "express",
        }
    }

    /// Flat shipping fee for this method.
    pub fn fee(&self) -> Money {
        match self {
            ShippingMethod::Standard => Money::vnd(STANDARD_SHIPPING_FEE),
            ShippingMethod::Express => Money::vnd(EXPRESS_SHIPPING_FEE),
        }
    }
}
