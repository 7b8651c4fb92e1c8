//! Voucher definitions, user wallets and usage records.
//!
//! A voucher's `used_count` is the global redemption counter; it is
//! only ever advanced through a conditional update against `usage_limit`
//! so the limit cannot be overshot under concurrency. Usage records make
//! refunds idempotent: a record flips from Used to Refunded exactly once.

use crate::catalog::MembershipTier;
use crate::clock::current_timestamp;
use crate::ids::{
    CategoryId, OrderId, ProductId, ShopId, UserId, UserVoucherId, VoucherId, VoucherUsageId,
};
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a voucher definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VoucherStatus {
    #[default]
    Active,
    Inactive,
    Expired,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherStatus::Active => "active",
            VoucherStatus::Inactive => "inactive",
            VoucherStatus::Expired => "expired",
        }
    }
}

/// What the voucher is worth when applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VoucherValue {
    /// Percent off the order amount, optionally capped.
    Percentage {
        percent: f64,
        max_discount: Option<Money>,
    },
    /// Flat amount off the order.
    FixedAmount(Money),
    /// Waives the shipping fee.
    FreeShipping,
}

/// Why a voucher was rejected for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoucherRejection {
    NotFound,
    Inactive,
    OutsideWindow,
    Exhausted,
    MinOrderNotMet,
    ShopMismatch,
    UserNotEligible,
    TierTooLow,
    ProductNotCovered,
    ProductExcluded,
    CategoryNotCovered,
    CategoryExcluded,
    PerUserLimitReached,
}

impl VoucherRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherRejection::NotFound => "voucher does not exist",
            VoucherRejection::Inactive => "voucher is not active",
            VoucherRejection::OutsideWindow => "voucher is outside its validity window",
            VoucherRejection::Exhausted => "voucher usage limit reached",
            VoucherRejection::MinOrderNotMet => "order amount below voucher minimum",
            VoucherRejection::ShopMismatch => "voucher does not apply to this shop",
            VoucherRejection::UserNotEligible => "voucher not granted to this user",
            VoucherRejection::TierTooLow => "membership tier too low for this voucher",
            VoucherRejection::ProductNotCovered => "no order item is covered by this voucher",
            VoucherRejection::ProductExcluded => "order contains a product excluded by this voucher",
            VoucherRejection::CategoryNotCovered => "no order item is in a covered category",
            VoucherRejection::CategoryExcluded => "order contains an excluded category",
            VoucherRejection::PerUserLimitReached => "per-user usage limit reached",
        }
    }
}

impl fmt::Display for VoucherRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A voucher definition.
///
/// The scoping vectors follow an empty-means-unrestricted convention:
/// an empty `applicable_product_ids` covers every product, a non-empty
/// one covers only those listed. Exclusion lists always win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    /// Voucher identifier.
    pub id: VoucherId,
    /// Human-entered redemption code, unique.
    pub code: String,
    /// Display name.
    pub name: String,
    /// What the voucher grants.
    pub value: VoucherValue,
    /// Minimum order amount to qualify.
    pub min_order_amount: Money,
    /// Global redemption cap. None means unlimited.
    pub usage_limit: Option<i64>,
    /// Global redemptions so far.
    pub used_count: i64,
    /// Per-user redemption cap. None means unlimited.
    pub max_usage_per_user: Option<i64>,
    /// Unix timestamp the voucher becomes valid.
    pub starts_at: i64,
    /// Unix timestamp the voucher stops being valid.
    pub ends_at: i64,
    /// Lifecycle status.
    pub status: VoucherStatus,
    /// Shop the voucher is restricted to. None means platform-wide.
    pub shop_id: Option<ShopId>,
    /// Products the voucher covers. Empty means all.
    pub applicable_product_ids: Vec<ProductId>,
    /// Products the voucher never covers.
    pub excluded_product_ids: Vec<ProductId>,
    /// Categories the voucher covers. Empty means all.
    pub applicable_category_ids: Vec<CategoryId>,
    /// Categories the voucher never covers.
    pub excluded_category_ids: Vec<CategoryId>,
    /// Users the voucher is restricted to. Empty means everyone.
    pub eligible_user_ids: Vec<UserId>,
    /// Minimum membership tier, if any.
    pub required_tier: Option<MembershipTier>,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

impl Voucher {
    /// Create a voucher valid over `[starts_at, ends_at]`.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        value: VoucherValue,
        starts_at: i64,
        ends_at: i64,
    ) -> Self {
        Self {
            id: VoucherId::generate(),
            code: code.into(),
            name: name.into(),
            value,
            min_order_amount: Money::vnd(0),
            usage_limit: None,
            used_count: 0,
            max_usage_per_user: None,
            starts_at,
            ends_at,
            status: VoucherStatus::Active,
            shop_id: None,
            applicable_product_ids: Vec::new(),
            excluded_product_ids: Vec::new(),
            applicable_category_ids: Vec::new(),
            excluded_category_ids: Vec::new(),
            eligible_user_ids: Vec::new(),
            required_tier: None,
            created_at: current_timestamp(),
        }
    }

    /// Active and inside the validity window at `now`.
    pub fn is_valid(&self, now: i64) -> bool {
        self.status == VoucherStatus::Active && now >= self.starts_at && now <= self.ends_at
    }

    /// Whether the global redemption cap still has headroom.
    pub fn has_remaining_uses(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.used_count < limit,
            None => true,
        }
    }

    /// Discount this voucher yields on an order, before redemption.
    /// Free-shipping vouchers discount exactly the shipping fee. The
    /// result never exceeds the order amount for value vouchers.
    pub fn calculate_discount(&self, order_amount: Money, shipping_fee: Money) -> Money {
        match &self.value {
            VoucherValue::Percentage {
                percent,
                max_discount,
            } => {
                let raw = order_amount.percentage(*percent);
                let capped = match max_discount {
                    Some(cap) => raw.min(*cap),
                    None => raw,
                };
                capped.min(order_amount)
            }
            VoucherValue::FixedAmount(amount) => (*amount).min(order_amount),
            VoucherValue::FreeShipping => shipping_fee,
        }
    }
}

impl agora_store::Document for Voucher {
    fn id(&self) -> String {
        self.id.to_string()
    }
}

/// A voucher sitting in a user's wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserVoucher {
    /// Wallet entry identifier.
    pub id: UserVoucherId,
    /// Owning user.
    pub user_id: UserId,
    /// The granted voucher.
    pub voucher_id: VoucherId,
    /// Code snapshot for display.
    pub voucher_code: String,
    /// Unix timestamp the grant was made.
    pub received_at: i64,
    /// Unix timestamp the grant expires (mirrors the voucher's window).
    pub expires_at: i64,
    /// Whether this wallet entry has been spent.
    pub is_used: bool,
    /// Unix timestamp the entry was spent.
    pub used_at: Option<i64>,
    /// Order the entry was spent on.
    pub order_id: Option<OrderId>,
    /// Delivered order that earned this grant, for reward vouchers.
    /// Reward grants are idempotent per earning order.
    pub granted_for_order: Option<OrderId>,
}

impl UserVoucher {
    pub fn grant(user_id: UserId, voucher: &Voucher) -> Self {
        Self {
            id: UserVoucherId::generate(),
            user_id,
            voucher_id: voucher.id.clone(),
            voucher_code: voucher.code.clone(),
            received_at: current_timestamp(),
            expires_at: voucher.ends_at,
            is_used: false,
            used_at: None,
            order_id: None,
            granted_for_order: None,
        }
    }

    /// Grant earned by delivering `order_id`.
    pub fn grant_for_order(user_id: UserId, voucher: &Voucher, order_id: OrderId) -> Self {
        let mut uv = Self::grant(user_id, voucher);
        uv.granted_for_order = Some(order_id);
        uv
    }
}

impl agora_store::Document for UserVoucher {
    fn id(&self) -> String {
        self.id.to_string()
    }
}

/// Whether a redemption still counts or has been returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageStatus {
    Used,
    Refunded,
}

/// One redemption of a voucher against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherUsage {
    /// Usage record identifier.
    pub id: VoucherUsageId,
    /// Redeemed voucher.
    pub voucher_id: VoucherId,
    /// Code snapshot.
    pub voucher_code: String,
    /// Redeeming user.
    pub user_id: UserId,
    /// Order the voucher was redeemed on.
    pub order_id: OrderId,
    /// Discount that was actually applied.
    pub discount_amount: Money,
    /// Order amount the discount was computed against.
    pub order_amount: Money,
    /// Used or Refunded.
    pub status: UsageStatus,
    /// Unix timestamp of redemption.
    pub used_at: i64,
    /// Unix timestamp of refund, if any.
    pub refunded_at: Option<i64>,
}

impl VoucherUsage {
    pub fn record(
        voucher: &Voucher,
        user_id: UserId,
        order_id: OrderId,
        discount_amount: Money,
        order_amount: Money,
    ) -> Self {
        Self {
            id: VoucherUsageId::generate(),
            voucher_id: voucher.id.clone(),
            voucher_code: voucher.code.clone(),
            user_id,
            order_id,
            discount_amount,
            order_amount,
            status: UsageStatus::Used,
            used_at: current_timestamp(),
            refunded_at: None,
        }
    }
}

impl agora_store::Document for VoucherUsage {
    fn id(&self) -> String {
        self.id.to_string()
    }
}
