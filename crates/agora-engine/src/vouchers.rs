//! Voucher redemption engine.
//!
//! Eligibility runs as an ordered chain of checks that short-circuits on
//! the first failure. Redemption advances the voucher's global counter
//! through the CAS cycle with the cap re-checked inside, so the limit
//! holds under concurrent checkouts. Refunds are keyed by order and
//! idempotent: the usage record flips to refunded exactly once.

use crate::collaborators::{Identity, NotificationCategory, NotificationSink};
use crate::config::MarketConfig;
use crate::data::Datastore;
use agora_commerce::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

pub struct VoucherEngine {
    store: Arc<Datastore>,
    identity: Arc<dyn Identity>,
    sink: Arc<dyn NotificationSink>,
    config: MarketConfig,
}

impl VoucherEngine {
    pub fn new(
        store: Arc<Datastore>,
        identity: Arc<dyn Identity>,
        sink: Arc<dyn NotificationSink>,
        config: MarketConfig,
    ) -> Self {
        Self {
            store,
            identity,
            sink,
            config,
        }
    }

    /// Register a voucher definition. Codes are unique.
    pub fn create(&self, voucher: &Voucher) -> Result<(), CommerceError> {
        if self.find_by_code(&voucher.code)?.is_some() {
            return Err(CommerceError::Validation(format!(
                "voucher code already exists: {}",
                voucher.code
            )));
        }
        self.store.vouchers.insert(voucher)?;
        Ok(())
    }

    pub fn find_by_code(&self, code: &str) -> Result<Option<Voucher>, CommerceError> {
        Ok(self.store.vouchers.find_one(|v| v.code == code)?)
    }

    /// Run the full eligibility chain for a prospective order. Returns
    /// the voucher on success; a failed check surfaces as
    /// [`CommerceError::VoucherRejected`] with the first reason hit.
    #[allow(clippy::too_many_arguments)]
    pub fn validate_for_order(
        &self,
        code: &str,
        user_id: &UserId,
        order_amount: Money,
        shop_id: Option<&ShopId>,
        product_ids: &[ProductId],
        category_ids: &[CategoryId],
    ) -> Result<Voucher, CommerceError> {
        let reject = |reason: VoucherRejection| CommerceError::VoucherRejected {
            code: code.to_string(),
            reason,
        };

        let voucher = self
            .find_by_code(code)?
            .ok_or_else(|| reject(VoucherRejection::NotFound))?;

        if voucher.status != VoucherStatus::Active {
            return Err(reject(VoucherRejection::Inactive));
        }
        let now = current_timestamp();
        if now < voucher.starts_at || now > voucher.ends_at {
            return Err(reject(VoucherRejection::OutsideWindow));
        }
        if !voucher.has_remaining_uses() {
            return Err(reject(VoucherRejection::Exhausted));
        }
        if order_amount.amount < voucher.min_order_amount.amount {
            return Err(reject(VoucherRejection::MinOrderNotMet));
        }
        if let Some(required_shop) = &voucher.shop_id {
            if shop_id != Some(required_shop) {
                return Err(reject(VoucherRejection::ShopMismatch));
            }
        }
        if !voucher.eligible_user_ids.is_empty() && !voucher.eligible_user_ids.contains(user_id) {
            return Err(reject(VoucherRejection::UserNotEligible));
        }
        if let Some(required_tier) = voucher.required_tier {
            let tier = self.identity.membership(user_id)?;
            if !tier.satisfies(required_tier) {
                return Err(reject(VoucherRejection::TierTooLow));
            }
        }
        if !voucher.applicable_product_ids.is_empty()
            && !product_ids
                .iter()
                .any(|p| voucher.applicable_product_ids.contains(p))
        {
            return Err(reject(VoucherRejection::ProductNotCovered));
        }
        if product_ids
            .iter()
            .any(|p| voucher.excluded_product_ids.contains(p))
        {
            return Err(reject(VoucherRejection::ProductExcluded));
        }
        if !voucher.applicable_category_ids.is_empty()
            && !category_ids
                .iter()
                .any(|c| voucher.applicable_category_ids.contains(c))
        {
            return Err(reject(VoucherRejection::CategoryNotCovered));
        }
        if category_ids
            .iter()
            .any(|c| voucher.excluded_category_ids.contains(c))
        {
            return Err(reject(VoucherRejection::CategoryExcluded));
        }
        if let Some(per_user) = voucher.max_usage_per_user {
            let used = self.store.voucher_usages.find(|u| {
                u.voucher_id == voucher.id && &u.user_id == user_id && u.status == UsageStatus::Used
            })?;
            if used.len() as i64 >= per_user {
                return Err(reject(VoucherRejection::PerUserLimitReached));
            }
        }

        Ok(voucher)
    }

    /// Discount the voucher would yield, without redeeming it.
    pub fn calculate_discount(
        &self,
        code: &str,
        order_amount: Money,
        shipping_fee: Money,
    ) -> Result<Money, CommerceError> {
        let voucher = self
            .find_by_code(code)?
            .ok_or_else(|| CommerceError::VoucherNotFound(code.to_string()))?;
        Ok(voucher.calculate_discount(order_amount, shipping_fee))
    }

    /// Redeem a voucher against an order.
    ///
    /// The usage cap is re-checked inside the update cycle; two orders
    /// racing on the last use cannot both win. Writes one usage record
    /// and spends the user's wallet entry if one exists.
    pub fn redeem(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
        code: &str,
        order_amount: Money,
        discount_amount: Money,
    ) -> Result<VoucherUsage, CommerceError> {
        let voucher = self
            .find_by_code(code)?
            .ok_or_else(|| CommerceError::VoucherNotFound(code.to_string()))?;

        let code_owned = code.to_string();
        let (voucher, _) = self.store.vouchers.update(
            voucher.id.as_str(),
            self.config.max_cas_attempts,
            move |v: &mut Voucher| -> Result<(), CommerceError> {
                if !v.has_remaining_uses() {
                    return Err(CommerceError::VoucherRejected {
                        code: code_owned.clone(),
                        reason: VoucherRejection::Exhausted,
                    });
                }
                v.used_count += 1;
                Ok(())
            },
        )?;

        let usage = VoucherUsage::record(
            &voucher,
            user_id.clone(),
            order_id.clone(),
            discount_amount,
            order_amount,
        );
        self.store.voucher_usages.insert(&usage)?;
        self.spend_wallet_entry(user_id, &voucher.id, order_id)?;
        info!(voucher = %voucher.code, user = %user_id, order = %order_id,
            discount = %discount_amount, "voucher redeemed");
        Ok(usage)
    }

    /// Return an order's redemption. Safe to call any number of times;
    /// only the first call moves counters.
    pub fn refund(&self, order_id: &OrderId) -> Result<(), CommerceError> {
        let Some(usage) = self
            .store
            .voucher_usages
            .find_one(|u| &u.order_id == order_id)?
        else {
            return Ok(());
        };

        let now = current_timestamp();
        let (usage, flipped) = self.store.voucher_usages.update(
            usage.id.as_str(),
            self.config.max_cas_attempts,
            |u: &mut VoucherUsage| -> Result<bool, CommerceError> {
                if u.status == UsageStatus::Refunded {
                    return Ok(false);
                }
                u.status = UsageStatus::Refunded;
                u.refunded_at = Some(now);
                Ok(true)
            },
        )?;
        if !flipped {
            debug!(order = %order_id, "voucher refund already applied");
            return Ok(());
        }

        self.store.vouchers.update(
            usage.voucher_id.as_str(),
            self.config.max_cas_attempts,
            |v: &mut Voucher| -> Result<(), CommerceError> {
                v.used_count = (v.used_count - 1).max(0);
                Ok(())
            },
        )?;
        self.restore_wallet_entry(order_id)?;
        info!(voucher = %usage.voucher_code, order = %order_id, "voucher refunded");
        Ok(())
    }

    /// Put a voucher in a user's wallet. Granting twice hands back the
    /// existing entry.
    pub fn grant_to_user(
        &self,
        user_id: &UserId,
        voucher_id: &VoucherId,
    ) -> Result<UserVoucher, CommerceError> {
        let voucher = self
            .store
            .vouchers
            .get(voucher_id.as_str())?
            .ok_or_else(|| CommerceError::VoucherNotFound(voucher_id.to_string()))?;

        if let Some(existing) = self.store.user_vouchers.find_one(|uv| {
            &uv.user_id == user_id
                && uv.voucher_id == voucher.id
                && uv.granted_for_order.is_none()
        })? {
            return Ok(existing);
        }

        let grant = UserVoucher::grant(user_id.clone(), &voucher);
        self.store.user_vouchers.insert(&grant)?;
        self.sink.notify(
            user_id,
            "Voucher received",
            &format!("Voucher {} has been added to your wallet", voucher.code),
            NotificationCategory::Voucher,
        );
        Ok(grant)
    }

    /// Grant the purchase-reward voucher for a delivered order. One
    /// grant per order; returns `None` when no reward template is
    /// configured.
    pub fn grant_purchase_reward(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<Option<UserVoucher>, CommerceError> {
        let Some(template) = self.find_by_code(&self.config.reward_voucher_code)? else {
            debug!(code = %self.config.reward_voucher_code, "no reward voucher template configured");
            return Ok(None);
        };

        if let Some(existing) = self
            .store
            .user_vouchers
            .find_one(|uv| uv.granted_for_order.as_ref() == Some(order_id))?
        {
            return Ok(Some(existing));
        }

        let grant = UserVoucher::grant_for_order(user_id.clone(), &template, order_id.clone());
        self.store.user_vouchers.insert(&grant)?;
        self.sink.notify(
            user_id,
            "Thank you for your purchase",
            &format!("Voucher {} has been added to your wallet", template.code),
            NotificationCategory::Voucher,
        );
        Ok(Some(grant))
    }

    /// A user's wallet.
    pub fn wallet(&self, user_id: &UserId) -> Result<Vec<UserVoucher>, CommerceError> {
        Ok(self
            .store
            .user_vouchers
            .find(|uv| &uv.user_id == user_id)?)
    }

    /// The usage record written for an order, if any.
    pub fn usage_for_order(&self, order_id: &OrderId) -> Result<Option<VoucherUsage>, CommerceError> {
        Ok(self
            .store
            .voucher_usages
            .find_one(|u| &u.order_id == order_id)?)
    }

    fn spend_wallet_entry(
        &self,
        user_id: &UserId,
        voucher_id: &VoucherId,
        order_id: &OrderId,
    ) -> Result<(), CommerceError> {
        let entry = self.store.user_vouchers.find_one(|uv| {
            &uv.user_id == user_id && &uv.voucher_id == voucher_id && !uv.is_used
        })?;
        if let Some(entry) = entry {
            let now = current_timestamp();
            let oid = order_id.clone();
            self.store.user_vouchers.update(
                entry.id.as_str(),
                self.config.max_cas_attempts,
                move |uv: &mut UserVoucher| -> Result<(), CommerceError> {
                    uv.is_used = true;
                    uv.used_at = Some(now);
                    uv.order_id = Some(oid.clone());
                    Ok(())
                },
            )?;
        }
        Ok(())
    }

    fn restore_wallet_entry(&self, order_id: &OrderId) -> Result<(), CommerceError> {
        let entry = self
            .store
            .user_vouchers
            .find_one(|uv| uv.order_id.as_ref() == Some(order_id))?;
        if let Some(entry) = entry {
            self.store.user_vouchers.update(
                entry.id.as_str(),
                self.config.max_cas_attempts,
                |uv: &mut UserVoucher| -> Result<(), CommerceError> {
                    uv.is_used = false;
                    uv.used_at = None;
                    uv.order_id = None;
                    Ok(())
                },
            )?;
        }
        Ok(())
    }
}
