//! Engine configuration.

/// Tunables for the marketplace services.
///
/// Constructed by the caller and handed to [`crate::Marketplace::new`];
/// the defaults match production behavior.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Retry budget for compare-and-swap update cycles.
    pub max_cas_attempts: u32,
    /// Code of the voucher template granted after a delivered order.
    pub reward_voucher_code: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            max_cas_attempts: 16,
            reward_voucher_code: "PURCHASE_REWARD".to_string(),
        }
    }
}
