//! Promotional machinery: vouchers, per-user voucher wallets, usage
//! records and flash sales.

mod flash_sale;
mod voucher;

pub use flash_sale::{FlashSale, FlashSaleProduct, FlashSaleStatus};
pub use voucher::{
    UsageStatus, UserVoucher, Voucher, VoucherRejection, VoucherStatus, VoucherUsage, VoucherValue,
};
