//! Marketplace services for Agora.
//!
//! The services in this crate move stock and money on top of the
//! domain types in `agora-commerce` and the versioned document store in
//! `agora-store`:
//!
//! - [`InventoryLedger`]: stock movements with an append-only log
//! - [`FlashSaleTracker`]: flash pricing and settlement
//! - [`VoucherEngine`]: eligibility, redemption, refunds and grants
//! - [`CartManager`]: one cart per user, totals always fresh
//! - [`CheckoutOrchestrator`]: cart to order as a compensating saga
//! - [`OrderService`]: the order status state machine with its side
//!   effects
//!
//! External systems plug in through the [`collaborators`] traits;
//! in-memory implementations ship for tests and demos.
//!
//! # Example
//!
//! ```rust,ignore
//! use agora_engine::collaborators::{InMemoryCatalog, InMemoryIdentity, NullSink};
//! use agora_engine::{MarketConfig, Marketplace};
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(InMemoryCatalog::new());
//! let market = Marketplace::new(
//!     catalog.clone(),
//!     Arc::new(InMemoryIdentity::new()),
//!     Arc::new(NullSink),
//!     MarketConfig::default(),
//! );
//! ```

pub mod carts;
pub mod checkout;
pub mod collaborators;
pub mod config;
pub mod data;
pub mod flash;
pub mod ledger;
pub mod marketplace;
pub mod orders;
pub mod vouchers;

pub use carts::CartManager;
pub use checkout::CheckoutOrchestrator;
pub use config::MarketConfig;
pub use data::Datastore;
pub use flash::FlashSaleTracker;
pub use ledger::InventoryLedger;
pub use marketplace::Marketplace;
pub use orders::OrderService;
pub use vouchers::VoucherEngine;
