//! Versioned document store for the Agora marketplace.
//!
//! The backing store is a plain in-process map of JSON documents, but the
//! access discipline is the one a multi-writer deployment needs: every
//! document carries a monotonically increasing version, all mutation goes
//! through compare-and-swap, and read-modify-write callers retry on
//! version conflicts with a bounded budget. There is no multi-document
//! transaction API; higher layers must sequence and compensate.
//!
//! # Example
//!
//! ```rust,ignore
//! use agora_store::{Collection, Document};
//!
//! let carts: Collection<Cart> = Collection::new("carts");
//! carts.insert(&cart)?;
//! let updated = carts.update(cart.id.as_str(), 8, |c| {
//!     c.items.clear();
//!     Ok(())
//! })?;
//! ```

pub mod collection;
pub mod error;

pub use collection::{Collection, Document};
pub use error::StoreError;
