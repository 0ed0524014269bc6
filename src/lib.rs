//! Aliphoria
//!
//! Aliphoria is the state layer of a clothing storefront: a cart store with
//! per-variant lines and derived totals, a wishlist, a mock sign-in session,
//! all persisted as versioned JSON snapshots and read by a checkout summary.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod observability;
pub mod persistence;
pub mod prelude;
pub mod products;
pub mod storage;
pub mod store;
pub mod wishlist;
