//! Aliphoria prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    auth::{AuthAction, AuthError, AuthSession, AuthState, CredentialDirectory, Role, User},
    cart::{CartAction, CartError, CartLine, CartState, CartStore, LineKey, calculate_totals},
    catalog::{Catalog, CatalogError},
    checkout::{CheckoutError, CheckoutSummary, ShippingPolicy},
    persistence::{Persisted, PersistenceError, PersistenceObserver},
    products::{PriceError, Product, ProductColor, ProductId},
    storage::{FileStorage, MemoryStorage, Storage, StorageError},
    store::{Observer, Reducer, Store, SubscriptionId},
    wishlist::{Wishlist, WishlistAction, WishlistStore},
};
