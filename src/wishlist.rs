//! Wishlist

use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    persistence::{self, Persisted, PersistenceError, PersistenceObserver},
    products::{Product, ProductId},
    storage::Storage,
    store::{Observer, Reducer, Store, SubscriptionId},
};

/// Saved products, in the order they were saved, at most once each.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist {
    products: Vec<Product>,
}

/// Wishlist mutations.
#[derive(Debug, Clone)]
pub enum WishlistAction {
    /// Save a product; ignored when already saved.
    Add(Product),

    /// Forget a product.
    Remove(ProductId),

    /// Forget everything.
    Clear,
}

impl Wishlist {
    /// Saved products.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Whether `product_id` is saved.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.products.iter().any(|product| product.id == *product_id)
    }

    /// Number of saved products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Reducer for Wishlist {
    type Action = WishlistAction;

    fn reduce(&self, action: WishlistAction) -> Self {
        match action {
            WishlistAction::Add(product) if self.contains(&product.id) => self.clone(),
            WishlistAction::Add(product) => {
                let mut products = self.products.clone();
                products.push(product);

                Self { products }
            }
            WishlistAction::Remove(product_id) => Self {
                products: self
                    .products
                    .iter()
                    .filter(|product| product.id != product_id)
                    .cloned()
                    .collect(),
            },
            WishlistAction::Clear => Self::default(),
        }
    }
}

impl Persisted for Wishlist {
    const KEY: &'static str = "aliphoria_wishlist";

    fn validate(self) -> Result<Self, PersistenceError> {
        let mut seen = FxHashSet::default();

        for product in &self.products {
            product
                .validate_prices()
                .map_err(|error| PersistenceError::Invalid(error.to_string()))?;

            if !seen.insert(&product.id) {
                return Err(PersistenceError::Invalid(format!(
                    "product {} saved twice",
                    product.id
                )));
            }
        }

        Ok(self)
    }
}

/// Wishlist holder handed to product surfaces.
#[derive(Debug, Default)]
pub struct WishlistStore {
    store: Store<Wishlist>,
}

impl WishlistStore {
    /// Restore from `storage` and persist every later snapshot back to it.
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let mut store = Store::new(persistence::restore::<Wishlist>(storage.as_ref()));

        debug!(saved = store.state().len(), "wishlist opened");

        store.subscribe(PersistenceObserver::<Wishlist>::new(storage));

        Self { store }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Wishlist> {
        self.store.snapshot()
    }

    /// Save `product`.
    pub fn add(&mut self, product: Product) -> Arc<Wishlist> {
        self.store.dispatch(WishlistAction::Add(product))
    }

    /// Forget `product_id`.
    pub fn remove(&mut self, product_id: impl Into<ProductId>) -> Arc<Wishlist> {
        self.store
            .dispatch(WishlistAction::Remove(product_id.into()))
    }

    /// Save the product if it is not saved, forget it otherwise. Returns whether
    /// it is saved afterwards.
    pub fn toggle(&mut self, product: Product) -> bool {
        if self.is_in_wishlist(&product.id) {
            self.remove(product.id);
            false
        } else {
            self.add(product);
            true
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) -> Arc<Wishlist> {
        self.store.dispatch(WishlistAction::Clear)
    }

    /// Whether `product_id` is saved.
    #[must_use]
    pub fn is_in_wishlist(&self, product_id: &ProductId) -> bool {
        self.store.state().contains(product_id)
    }

    /// Be told about every new snapshot.
    pub fn subscribe(&mut self, observer: impl Observer<Wishlist> + 'static) -> SubscriptionId {
        self.store.subscribe(observer)
    }
}
