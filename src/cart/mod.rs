//! Cart
//!
//! The cart is a pure value: [`CartState::reduce`] turns the previous snapshot
//! and one [`CartAction`] into the next snapshot. Lines are identified by
//! [`LineKey`], the `(product id, size, colour)` triple; adding a line whose key
//! is already present merges quantities instead of appending a duplicate.
//!
//! `total_items` and `total_amount` are derived from `items` and recomputed by
//! every transition. Nothing outside this module can set them.

use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{
    persistence::{Persisted, PersistenceError},
    products::{Product, ProductId},
    store::Reducer,
};

pub mod store;

pub use store::CartStore;

/// Cart arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// A line total or the cart total does not fit in a `Decimal`
    #[error("Cart amount overflowed at product {0}")]
    AmountOverflow(ProductId),
}

/// Identity of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    /// Product id
    pub product_id: ProductId,

    /// Size label
    pub size: String,

    /// Colour label
    pub color: String,
}

impl LineKey {
    /// Build a key from its parts.
    pub fn new(
        product_id: impl Into<ProductId>,
        size: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.into(),
            color: color.into(),
        }
    }
}

/// One purchasable configuration of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product as it was when added
    pub product: Product,

    /// Number of units, never zero
    pub quantity: u32,

    /// Selected size
    pub size: String,

    /// Selected colour
    pub color: String,
}

impl CartLine {
    /// Whether this line has the given identity.
    #[must_use]
    pub fn matches(&self, product_id: &ProductId, size: &str, color: &str) -> bool {
        self.product.id == *product_id && self.size == size && self.color == color
    }

    /// This line's identity key.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.id.clone(), self.size.clone(), self.color.clone())
    }

    /// Effective unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::AmountOverflow`] if the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Result<Decimal, CartError> {
        self.product
            .effective_price()
            .checked_mul(Decimal::from(self.quantity))
            .ok_or_else(|| CartError::AmountOverflow(self.product.id.clone()))
    }
}

/// Cart mutations.
#[derive(Debug, Clone)]
pub enum CartAction {
    /// Merge `quantity` units into the matching line, or append a new line.
    Add {
        /// Product to add
        product: Product,
        /// Units to add
        quantity: u32,
        /// Selected size
        size: String,
        /// Selected colour
        color: String,
    },

    /// Drop the matching line, if any.
    Remove(LineKey),

    /// Set the matching line's quantity; zero or less removes it.
    UpdateQuantity {
        /// Line to update
        key: LineKey,
        /// New absolute quantity
        quantity: i64,
    },

    /// Empty the cart.
    Clear,
}

/// Cart snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    items: Vec<CartLine>,

    total_items: u64,

    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    total_amount: Decimal,
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a cart from lines, computing the totals.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::AmountOverflow`] if the total amount does not fit in a `Decimal`.
    pub fn from_items(items: Vec<CartLine>) -> Result<Self, CartError> {
        let (total_items, total_amount) = calculate_totals(&items)?;

        Ok(Self {
            items,
            total_items,
            total_amount,
        })
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    /// Sum of effective price times quantity.
    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line with the given identity, if present.
    #[must_use]
    pub fn line(&self, product_id: &ProductId, size: &str, color: &str) -> Option<&CartLine> {
        self.items
            .iter()
            .find(|line| line.matches(product_id, size, color))
    }

    /// Whether a line with the given identity is present.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId, size: &str, color: &str) -> bool {
        self.line(product_id, size, color).is_some()
    }

    fn position(&self, product_id: &ProductId, size: &str, color: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|line| line.matches(product_id, size, color))
    }

    /// The cart holding `items`, or an unchanged copy of `self` when their
    /// totals overflow.
    fn settle(&self, items: Vec<CartLine>) -> Self {
        match Self::from_items(items) {
            Ok(next) => next,
            Err(error) => {
                warn!(%error, "rejecting cart change");
                self.clone()
            }
        }
    }

    fn add(&self, product: Product, quantity: u32, size: String, color: String) -> Self {
        if quantity == 0 {
            return self.clone();
        }

        if let Err(error) = product.validate_prices() {
            warn!(%error, "rejecting cart change");
            return self.clone();
        }

        let mut items = self.items.clone();

        match self.position(&product.id, &size, &color) {
            Some(idx) => {
                if let Some(line) = items.get_mut(idx) {
                    line.quantity = line.quantity.saturating_add(quantity);
                }
            }
            None => items.push(CartLine {
                product,
                quantity,
                size,
                color,
            }),
        }

        self.settle(items)
    }

    fn remove(&self, key: &LineKey) -> Self {
        let items = self
            .items
            .iter()
            .filter(|line| !line.matches(&key.product_id, &key.size, &key.color))
            .cloned()
            .collect();

        self.settle(items)
    }

    fn update_quantity(&self, key: &LineKey, quantity: i64) -> Self {
        let Ok(quantity @ 1..) = u32::try_from(quantity.min(i64::from(u32::MAX))) else {
            return self.remove(key);
        };

        let items = self
            .items
            .iter()
            .map(|line| {
                if line.matches(&key.product_id, &key.size, &key.color) {
                    CartLine {
                        quantity,
                        ..line.clone()
                    }
                } else {
                    line.clone()
                }
            })
            .collect();

        self.settle(items)
    }
}

impl Reducer for CartState {
    type Action = CartAction;

    fn reduce(&self, action: CartAction) -> Self {
        match action {
            CartAction::Add {
                product,
                quantity,
                size,
                color,
            } => self.add(product, quantity, size, color),
            CartAction::Remove(key) => self.remove(&key),
            CartAction::UpdateQuantity { key, quantity } => self.update_quantity(&key, quantity),
            CartAction::Clear => Self::empty(),
        }
    }
}

impl Persisted for CartState {
    const KEY: &'static str = "aliphoria_cart";

    fn validate(self) -> Result<Self, PersistenceError> {
        let mut seen = FxHashSet::default();

        for line in &self.items {
            line.product
                .validate_prices()
                .map_err(|error| PersistenceError::Invalid(error.to_string()))?;

            if line.quantity == 0 {
                return Err(PersistenceError::Invalid(format!(
                    "line for product {} has zero quantity",
                    line.product.id
                )));
            }

            if !seen.insert(line.key()) {
                return Err(PersistenceError::Invalid(format!(
                    "duplicate line for product {} ({}, {})",
                    line.product.id, line.size, line.color
                )));
            }
        }

        // Stored totals are derived data; trust only the lines.
        Self::from_items(self.items).map_err(|error| PersistenceError::Invalid(error.to_string()))
    }
}

/// Fold lines into `(total_items, total_amount)`, in insertion order.
///
/// # Errors
///
/// Returns [`CartError::AmountOverflow`] naming the first line whose total, or
/// whose addition to the running amount, does not fit in a `Decimal`.
pub fn calculate_totals(items: &[CartLine]) -> Result<(u64, Decimal), CartError> {
    items
        .iter()
        .try_fold((0_u64, Decimal::ZERO), |(count, amount), line| {
            let amount = amount
                .checked_add(line.line_total()?)
                .ok_or_else(|| CartError::AmountOverflow(line.product.id.clone()))?;

            Ok((count.saturating_add(u64::from(line.quantity)), amount))
        })
}
