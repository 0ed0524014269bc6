//! Cart store

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    cart::{CartAction, CartState, LineKey},
    persistence::{self, PersistenceObserver},
    products::{Product, ProductId},
    storage::Storage,
    store::{Observer, Store, SubscriptionId},
};

/// Cart holder handed to the surfaces that read or change the cart.
#[derive(Debug, Default)]
pub struct CartStore {
    store: Store<CartState>,
}

impl CartStore {
    /// A store starting from `initial`, with no persistence attached.
    #[must_use]
    pub fn new(initial: CartState) -> Self {
        Self {
            store: Store::new(initial),
        }
    }

    /// Restore the last snapshot from `storage` (or start empty) and persist
    /// every later snapshot back to it.
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let initial = persistence::restore::<CartState>(storage.as_ref());

        info!(
            lines = initial.len(),
            total_items = initial.total_items(),
            "cart opened"
        );

        let mut cart = Self::new(initial);

        cart.subscribe(PersistenceObserver::<CartState>::new(storage));
        cart
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CartState> {
        self.store.snapshot()
    }

    /// Add `quantity` units of `product` in the given variant.
    pub fn add(
        &mut self,
        product: Product,
        quantity: u32,
        size: impl Into<String>,
        color: impl Into<String>,
    ) -> Arc<CartState> {
        let (size, color) = (size.into(), color.into());

        debug!(product = %product.id, quantity, %size, %color, "adding to cart");

        self.store.dispatch(CartAction::Add {
            product,
            quantity,
            size,
            color,
        })
    }

    /// Remove the line for the given variant.
    pub fn remove(
        &mut self,
        product_id: impl Into<ProductId>,
        size: impl Into<String>,
        color: impl Into<String>,
    ) -> Arc<CartState> {
        let key = LineKey::new(product_id, size, color);

        debug!(product = %key.product_id, size = %key.size, color = %key.color, "removing from cart");

        self.store.dispatch(CartAction::Remove(key))
    }

    /// Set the quantity for the given variant; zero or less removes the line.
    pub fn update_quantity(
        &mut self,
        product_id: impl Into<ProductId>,
        size: impl Into<String>,
        color: impl Into<String>,
        quantity: i64,
    ) -> Arc<CartState> {
        let key = LineKey::new(product_id, size, color);

        debug!(
            product = %key.product_id,
            size = %key.size,
            color = %key.color,
            quantity,
            "updating cart quantity"
        );

        self.store
            .dispatch(CartAction::UpdateQuantity { key, quantity })
    }

    /// Empty the cart.
    pub fn clear(&mut self) -> Arc<CartState> {
        debug!("clearing cart");

        self.store.dispatch(CartAction::Clear)
    }

    /// Whether a line for the given variant is in the cart.
    #[must_use]
    pub fn is_in_cart(&self, product_id: &ProductId, size: &str, color: &str) -> bool {
        self.store.state().contains(product_id, size, color)
    }

    /// Be told about every new snapshot.
    pub fn subscribe(&mut self, observer: impl Observer<CartState> + 'static) -> SubscriptionId {
        self.store.subscribe(observer)
    }

    /// Stop an earlier subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        io,
        rc::Rc,
        sync::{Mutex, PoisonError},
    };

    use rust_decimal::{Decimal, dec};
    use testresult::TestResult;

    use crate::storage::{MemoryStorage, StorageError};

    use super::*;

    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey(key.to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn tee() -> Product {
        Product::new("a", "Classic Tee", dec!(10), "Men")
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);

            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);

            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn quantity_updates_log_the_variant() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut cart = CartStore::open(Arc::new(MemoryStorage::new()));

            cart.add(tee(), 1, "M", "Black");
            cart.update_quantity("a", "M", "Black", 3);
        });

        let line = logs
            .text()
            .lines()
            .find(|line| line.contains("updating cart quantity"))
            .map(str::to_string)
            .unwrap_or_default();

        assert!(line.contains("size=M"), "missing size in {line:?}");
        assert!(line.contains("color=Black"), "missing color in {line:?}");
        assert!(line.contains("quantity=3"), "missing quantity in {line:?}");
    }

    #[test]
    fn worked_example() {
        let mut cart = CartStore::default();

        let state = cart.add(tee(), 2, "M", "Black");
        assert_eq!((state.len(), state.total_items()), (1, 2));
        assert_eq!(state.total_amount(), dec!(20.00));

        let state = cart.add(tee(), 1, "M", "Black");
        assert_eq!((state.len(), state.total_items()), (1, 3));
        assert_eq!(state.total_amount(), dec!(30.00));

        let state = cart.update_quantity("a", "M", "Black", 0);
        assert!(state.is_empty());
        assert_eq!(state.total_amount(), Decimal::ZERO);
        assert!(!cart.is_in_cart(&"a".into(), "M", "Black"));
    }

    #[test]
    fn subscribers_see_each_snapshot() {
        let totals = Rc::new(RefCell::new(Vec::new()));
        let mut cart = CartStore::default();

        let seen = Rc::clone(&totals);
        cart.subscribe(move |state: &CartState| seen.borrow_mut().push(state.total_items()));

        cart.add(tee(), 2, "M", "Black");
        cart.remove("missing", "M", "Black");
        cart.clear();

        assert_eq!(*totals.borrow(), vec![2, 2, 0]);
    }

    #[test]
    fn open_restores_persisted_cart() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        let mut first = CartStore::open(Arc::clone(&storage));
        first.add(tee(), 3, "M", "Black");

        let second = CartStore::open(storage);

        assert_eq!(second.snapshot(), first.snapshot());
        assert!(second.is_in_cart(&"a".into(), "M", "Black"));
    }

    #[test]
    fn clear_overwrites_persisted_cart() -> TestResult {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        let mut cart = CartStore::open(Arc::clone(&storage));
        cart.add(tee(), 1, "M", "Black");
        cart.clear();

        let restored = persistence::load::<CartState>(storage.as_ref())?;

        assert_eq!(restored, Some(CartState::empty()));

        Ok(())
    }

    #[test]
    fn failed_writes_do_not_roll_back() {
        let mut cart = CartStore::open(Arc::new(ReadOnlyStorage));

        let state = cart.add(tee(), 2, "M", "Black");

        assert_eq!(state.total_items(), 2);
        assert_eq!(cart.snapshot().total_items(), 2);
    }
}
