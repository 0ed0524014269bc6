//! Integration tests for the bundled catalog and accounts fixtures

use std::{io, sync::Arc};

use rust_decimal::dec;
use testresult::TestResult;

use aliphoria::{
    auth::{AuthError, AuthSession, CredentialDirectory},
    cart::CartStore,
    catalog::Catalog,
    checkout::{CheckoutSummary, ShippingPolicy},
    storage::{MemoryStorage, Storage},
};

fn catalog() -> Result<Catalog, aliphoria::catalog::CatalogError> {
    Catalog::load("fixtures/products/catalog.yml")
}

fn accounts() -> Result<CredentialDirectory, AuthError> {
    CredentialDirectory::load("fixtures/accounts.yml")
}

#[test]
fn bundled_catalog_loads() -> TestResult {
    let catalog = catalog()?;

    assert_eq!(catalog.len(), 8);
    assert!(catalog.featured().count() > 0);
    assert!(catalog.trending().count() > 0);

    let dress = catalog.product("1");

    assert_eq!(dress.map(|p| p.name.as_str()), Some("Summer Breeze Maxi Dress"));
    assert_eq!(dress.map(|p| p.price), Some(dec!(89.99)));
    assert!(dress.is_some_and(|p| p.offers_size("M") && p.offers_color("Sage")));

    assert_eq!(
        catalog.product("7").map(|p| p.effective_price()),
        Some(dec!(59.99))
    );

    Ok(())
}

#[test]
fn bundled_catalog_is_newest_first() -> TestResult {
    let catalog = catalog()?;
    let listed: Vec<_> = catalog.iter().map(|product| product.created_at).collect();

    assert!(listed.windows(2).all(|pair| matches!(pair, [a, b] if a >= b)));

    Ok(())
}

#[test]
fn bundled_accounts_sign_in() -> TestResult {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut session = AuthSession::open(storage, accounts()?);

    session.login("vodka@gmail.com", "admin123")?;
    assert!(session.is_admin());

    session.logout();
    session.login("alif@gmail.com", "alif123")?;
    assert!(!session.is_admin());

    Ok(())
}

#[test]
fn shopping_flow_reaches_free_shipping() -> TestResult {
    let catalog = catalog()?;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let mut cart = CartStore::open(Arc::clone(&storage));
    let policy = ShippingPolicy::default();

    let shirt = catalog
        .product("3")
        .cloned()
        .ok_or_else(|| io::Error::other("shirt missing from catalog"))?;

    let state = cart.add(shirt.clone(), 1, "M", "White");
    let summary = CheckoutSummary::from_cart(&state, &policy);

    assert_eq!(summary.shipping, dec!(5.00));

    let state = cart.add(shirt, 1, "M", "White");
    let summary = CheckoutSummary::from_cart(&state, &policy);

    assert!(summary.free_shipping());
    assert_eq!(summary.total, state.total_amount());

    Ok(())
}
