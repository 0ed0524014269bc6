//! Products

use std::{borrow::Borrow, fmt};

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Product identifier, as issued by the catalogue backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a product id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProductId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ProductId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A colour variant offered for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductColor {
    /// Display name, also used as the cart variant label.
    pub name: String,

    /// Swatch colour, e.g. `#B2BEB5`.
    pub hex: String,
}

/// Price validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// Regular or discount price below zero
    #[error("Negative price for product {0}")]
    Negative(ProductId),

    /// Discount price not below the regular price
    #[error("Discount price for product {0} is not below its regular price")]
    DiscountNotBelowPrice(ProductId),
}

/// Product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product id
    pub id: ProductId,

    /// Product name
    pub name: String,

    /// Long-form description
    #[serde(default)]
    pub description: String,

    /// Regular price
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,

    /// Discounted price, when the product is on sale
    #[serde(
        default,
        with = "rust_decimal::serde::arbitrary_precision_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount: Option<Decimal>,

    /// Image URLs, first one is the primary image
    #[serde(default)]
    pub images: Vec<String>,

    /// Top-level category, e.g. `Women`
    pub category: String,

    /// Optional subcategory, e.g. `Dresses`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,

    /// Size labels on offer
    #[serde(default)]
    pub sizes: Vec<String>,

    /// Colour variants on offer
    #[serde(default)]
    pub colors: Vec<ProductColor>,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Shown in the featured collection
    #[serde(default)]
    pub featured: bool,

    /// Shown in the trending collection
    #[serde(default)]
    pub trending: bool,

    /// Whether the product can currently be bought
    #[serde(default = "in_stock_default")]
    pub in_stock: bool,

    /// When the product was listed
    #[serde(default = "listed_at_default")]
    pub created_at: Timestamp,
}

fn in_stock_default() -> bool {
    true
}

fn listed_at_default() -> Timestamp {
    Timestamp::UNIX_EPOCH
}

impl Product {
    /// Create an in-stock product with no discount and no variants.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Decimal,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price,
            discount: None,
            images: Vec::new(),
            category: category.into(),
            subcategory: None,
            sizes: Vec::new(),
            colors: Vec::new(),
            tags: Vec::new(),
            featured: false,
            trending: false,
            in_stock: true,
            created_at: Timestamp::UNIX_EPOCH,
        }
    }

    /// Set the discounted price.
    #[must_use]
    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = Some(discount);
        self
    }

    /// The price actually charged: the discount price when set, else the regular price.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        self.discount.unwrap_or(self.price)
    }

    /// Whether the product carries a discount price.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        self.discount.is_some()
    }

    /// Whether `size` is one of the offered sizes.
    #[must_use]
    pub fn offers_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|offered| offered == size)
    }

    /// Whether `color` names one of the offered colour variants.
    #[must_use]
    pub fn offers_color(&self, color: &str) -> bool {
        self.colors.iter().any(|offered| offered.name == color)
    }

    /// Check that prices are not negative and any discount is a real reduction.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] naming the offending product.
    pub fn validate_prices(&self) -> Result<(), PriceError> {
        let negative_discount = self.discount.is_some_and(|discount| discount < Decimal::ZERO);

        if self.price < Decimal::ZERO || negative_discount {
            return Err(PriceError::Negative(self.id.clone()));
        }

        if self.discount.is_some_and(|discount| discount >= self.price) {
            return Err(PriceError::DiscountNotBelowPrice(self.id.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn effective_price_prefers_discount() {
        let regular = Product::new("a", "Tee", dec!(20), "Men");
        let sale = Product::new("b", "Tee", dec!(20), "Men").with_discount(dec!(15));

        assert_eq!(regular.effective_price(), dec!(20));
        assert_eq!(sale.effective_price(), dec!(15));
        assert!(sale.is_discounted());
        assert!(!regular.is_discounted());
    }

    #[test]
    fn deserializes_storefront_json() -> TestResult {
        let json = r##"{
            "id": "1",
            "name": "Summer Breeze Maxi Dress",
            "description": "Light and airy.",
            "price": 89.99,
            "images": ["https://example.com/1.jpeg"],
            "category": "Women",
            "subcategory": "Dresses",
            "sizes": ["XS", "S", "M"],
            "colors": [{ "name": "Sage", "hex": "#B2BEB5" }],
            "tags": ["summer"],
            "featured": true,
            "inStock": true,
            "createdAt": "2023-05-15T10:30:00Z"
        }"##;

        let product: Product = serde_json::from_str(json)?;

        assert_eq!(product.id.as_str(), "1");
        assert_eq!(product.price, dec!(89.99));
        assert_eq!(product.discount, None);
        assert!(product.featured);
        assert!(!product.trending);
        assert!(product.offers_size("M"));
        assert!(!product.offers_size("XL"));
        assert!(product.offers_color("Sage"));
        assert_eq!(product.created_at, "2023-05-15T10:30:00Z".parse::<Timestamp>()?);

        Ok(())
    }

    #[test]
    fn validate_prices_rejects_negative_and_non_reducing_discounts() {
        let negative = Product::new("a", "Tee", dec!(-1), "Men");
        let negative_discount = Product::new("b", "Tee", dec!(20), "Men").with_discount(dec!(-5));
        let no_reduction = Product::new("c", "Tee", dec!(20), "Men").with_discount(dec!(20));
        let free = Product::new("d", "Sticker", Decimal::ZERO, "Accessories");

        assert_eq!(negative.validate_prices(), Err(PriceError::Negative("a".into())));
        assert_eq!(
            negative_discount.validate_prices(),
            Err(PriceError::Negative("b".into()))
        );
        assert_eq!(
            no_reduction.validate_prices(),
            Err(PriceError::DiscountNotBelowPrice("c".into()))
        );
        assert_eq!(free.validate_prices(), Ok(()));
    }

    #[test]
    fn high_precision_prices_survive_json() -> TestResult {
        let price = "1234567890123.456789".parse::<Decimal>()?;
        let product = Product::new("a", "Tee", price, "Men").with_discount(dec!(0.1000000000000000001));

        let json = serde_json::to_string(&product)?;

        assert!(json.contains("\"price\":1234567890123.456789"), "price written as {json}");

        let restored: Product = serde_json::from_str(&json)?;

        assert_eq!(restored.price, price);
        assert_eq!(restored.discount, Some(dec!(0.1000000000000000001)));

        Ok(())
    }

    #[test]
    fn discount_is_omitted_when_absent() -> TestResult {
        let product = Product::new("a", "Tee", dec!(20), "Men");

        let json = serde_json::to_string(&product)?;

        assert!(!json.contains("discount"), "unexpected discount in {json}");

        Ok(())
    }
}
