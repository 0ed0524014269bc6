//! Checkout
//!
//! Order summary derived from a cart snapshot: subtotal, shipping and the
//! amount due, plus a table rendering for terminals.

use std::io;

use rust_decimal::{Decimal, dec};
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::cart::CartState;

/// Errors raised while rendering a summary.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Writing to the output failed.
    #[error("failed to write checkout summary: {0}")]
    Io(#[from] io::Error),
}

/// Flat-rate shipping with a free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShippingPolicy {
    /// Subtotal at or above which shipping is free
    pub free_threshold: Decimal,

    /// Charge below the threshold
    pub flat_rate: Decimal,

    /// Currency used to display amounts
    pub currency: &'static Currency,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_threshold: dec!(100.00),
            flat_rate: dec!(5.00),
            currency: iso::USD,
        }
    }
}

impl ShippingPolicy {
    /// Shipping charged on `subtotal`. Nothing to ship costs nothing.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal, total_items: u64) -> Decimal {
        if total_items == 0 || subtotal >= self.free_threshold {
            Decimal::ZERO
        } else {
            self.flat_rate
        }
    }
}

/// Amounts due for a cart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckoutSummary {
    /// Units in the cart
    pub total_items: u64,

    /// Sum of line totals
    pub subtotal: Decimal,

    /// Shipping charge
    pub shipping: Decimal,

    /// Subtotal plus shipping
    pub total: Decimal,

    currency: &'static Currency,
}

impl CheckoutSummary {
    /// Summarise `cart` under `policy`.
    #[must_use]
    pub fn from_cart(cart: &CartState, policy: &ShippingPolicy) -> Self {
        let subtotal = cart.total_amount();
        let shipping = policy.shipping_for(subtotal, cart.total_items());

        Self {
            total_items: cart.total_items(),
            subtotal,
            shipping,
            total: subtotal.saturating_add(shipping),
            currency: policy.currency,
        }
    }

    /// Whether shipping is free for this order.
    #[must_use]
    pub fn free_shipping(&self) -> bool {
        self.shipping.is_zero()
    }

    fn money(&self, amount: Decimal) -> String {
        Money::from_decimal(amount, self.currency).to_string()
    }

    /// Render `cart` and this summary as a table followed by the totals.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Io`] if writing to `out` fails.
    pub fn write_to(&self, mut out: impl io::Write, cart: &CartState) -> Result<(), CheckoutError> {
        let mut builder = Builder::default();

        builder.push_record(["Item", "Size", "Color", "Qty", "Price", "Total"]);

        for line in cart.items() {
            builder.push_record([
                line.product.name.clone(),
                line.size.clone(),
                line.color.clone(),
                line.quantity.to_string(),
                self.money(line.product.effective_price()),
                line.line_total()
                    .map_or_else(|_| "-".to_string(), |total| self.money(total)),
            ]);
        }

        let mut table = builder.build();
        let mut theme = Theme::from(Style::modern_rounded());

        theme.remove_horizontal_lines();
        theme.insert_horizontal_line(
            1,
            HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤')),
        );

        table.with(theme);
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(3..6), Alignment::right());

        writeln!(out, "\n{table}")?;

        let shipping = if self.free_shipping() {
            "Free".to_string()
        } else {
            self.money(self.shipping)
        };

        let rows = [
            ("Items:", self.total_items.to_string()),
            ("Subtotal:", self.money(self.subtotal)),
            ("Shipping:", shipping),
            ("Total:", self.money(self.total)),
        ];

        let value_width = rows.iter().map(|(_, value)| value.len()).max().unwrap_or(0);

        for (label, value) in rows {
            writeln!(out, " {label:<10}{value:>value_width$}")?;
        }

        writeln!(out)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        cart::{CartAction, CartState},
        products::Product,
        store::Reducer,
    };

    use super::*;

    fn cart_worth(price: Decimal, quantity: u32) -> CartState {
        CartState::empty().reduce(CartAction::Add {
            product: Product::new("a", "Classic Tee", price, "Men"),
            quantity,
            size: "M".to_string(),
            color: "Black".to_string(),
        })
    }

    #[test]
    fn charges_flat_rate_below_threshold() {
        let summary = CheckoutSummary::from_cart(&cart_worth(dec!(10), 3), &ShippingPolicy::default());

        assert_eq!(summary.subtotal, dec!(30));
        assert_eq!(summary.shipping, dec!(5.00));
        assert_eq!(summary.total, dec!(35.00));
    }

    #[test]
    fn ships_free_at_threshold() {
        let summary = CheckoutSummary::from_cart(&cart_worth(dec!(50), 2), &ShippingPolicy::default());

        assert!(summary.free_shipping());
        assert_eq!(summary.total, dec!(100));
    }

    #[test]
    fn empty_cart_costs_nothing() {
        let summary = CheckoutSummary::from_cart(&CartState::empty(), &ShippingPolicy::default());

        assert_eq!(summary.total, Decimal::ZERO);
        assert_eq!(summary.total_items, 0);
    }

    #[test]
    fn write_to_renders_lines_and_totals() -> TestResult {
        let cart = cart_worth(dec!(10), 3);
        let summary = CheckoutSummary::from_cart(&cart, &ShippingPolicy::default());

        let mut out = Vec::new();
        summary.write_to(&mut out, &cart)?;

        let text = String::from_utf8(out)?;

        assert!(text.contains("Classic Tee"), "missing item in:\n{text}");
        assert!(text.contains("$30.00"), "missing subtotal in:\n{text}");
        assert!(text.contains("$35.00"), "missing total in:\n{text}");

        Ok(())
    }

    #[test]
    fn uses_policy_currency() -> TestResult {
        let policy = ShippingPolicy {
            currency: iso::GBP,
            ..ShippingPolicy::default()
        };
        let cart = cart_worth(dec!(1.5), 2);

        let mut out = Vec::new();
        CheckoutSummary::from_cart(&cart, &policy).write_to(&mut out, &cart)?;

        assert!(String::from_utf8(out)?.contains("£3.00"));

        Ok(())
    }
}
