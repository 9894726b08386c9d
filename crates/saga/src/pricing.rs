//! Order pricing.

use std::collections::HashMap;

use common::{Money, ProductId};
use thiserror::Error;

/// Unit price charged for products without an explicit price.
pub const DEFAULT_UNIT_PRICE: Money = Money::from_cents(10050);

/// Errors produced while pricing an order or parsing a price table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("no price for product {0}")]
    UnknownProduct(ProductId),

    #[error("order total must be positive, got {0}")]
    NonPositiveTotal(Money),

    #[error("order total overflows")]
    Overflow,

    #[error("invalid price entry {0:?}: expected sku=cents")]
    InvalidEntry(String),
}

/// Per-product unit prices with an optional fallback price.
///
/// The amount charged for an order is the sum of the unit prices of its
/// products; a product listed twice is charged twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceList {
    prices: HashMap<ProductId, Money>,
    default_price: Option<Money>,
}

impl Default for PriceList {
    fn default() -> Self {
        Self::new(Some(DEFAULT_UNIT_PRICE))
    }
}

impl PriceList {
    /// Creates an empty price list. Without a default price every product
    /// must be listed explicitly.
    pub fn new(default_price: Option<Money>) -> Self {
        Self {
            prices: HashMap::new(),
            default_price,
        }
    }

    /// Adds or replaces a product price.
    pub fn with_price(mut self, product: impl Into<ProductId>, price: Money) -> Self {
        self.prices.insert(product.into(), price);
        self
    }

    /// Adds every entry of a `sku=cents,sku=cents` table.
    ///
    /// Empty entries are skipped, so an empty string leaves the list as is.
    pub fn with_price_table(mut self, table: &str) -> Result<Self, PricingError> {
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (sku, cents) = entry
                .split_once('=')
                .ok_or_else(|| PricingError::InvalidEntry(entry.to_string()))?;
            let sku = sku.trim();
            let cents: i64 = cents
                .trim()
                .parse()
                .map_err(|_| PricingError::InvalidEntry(entry.to_string()))?;
            if sku.is_empty() || cents <= 0 {
                return Err(PricingError::InvalidEntry(entry.to_string()));
            }
            self.prices.insert(ProductId::new(sku), Money::from_cents(cents));
        }
        Ok(self)
    }

    /// Returns the fallback unit price.
    pub fn default_price(&self) -> Option<Money> {
        self.default_price
    }

    /// Returns the unit price of a product.
    pub fn price_of(&self, product: &ProductId) -> Option<Money> {
        self.prices.get(product).copied().or(self.default_price)
    }

    /// Prices an order from its product list.
    pub fn quote(&self, products: &[ProductId]) -> Result<Money, PricingError> {
        let total = products.iter().try_fold(Money::zero(), |total, product| {
            let price = self
                .price_of(product)
                .ok_or_else(|| PricingError::UnknownProduct(product.clone()))?;
            total.checked_add(price).ok_or(PricingError::Overflow)
        })?;
        if !total.is_positive() {
            return Err(PricingError::NonPositiveTotal(total));
        }
        Ok(total)
    }
}
