use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ProductError;

/// Minimum length of a product name.
pub const MIN_NAME_LEN: usize = 3;

/// Largest relative price change a single `update_price` call may apply.
pub const MAX_PRICE_SWING: f64 = 0.5;

// ============================================================================
// Product Entity
// ============================================================================

/// A stocked product.
///
/// `price` and `quantity` are private: every change goes through a method
/// that re-checks the bounds, so a `Product` in hand is always valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProductRecord")]
pub struct Product {
    /// Assigned by storage; `None` until the product has been persisted.
    pub id: Option<i64>,
    name: String,
    price: f64,
    quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the repository on every write.
    pub(crate) version: i64,
}

impl Product {
    pub fn new(name: impl Into<String>, price: f64, quantity: i64) -> Result<Self, ProductError> {
        let name = name.into();
        validate_name(&name)?;
        if !is_valid_price(price) {
            return Err(ProductError::NonPositivePrice(price));
        }
        if quantity < 0 {
            return Err(ProductError::NegativeQuantity(quantity));
        }

        let now = Utc::now();
        Ok(Self {
            id: None,
            name,
            price,
            quantity,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Rebuild a product loaded from storage.
    pub(crate) fn rehydrate(
        id: i64,
        name: String,
        price: f64,
        quantity: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        version: i64,
    ) -> Self {
        Self {
            id: Some(id),
            name,
            price,
            quantity,
            created_at,
            updated_at,
            version,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn is_in_stock(&self) -> bool {
        self.quantity > 0
    }

    /// Value of the stock on hand.
    pub fn total_value(&self) -> f64 {
        self.price * self.quantity as f64
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ProductError> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        self.touch();
        Ok(())
    }

    /// Replace the price. A single call may not move it by more than 50%.
    pub fn update_price(&mut self, new_price: f64) -> Result<(), ProductError> {
        if !is_valid_price(new_price) {
            return Err(ProductError::NonPositivePrice(new_price));
        }

        let swing = (new_price - self.price).abs() / self.price;
        if swing > MAX_PRICE_SWING {
            return Err(ProductError::PriceSwingTooLarge {
                current: self.price,
                requested: new_price,
            });
        }

        self.price = new_price;
        self.touch();
        Ok(())
    }

    pub fn add_stock(&mut self, amount: i64) -> Result<(), ProductError> {
        if amount <= 0 {
            return Err(ProductError::NonPositiveAmount(amount));
        }

        self.quantity = self
            .quantity
            .checked_add(amount)
            .ok_or(ProductError::StockOverflow {
                current: self.quantity,
                amount,
            })?;
        self.touch();
        Ok(())
    }

    pub fn remove_stock(&mut self, amount: i64) -> Result<(), ProductError> {
        if amount <= 0 {
            return Err(ProductError::NonPositiveAmount(amount));
        }
        if amount > self.quantity {
            return Err(ProductError::InsufficientStock {
                requested: amount,
                available: self.quantity,
            });
        }

        self.quantity -= amount;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Serialized form of a product. Decoding goes through `Product::new` so
/// stored JSON gets the same checks as fresh input.
#[derive(Deserialize)]
struct ProductRecord {
    id: Option<i64>,
    name: String,
    price: f64,
    quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    version: i64,
}

impl TryFrom<ProductRecord> for Product {
    type Error = ProductError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        let mut product = Product::new(record.name, record.price, record.quantity)?;
        product.id = record.id;
        product.created_at = record.created_at;
        product.updated_at = record.updated_at;
        product.version = record.version;
        Ok(product)
    }
}

fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

fn validate_name(name: &str) -> Result<(), ProductError> {
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ProductError::NameTooShort {
            name: name.to_string(),
            min: MIN_NAME_LEN,
        });
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
