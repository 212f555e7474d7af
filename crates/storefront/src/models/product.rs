//! Product domain types and catalog query shapes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use emporium_core::{Price, ProductId};

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Store-assigned key.
    pub id: ProductId,
    /// Display name. Never empty.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Unit price.
    pub price: Price,
    /// Units in stock. Never negative once committed.
    pub quantity_available: i32,
}

/// Fields for a product that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Unit price.
    pub price: Price,
    /// Initial stock.
    pub quantity_available: i32,
}

/// A partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductPatch {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New unit price.
    pub price: Option<Price>,
    /// New stock level.
    pub quantity_available: Option<i32>,
}

impl ProductPatch {
    /// Whether the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.quantity_available.is_none()
    }

    /// Apply the patch to a product in place.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            product.description.clone_from(description);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(quantity) = self.quantity_available {
            product.quantity_available = quantity;
        }
    }
}

/// An inclusive price filter. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PriceRange {
    /// Lowest price to include.
    pub min: Option<Price>,
    /// Highest price to include.
    pub max: Option<Price>,
}

impl PriceRange {
    /// Whether `price` falls inside the range.
    #[must_use]
    pub fn contains(&self, price: Price) -> bool {
        self.min.is_none_or(|min| price >= min) && self.max.is_none_or(|max| price <= max)
    }
}

/// Errors from parsing sort parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SortParseError {
    /// Not one of the sortable product fields.
    #[error("invalid sort field: {0}")]
    Field(String),
    /// Not `1` or `-1`.
    #[error("invalid sort order: {0} (expected 1 or -1)")]
    Order(String),
}

/// Product fields that listings may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Id,
    Name,
    Description,
    Price,
    QuantityAvailable,
}

impl SortField {
    /// Column name in the `products` table.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Description => "description",
            Self::Price => "price",
            Self::QuantityAvailable => "quantity_available",
        }
    }
}

impl FromStr for SortField {
    type Err = SortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "description" => Ok(Self::Description),
            "price" => Ok(Self::Price),
            "quantity_available" => Ok(Self::QuantityAvailable),
            other => Err(SortParseError::Field(other.to_owned())),
        }
    }
}

/// Sort direction, written `1` (ascending) or `-1` (descending) on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// SQL keyword for this direction.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = SortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::Ascending),
            "-1" => Ok(Self::Descending),
            other => Err(SortParseError::Order(other.to_owned())),
        }
    }
}

/// A sort request: one field, one direction. Ties break on ascending id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductSort {
    pub field: SortField,
    pub order: SortOrder,
}
