//! Order domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{OrderId, Price, ProductId, Quantity, Username};

/// One validated order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// A placed order. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned key.
    pub id: OrderId,
    /// Username of the customer who placed it.
    pub user_id: Username,
    /// Lines in request order.
    #[serde(rename = "products")]
    pub line_items: Vec<LineItem>,
    /// Sum of unit price times quantity at placement time.
    pub total_price: Price,
    /// When the order was placed.
    pub order_date: DateTime<Utc>,
}

/// An order that has been priced but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: Username,
    pub line_items: Vec<LineItem>,
    pub total_price: Price,
    pub order_date: DateTime<Utc>,
}

impl NewOrder {
    /// Attach the key the store assigned.
    #[must_use]
    pub fn with_id(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            line_items: self.line_items,
            total_price: self.total_price,
            order_date: self.order_date,
        }
    }
}

/// A product reference as a client sent it.
///
/// Clients may send the id as a number or a string. A reference that is not
/// a valid product key names no product, which is a lookup miss rather than
/// a malformed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Number(i64),
    Text(String),
}

impl ProductRef {
    /// The product key this reference names, if it can name one at all.
    #[must_use]
    pub fn resolve(&self) -> Option<ProductId> {
        match self {
            Self::Number(n) => i32::try_from(*n).ok().map(ProductId::new),
            Self::Text(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<ProductId> for ProductRef {
    fn from(id: ProductId) -> Self {
        Self::Number(i64::from(id.as_i32()))
    }
}

/// An order line before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    pub product_id: ProductRef,
    pub quantity: i64,
}

impl RequestedLine {
    /// Convenience constructor for a known product.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_product_ref_accepts_numbers_and_strings() {
        let lines: Vec<RequestedLine> = serde_json::from_str(
            r#"[{"product_id": 3, "quantity": 2}, {"product_id": "4", "quantity": 1}]"#,
        )
        .unwrap();
        assert_eq!(lines[0].product_id.resolve(), Some(ProductId::new(3)));
        assert_eq!(lines[1].product_id.resolve(), Some(ProductId::new(4)));
    }

    #[test]
    fn test_product_ref_unresolvable() {
        assert_eq!(ProductRef::Text("X9".to_owned()).resolve(), None);
        assert_eq!(ProductRef::Number(i64::MAX).resolve(), None);
        assert_eq!(ProductRef::Text("X9".to_owned()).to_string(), "X9");
    }

    #[test]
    fn test_order_wire_shape() {
        let order = NewOrder {
            user_id: Username::parse("user1").unwrap(),
            line_items: vec![LineItem {
                product_id: ProductId::new(1),
                quantity: Quantity::new(2).unwrap(),
            }],
            total_price: Price::new(Decimal::new(79_998, 2)).unwrap(),
            order_date: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
        .with_id(OrderId::new(7));

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["user_id"], "user1");
        assert_eq!(json["products"][0]["product_id"], 1);
        assert_eq!(json["products"][0]["quantity"], 2);
        assert_eq!(json["total_price"], serde_json::json!(799.98));
        assert!(json.get("line_items").is_none());
    }
}
