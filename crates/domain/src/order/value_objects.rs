//! Value objects and child entities of the order aggregate.

use common::{ItemId, OrderId};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// Stock keeping unit identifying a product variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Creates a SKU, rejecting empty or blank values.
    pub fn new(sku: impl Into<String>) -> Result<Self, OrderError> {
        let sku = sku.into();
        if sku.trim().is_empty() {
            return Err(OrderError::SkuRequired);
        }
        Ok(Self(sku))
    }

    /// Returns the SKU as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A line requested by a caller before the order exists.
///
/// Quantities are signed so that non-positive input reaches validation
/// instead of failing to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub sku: String,
    pub quantity: i64,
}

impl NewOrderItem {
    pub fn new(sku: impl Into<String>, quantity: i64) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }

    /// Validates the line and returns its SKU and positive quantity.
    pub fn validate(&self) -> Result<(Sku, u32), OrderError> {
        let sku = Sku::new(self.sku.clone())?;
        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| OrderError::InvalidQuantity {
                sku: self.sku.clone(),
                quantity: self.quantity,
            })?;
        Ok((sku, quantity))
    }
}

/// A line item belonging to an order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    /// Unique item identifier.
    pub item_id: ItemId,

    /// Back-reference to the owning order.
    pub order_id: OrderId,

    /// Product variant being ordered.
    pub sku: Sku,

    /// Units ordered, always greater than zero.
    pub quantity: u32,
}

impl OrderItem {
    /// Creates a validated item for `order_id`.
    pub fn new(order_id: OrderId, line: &NewOrderItem) -> Result<Self, OrderError> {
        let (sku, quantity) = line.validate()?;
        Ok(Self {
            item_id: ItemId::new(),
            order_id,
            sku,
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_requires_content() {
        assert!(matches!(Sku::new(""), Err(OrderError::SkuRequired)));
        assert!(matches!(Sku::new("  "), Err(OrderError::SkuRequired)));
        assert_eq!(Sku::new("SKU-001").unwrap().as_str(), "SKU-001");
    }

    #[test]
    fn new_item_rejects_non_positive_quantity() {
        for quantity in [0, -1, i64::MIN] {
            let err = NewOrderItem::new("SKU-001", quantity).validate().unwrap_err();
            assert!(matches!(err, OrderError::InvalidQuantity { quantity: q, .. } if q == quantity));
        }
    }

    #[test]
    fn new_item_rejects_quantity_beyond_u32() {
        let line = NewOrderItem::new("SKU-001", i64::from(u32::MAX) + 1);
        assert!(matches!(
            line.validate(),
            Err(OrderError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn order_item_keeps_back_reference() {
        let order_id = OrderId::new();
        let item = OrderItem::new(order_id, &NewOrderItem::new("SKU-001", 3)).unwrap();

        assert_eq!(item.order_id, order_id);
        assert_eq!(item.sku.as_str(), "SKU-001");
        assert_eq!(item.quantity, 3);
    }
}
