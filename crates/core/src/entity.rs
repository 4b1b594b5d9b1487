//! Business entity kinds moved between external systems and the canonical
//! store.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Entity vocabulary shared by sync jobs, bulk operations and mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Products,
    Inventory,
    Pricing,
    Customers,
    Orders,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        Self::Products,
        Self::Inventory,
        Self::Pricing,
        Self::Customers,
        Self::Orders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Inventory => "inventory",
            Self::Pricing => "pricing",
            Self::Customers => "customers",
            Self::Orders => "orders",
        }
    }

    /// Column that identifies a record of this kind in CSV input and in the
    /// canonical store.
    pub fn primary_key_field(&self) -> &'static str {
        match self {
            Self::Products | Self::Inventory | Self::Pricing => "sku",
            Self::Customers => "email",
            Self::Orders => "order_number",
        }
    }

    /// Whether records of this kind are keyed by a composite `id` (item ×
    /// location, item × price tier) rather than a single column.
    pub fn has_composite_id(&self) -> bool {
        matches!(self, Self::Inventory | Self::Pricing)
    }

    /// Field holding the canonical store key of a record of this kind.
    pub fn canonical_key_field(&self) -> &'static str {
        if self.has_composite_id() {
            "id"
        } else {
            self.primary_key_field()
        }
    }

    /// Columns whose values, joined as a composite key, identify a record.
    pub fn identity_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Products => &["sku"],
            Self::Inventory => &["sku", "warehouse_code"],
            Self::Pricing => &["sku", "price_tier"],
            Self::Customers => &["email"],
            Self::Orders => &["order_number"],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown entity type '{s}'")))
    }
}
