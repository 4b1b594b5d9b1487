//! Canonical ("unified") record shapes produced by the system transformers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Canonical product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UnifiedProduct {
    #[validate(length(min = 1))]
    pub external_id: String,
    #[validate(length(min = 1))]
    pub sku: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub status: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Canonical inventory level for one item at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UnifiedInventory {
    /// Composite `<item>_<location>` key.
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub sku: String,
    #[validate(length(min = 1))]
    pub warehouse_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_name: Option<String>,
    pub quantity_on_hand: f64,
    pub quantity_available: f64,
    pub quantity_committed: f64,
    pub quantity_on_order: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_point: Option<f64>,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Canonical price for one product at one price tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UnifiedPricing {
    /// Composite `<product>_<tier>` key.
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub sku: String,
    #[validate(length(min = 1))]
    pub price_tier: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(length(equal = 3))]
    pub currency: String,
    pub min_quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Canonical customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UnifiedCustomer {
    #[validate(length(min = 1))]
    pub external_id: String,
    #[validate(email)]
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Canonical order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UnifiedOrderLine {
    #[validate(length(min = 1))]
    pub sku: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,
}

/// Canonical sales order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UnifiedSalesOrder {
    #[validate(length(min = 1))]
    pub external_id: String,
    #[validate(length(min = 1))]
    pub order_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub status: String,
    pub order_date: String,
    pub currency: String,
    pub subtotal: f64,
    pub tax_total: f64,
    pub total: f64,
    #[validate(nested)]
    pub lines: Vec<UnifiedOrderLine>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}
