//! NetSuite record transformer.
//!
//! NetSuite REST records use camelCase field names, `internalId` identifiers
//! and reference objects like `{"internalId": "7", "name": "Main"}`. Custom
//! fields (`custitem_*`, `custentity_*`, ...) are kept in `metadata`.

use serde_json::{json, Value};

use super::common::{
    apply_field_renames, build_composite_key, capture_metadata, coerce_number,
    derive_location_code, map_status, normalize_dimensions, optional_number,
    parse_optional_system_date, parse_system_date, reference_id, reference_name, require_string,
    value_as_bool, value_as_string, with_record_context,
};
use super::records::{
    UnifiedCustomer, UnifiedInventory, UnifiedOrderLine, UnifiedPricing, UnifiedProduct,
    UnifiedSalesOrder,
};
use super::{SystemTransformer, TransformerOptions};
use crate::entity::EntityKind;
use crate::error::CoreResult;
use crate::mapping::{FieldMapping, SchemaMapping, TransformTag, CANONICAL_SCHEMA};

pub const SYSTEM: &str = "netsuite";
const DISPLAY: &str = "NetSuite";

const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_PRICE_LEVEL: &str = "Base Price";

const ORDER_STATUS: &[(&str, &str)] = &[
    ("Pending Approval", "pending"),
    ("Pending Fulfillment", "processing"),
    ("Partially Fulfilled", "partially_shipped"),
    ("Pending Billing/Partially Fulfilled", "partially_shipped"),
    ("Pending Billing", "shipped"),
    ("Billed", "completed"),
    ("Closed", "closed"),
    ("Cancelled", "cancelled"),
];

const CUSTOMER_STATUS: &[(&str, &str)] = &[
    ("CUSTOMER-Closed Won", "active"),
    ("CUSTOMER-Renewal", "active"),
    ("LEAD-Unqualified", "lead"),
    ("LEAD-Qualified", "lead"),
    ("PROSPECT-In Discussion", "prospect"),
    ("PROSPECT-Proposal", "prospect"),
    ("CUSTOMER-Lost", "inactive"),
];

const PRODUCT_FIELDS: &[&str] = &[
    "internalId",
    "itemId",
    "displayName",
    "salesDescription",
    "purchaseDescription",
    "basePrice",
    "cost",
    "weight",
    "dimensions",
    "class",
    "isInactive",
    "createdDate",
    "lastModifiedDate",
];

const INVENTORY_FIELDS: &[&str] = &[
    "item",
    "itemId",
    "location",
    "locationName",
    "quantityOnHand",
    "quantityAvailable",
    "quantityCommitted",
    "quantityOnOrder",
    "reorderPoint",
    "lastModifiedDate",
];

const PRICING_FIELDS: &[&str] = &[
    "item",
    "itemId",
    "priceLevel",
    "unitPrice",
    "currency",
    "quantity",
    "effectiveDate",
];

const CUSTOMER_FIELDS: &[&str] = &[
    "internalId",
    "email",
    "firstName",
    "lastName",
    "companyName",
    "phone",
    "entityStatus",
    "isInactive",
    "priceLevel",
    "dateCreated",
];

const ORDER_FIELDS: &[&str] = &[
    "internalId",
    "tranId",
    "entity",
    "status",
    "tranDate",
    "currency",
    "subtotal",
    "taxTotal",
    "total",
    "item",
];

/// Transformer for NetSuite records.
#[derive(Debug, Clone, Default)]
pub struct NetSuiteTransformer {
    options: TransformerOptions,
}

impl NetSuiteTransformer {
    pub fn new(options: TransformerOptions) -> Self {
        Self { options }
    }

    fn prepare(&self, record: &Value) -> Value {
        apply_field_renames(record, &self.options.field_renames)
    }
}

impl SystemTransformer for NetSuiteTransformer {
    fn system(&self) -> &'static str {
        SYSTEM
    }

    fn display_name(&self) -> &'static str {
        DISPLAY
    }

    fn transform_product(&self, record: &Value) -> CoreResult<UnifiedProduct> {
        let record = self.prepare(record);
        let external_id = require_string(&record, "internalId", "NetSuite item")?;
        let context = format!("NetSuite item {external_id}");

        let sku = value_as_string(record.get("itemId")).unwrap_or_else(|| external_id.clone());
        let is_active = !value_as_bool(record.get("isInactive")).unwrap_or(false);

        Ok(UnifiedProduct {
            name: value_as_string(record.get("displayName")).unwrap_or_else(|| sku.clone()),
            description: value_as_string(record.get("salesDescription"))
                .or_else(|| value_as_string(record.get("purchaseDescription"))),
            price: optional_number(record.get("basePrice")),
            cost: optional_number(record.get("cost")),
            weight: optional_number(record.get("weight")),
            dimensions: value_as_string(record.get("dimensions"))
                .map(|d| normalize_dimensions(&d)),
            category: reference_name(record.get("class")),
            status: if is_active { "active" } else { "inactive" }.to_string(),
            is_active,
            created_at: parse_optional_system_date(DISPLAY, record.get("createdDate"))
                .map_err(|e| with_record_context(&context, e))?,
            updated_at: parse_system_date(DISPLAY, record.get("lastModifiedDate"))
                .map_err(|e| with_record_context(&context, e))?,
            metadata: capture_metadata(&record, PRODUCT_FIELDS),
            external_id,
            sku,
        })
    }

    fn transform_inventory(&self, record: &Value) -> CoreResult<UnifiedInventory> {
        let record = self.prepare(record);
        let item_ref = reference_id(record.get("item")).or_else(|| record.get("itemId"));
        let location_ref = reference_id(record.get("location"));
        let id = build_composite_key(&[item_ref, location_ref]);
        let context = format!("NetSuite inventory {id}");

        let sku = value_as_string(record.get("itemId"))
            .or_else(|| reference_name(record.get("item")))
            .or_else(|| value_as_string(item_ref))
            .unwrap_or_default();
        let warehouse_name = value_as_string(record.get("locationName"))
            .or_else(|| match record.get("location") {
                Some(Value::Object(_)) => reference_name(record.get("location")),
                _ => None,
            });
        let warehouse_code = warehouse_name
            .clone()
            .or_else(|| value_as_string(location_ref))
            .map(|name| derive_location_code(&name))
            .unwrap_or_default();

        let on_hand = coerce_number(record.get("quantityOnHand"), 0.0);
        let committed = coerce_number(record.get("quantityCommitted"), 0.0);
        let available = optional_number(record.get("quantityAvailable"))
            .unwrap_or(on_hand - committed);

        Ok(UnifiedInventory {
            sku,
            warehouse_code,
            warehouse_name,
            quantity_on_hand: on_hand,
            quantity_available: available,
            quantity_committed: committed,
            quantity_on_order: coerce_number(record.get("quantityOnOrder"), 0.0),
            reorder_point: optional_number(record.get("reorderPoint")),
            updated_at: parse_system_date(DISPLAY, record.get("lastModifiedDate"))
                .map_err(|e| with_record_context(&context, e))?,
            metadata: capture_metadata(&record, INVENTORY_FIELDS),
            id,
        })
    }

    fn transform_pricing(&self, record: &Value) -> CoreResult<UnifiedPricing> {
        let record = self.prepare(record);
        let item_ref = reference_id(record.get("item")).or_else(|| record.get("itemId"));
        let price_tier = reference_name(record.get("priceLevel"))
            .unwrap_or_else(|| DEFAULT_PRICE_LEVEL.to_string());
        let tier_value = Value::String(price_tier.clone());
        let id = build_composite_key(&[item_ref, Some(&tier_value)]);
        let context = format!("NetSuite price {id}");

        Ok(UnifiedPricing {
            sku: value_as_string(record.get("itemId"))
                .or_else(|| reference_name(record.get("item")))
                .or_else(|| value_as_string(item_ref))
                .unwrap_or_default(),
            price: coerce_number(record.get("unitPrice"), 0.0),
            currency: reference_name(record.get("currency"))
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            min_quantity: coerce_number(record.get("quantity"), 0.0),
            compare_at_price: None,
            effective_date: parse_optional_system_date(DISPLAY, record.get("effectiveDate"))
                .map_err(|e| with_record_context(&context, e))?,
            metadata: capture_metadata(&record, PRICING_FIELDS),
            price_tier,
            id,
        })
    }

    fn transform_customer(&self, record: &Value) -> CoreResult<UnifiedCustomer> {
        let record = self.prepare(record);
        let external_id = require_string(&record, "internalId", "NetSuite customer")?;
        let context = format!("NetSuite customer {external_id}");
        let email = require_string(&record, "email", &context)?;

        let status = if value_as_bool(record.get("isInactive")).unwrap_or(false) {
            "inactive".to_string()
        } else {
            reference_name(record.get("entityStatus"))
                .map(|s| map_status(CUSTOMER_STATUS, &s))
                .unwrap_or_else(|| "active".to_string())
        };

        Ok(UnifiedCustomer {
            email: email.to_lowercase(),
            first_name: value_as_string(record.get("firstName")),
            last_name: value_as_string(record.get("lastName")),
            company_name: value_as_string(record.get("companyName")),
            phone: value_as_string(record.get("phone")),
            status,
            price_tier: reference_name(record.get("priceLevel")),
            created_at: parse_optional_system_date(DISPLAY, record.get("dateCreated"))
                .map_err(|e| with_record_context(&context, e))?,
            metadata: capture_metadata(&record, CUSTOMER_FIELDS),
            external_id,
        })
    }

    fn transform_sales_order(&self, record: &Value) -> CoreResult<UnifiedSalesOrder> {
        let record = self.prepare(record);
        let external_id = require_string(&record, "internalId", "NetSuite sales order")?;
        let context = format!("NetSuite sales order {external_id}");

        let lines: Vec<UnifiedOrderLine> = order_lines(&record)
            .iter()
            .map(|line| {
                let quantity = coerce_number(line.get("quantity"), 0.0);
                let unit_price = coerce_number(line.get("rate"), 0.0);
                UnifiedOrderLine {
                    sku: reference_name(line.get("item"))
                        .or_else(|| value_as_string(line.get("itemId")))
                        .unwrap_or_default(),
                    quantity,
                    unit_price,
                    line_total: optional_number(line.get("amount"))
                        .unwrap_or(quantity * unit_price),
                }
            })
            .collect();

        let subtotal = optional_number(record.get("subtotal"))
            .unwrap_or_else(|| lines.iter().map(|l| l.line_total).sum());
        let tax_total = coerce_number(record.get("taxTotal"), 0.0);

        Ok(UnifiedSalesOrder {
            order_number: value_as_string(record.get("tranId"))
                .unwrap_or_else(|| external_id.clone()),
            customer_id: reference_id(record.get("entity")).and_then(|v| value_as_string(Some(v))),
            status: reference_name(record.get("status"))
                .map(|s| map_status(ORDER_STATUS, &s))
                .unwrap_or_else(|| "pending".to_string()),
            order_date: parse_system_date(DISPLAY, record.get("tranDate"))
                .map_err(|e| with_record_context(&context, e))?,
            currency: reference_name(record.get("currency"))
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            total: optional_number(record.get("total")).unwrap_or(subtotal + tax_total),
            subtotal,
            tax_total,
            lines,
            metadata: capture_metadata(&record, ORDER_FIELDS),
            external_id,
        })
    }

    fn field_mappings(&self) -> Vec<SchemaMapping> {
        let mapping = |kind: EntityKind, fields: Vec<FieldMapping>| {
            SchemaMapping::new(SYSTEM, CANONICAL_SCHEMA, kind.as_str(), fields)
        };
        vec![
            mapping(
                EntityKind::Products,
                vec![
                    FieldMapping::new("internalId", "external_id").with_transform(TransformTag::ToString),
                    FieldMapping::new("itemId", "sku").required(),
                    FieldMapping::new("displayName", "name"),
                    FieldMapping::new("salesDescription", "description"),
                    FieldMapping::new("basePrice", "price").with_transform(TransformTag::ToNumber),
                    FieldMapping::new("cost", "cost").with_transform(TransformTag::ToNumber),
                    FieldMapping::new("weight", "weight").with_transform(TransformTag::ToNumber),
                    FieldMapping::new("dimensions", "dimensions"),
                    FieldMapping::new("class.name", "category"),
                ],
            ),
            mapping(
                EntityKind::Inventory,
                vec![
                    FieldMapping::new("itemId", "sku").required(),
                    FieldMapping::new("locationName", "warehouse_name"),
                    FieldMapping::new("quantityOnHand", "quantity_on_hand")
                        .with_transform(TransformTag::ToNumber)
                        .with_default(json!(0)),
                    FieldMapping::new("quantityAvailable", "quantity_available")
                        .with_transform(TransformTag::ToNumber),
                    FieldMapping::new("quantityCommitted", "quantity_committed")
                        .with_transform(TransformTag::ToNumber),
                    FieldMapping::new("reorderPoint", "reorder_point")
                        .with_transform(TransformTag::ToNumber),
                ],
            ),
            mapping(
                EntityKind::Pricing,
                vec![
                    FieldMapping::new("itemId", "sku").required(),
                    FieldMapping::new("priceLevel.name", "price_tier")
                        .with_default(json!(DEFAULT_PRICE_LEVEL)),
                    FieldMapping::new("unitPrice", "price").with_transform(TransformTag::ToNumber),
                    FieldMapping::new("currency", "currency").with_default(json!(DEFAULT_CURRENCY)),
                ],
            ),
            mapping(
                EntityKind::Customers,
                vec![
                    FieldMapping::new("email", "email")
                        .required()
                        .with_transform(TransformTag::Lowercase),
                    FieldMapping::new("firstName", "first_name"),
                    FieldMapping::new("lastName", "last_name"),
                    FieldMapping::new("companyName", "company_name"),
                    FieldMapping::new("phone", "phone"),
                ],
            ),
            mapping(
                EntityKind::Orders,
                vec![
                    FieldMapping::new("tranId", "order_number").required(),
                    FieldMapping::new("entity.internalId", "customer_id"),
                    FieldMapping::new("currency", "currency"),
                    FieldMapping::new("subtotal", "subtotal").with_transform(TransformTag::ToNumber),
                    FieldMapping::new("taxTotal", "tax_total").with_transform(TransformTag::ToNumber),
                    FieldMapping::new("total", "total").with_transform(TransformTag::ToNumber),
                ],
            ),
        ]
    }
}

/// Sales-order lines live under `item.items` in REST responses and under a
/// flat `item` array in saved-search exports.
fn order_lines(record: &Value) -> Vec<Value> {
    match record.get("item") {
        Some(Value::Object(map)) => match map.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}
