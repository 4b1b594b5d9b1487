//! Shopify record transformer.
//!
//! Shopify Admin API records use snake_case fields and numeric ids. Product
//! price, SKU and weight live on the first variant; metafields are flattened
//! into `metadata` as `namespace.key`.

use serde_json::{json, Map, Value};

use super::common::{
    apply_field_renames, build_composite_key, capture_metadata, coerce_number,
    derive_location_code, map_status, normalize_dimensions, optional_number,
    parse_optional_system_date, parse_system_date, require_string, value_as_string,
    with_record_context,
};
use super::records::{
    UnifiedCustomer, UnifiedInventory, UnifiedOrderLine, UnifiedPricing, UnifiedProduct,
    UnifiedSalesOrder,
};
use super::{SystemTransformer, TransformerOptions};
use crate::entity::EntityKind;
use crate::error::CoreResult;
use crate::mapping::{FieldMapping, SchemaMapping, TransformTag, CANONICAL_SCHEMA};

pub const SYSTEM: &str = "shopify";
const DISPLAY: &str = "Shopify";

const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_PRICE_TIER: &str = "retail";
const GRAMS_PER_KILOGRAM: f64 = 1000.0;

const PRODUCT_STATUS: &[(&str, &str)] =
    &[("active", "active"), ("draft", "draft"), ("archived", "archived")];

const CUSTOMER_STATUS: &[(&str, &str)] = &[
    ("enabled", "active"),
    ("disabled", "inactive"),
    ("invited", "pending"),
    ("declined", "inactive"),
];

const ORDER_STATUS: &[(&str, &str)] = &[
    ("pending", "pending"),
    ("authorized", "pending"),
    ("paid", "processing"),
    ("partially_paid", "processing"),
    ("partial", "partially_shipped"),
    ("fulfilled", "shipped"),
    ("refunded", "refunded"),
    ("partially_refunded", "refunded"),
    ("voided", "cancelled"),
];

const PRODUCT_FIELDS: &[&str] = &[
    "id",
    "title",
    "body_html",
    "handle",
    "product_type",
    "status",
    "variants",
    "images",
    "options",
    "metafields",
    "created_at",
    "updated_at",
];

const INVENTORY_FIELDS: &[&str] = &[
    "inventory_item_id",
    "location_id",
    "location_name",
    "sku",
    "available",
    "on_hand",
    "committed",
    "incoming",
    "updated_at",
];

const PRICING_FIELDS: &[&str] = &[
    "id",
    "product_id",
    "sku",
    "price",
    "compare_at_price",
    "price_tier",
    "currency",
    "min_quantity",
    "updated_at",
];

const CUSTOMER_FIELDS: &[&str] = &[
    "id",
    "email",
    "first_name",
    "last_name",
    "phone",
    "state",
    "default_address",
    "metafields",
    "created_at",
];

const ORDER_FIELDS: &[&str] = &[
    "id",
    "name",
    "order_number",
    "customer",
    "financial_status",
    "fulfillment_status",
    "cancelled_at",
    "created_at",
    "currency",
    "subtotal_price",
    "total_tax",
    "total_price",
    "line_items",
];

/// Transformer for Shopify Admin API records.
#[derive(Debug, Clone, Default)]
pub struct ShopifyTransformer {
    options: TransformerOptions,
}

impl ShopifyTransformer {
    pub fn new(options: TransformerOptions) -> Self {
        Self { options }
    }

    fn prepare(&self, record: &Value) -> Value {
        apply_field_renames(record, &self.options.field_renames)
    }
}

impl SystemTransformer for ShopifyTransformer {
    fn system(&self) -> &'static str {
        SYSTEM
    }

    fn display_name(&self) -> &'static str {
        DISPLAY
    }

    fn transform_product(&self, record: &Value) -> CoreResult<UnifiedProduct> {
        let record = self.prepare(record);
        let external_id = require_string(&record, "id", "Shopify product")?;
        let context = format!("Shopify product {external_id}");
        let variant = record.pointer("/variants/0");
        let variant_field = |field: &str| variant.and_then(|v| v.get(field));

        let sku = value_as_string(variant_field("sku"))
            .or_else(|| value_as_string(record.get("handle")))
            .unwrap_or_else(|| external_id.clone());
        let status = value_as_string(record.get("status"))
            .map(|s| map_status(PRODUCT_STATUS, &s))
            .unwrap_or_else(|| "active".to_string());

        let mut metadata = capture_metadata(&record, PRODUCT_FIELDS);
        metadata.extend(flatten_metafields(record.get("metafields")));

        let weight = optional_number(variant_field("weight")).or_else(|| {
            optional_number(variant_field("grams")).map(|g| g / GRAMS_PER_KILOGRAM)
        });
        let dimensions = metadata
            .get("custom.dimensions")
            .and_then(|v| value_as_string(Some(v)))
            .map(|d| normalize_dimensions(&d));

        Ok(UnifiedProduct {
            name: value_as_string(record.get("title")).unwrap_or_else(|| sku.clone()),
            description: value_as_string(record.get("body_html")),
            price: optional_number(variant_field("price")),
            cost: None,
            weight,
            dimensions,
            category: value_as_string(record.get("product_type")),
            is_active: status == "active",
            status,
            created_at: parse_optional_system_date(DISPLAY, record.get("created_at"))
                .map_err(|e| with_record_context(&context, e))?,
            updated_at: parse_system_date(DISPLAY, record.get("updated_at"))
                .map_err(|e| with_record_context(&context, e))?,
            metadata,
            external_id,
            sku,
        })
    }

    fn transform_inventory(&self, record: &Value) -> CoreResult<UnifiedInventory> {
        let record = self.prepare(record);
        let item_ref = record.get("inventory_item_id");
        let location_ref = record.get("location_id");
        let id = build_composite_key(&[item_ref, location_ref]);
        let context = format!("Shopify inventory level {id}");

        let warehouse_name = value_as_string(record.get("location_name"));
        let warehouse_code = warehouse_name
            .clone()
            .or_else(|| value_as_string(location_ref))
            .map(|name| derive_location_code(&name))
            .unwrap_or_default();
        let available = coerce_number(record.get("available"), 0.0);

        Ok(UnifiedInventory {
            sku: value_as_string(record.get("sku"))
                .or_else(|| value_as_string(item_ref))
                .unwrap_or_default(),
            warehouse_code,
            warehouse_name,
            quantity_on_hand: optional_number(record.get("on_hand")).unwrap_or(available),
            quantity_available: available,
            quantity_committed: coerce_number(record.get("committed"), 0.0),
            quantity_on_order: coerce_number(record.get("incoming"), 0.0),
            reorder_point: None,
            updated_at: parse_system_date(DISPLAY, record.get("updated_at"))
                .map_err(|e| with_record_context(&context, e))?,
            metadata: capture_metadata(&record, INVENTORY_FIELDS),
            id,
        })
    }

    fn transform_pricing(&self, record: &Value) -> CoreResult<UnifiedPricing> {
        let record = self.prepare(record);
        let product_ref = record
            .get("product_id")
            .filter(|v| !v.is_null())
            .or_else(|| record.get("sku"));
        let price_tier = value_as_string(record.get("price_tier"))
            .unwrap_or_else(|| DEFAULT_PRICE_TIER.to_string());
        let tier_value = Value::String(price_tier.clone());
        let id = build_composite_key(&[product_ref, Some(&tier_value)]);
        let context = format!("Shopify price {id}");

        Ok(UnifiedPricing {
            sku: value_as_string(record.get("sku"))
                .or_else(|| value_as_string(product_ref))
                .unwrap_or_default(),
            price: coerce_number(record.get("price"), 0.0),
            currency: value_as_string(record.get("currency"))
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            min_quantity: coerce_number(record.get("min_quantity"), 0.0),
            compare_at_price: optional_number(record.get("compare_at_price")),
            effective_date: parse_optional_system_date(DISPLAY, record.get("updated_at"))
                .map_err(|e| with_record_context(&context, e))?,
            metadata: capture_metadata(&record, PRICING_FIELDS),
            price_tier,
            id,
        })
    }

    fn transform_customer(&self, record: &Value) -> CoreResult<UnifiedCustomer> {
        let record = self.prepare(record);
        let external_id = require_string(&record, "id", "Shopify customer")?;
        let context = format!("Shopify customer {external_id}");
        let email = require_string(&record, "email", &context)?;

        let mut metadata = capture_metadata(&record, CUSTOMER_FIELDS);
        metadata.extend(flatten_metafields(record.get("metafields")));

        Ok(UnifiedCustomer {
            email: email.to_lowercase(),
            first_name: value_as_string(record.get("first_name")),
            last_name: value_as_string(record.get("last_name")),
            company_name: value_as_string(record.pointer("/default_address/company")),
            phone: value_as_string(record.get("phone")),
            status: value_as_string(record.get("state"))
                .map(|s| map_status(CUSTOMER_STATUS, &s))
                .unwrap_or_else(|| "active".to_string()),
            price_tier: None,
            created_at: parse_optional_system_date(DISPLAY, record.get("created_at"))
                .map_err(|e| with_record_context(&context, e))?,
            metadata,
            external_id,
        })
    }

    fn transform_sales_order(&self, record: &Value) -> CoreResult<UnifiedSalesOrder> {
        let record = self.prepare(record);
        let external_id = require_string(&record, "id", "Shopify order")?;
        let context = format!("Shopify order {external_id}");

        let lines: Vec<UnifiedOrderLine> = match record.get("line_items") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|line| {
                    let quantity = coerce_number(line.get("quantity"), 0.0);
                    let unit_price = coerce_number(line.get("price"), 0.0);
                    UnifiedOrderLine {
                        sku: value_as_string(line.get("sku"))
                            .or_else(|| value_as_string(line.get("variant_id")))
                            .unwrap_or_default(),
                        quantity,
                        unit_price,
                        line_total: quantity * unit_price,
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        let subtotal = optional_number(record.get("subtotal_price"))
            .unwrap_or_else(|| lines.iter().map(|l| l.line_total).sum());
        let tax_total = coerce_number(record.get("total_tax"), 0.0);

        Ok(UnifiedSalesOrder {
            order_number: value_as_string(record.get("name"))
                .or_else(|| value_as_string(record.get("order_number")))
                .unwrap_or_else(|| external_id.clone()),
            customer_id: value_as_string(record.pointer("/customer/id")),
            status: order_status(&record),
            order_date: parse_system_date(DISPLAY, record.get("created_at"))
                .map_err(|e| with_record_context(&context, e))?,
            currency: value_as_string(record.get("currency"))
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            total: optional_number(record.get("total_price")).unwrap_or(subtotal + tax_total),
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
                    FieldMapping::new("id", "external_id").with_transform(TransformTag::ToString),
                    FieldMapping::new("variants[0].sku", "sku").required(),
                    FieldMapping::new("title", "name"),
                    FieldMapping::new("body_html", "description"),
                    FieldMapping::new("variants[0].price", "price")
                        .with_transform(TransformTag::ToNumber),
                    FieldMapping::new("variants[0].weight", "weight")
                        .with_transform(TransformTag::ToNumber),
                    FieldMapping::new("product_type", "category"),
                    FieldMapping::new("status", "status").with_default(json!("active")),
                ],
            ),
            mapping(
                EntityKind::Inventory,
                vec![
                    FieldMapping::new("sku", "sku").required(),
                    FieldMapping::new("location_name", "warehouse_name"),
                    FieldMapping::new("available", "quantity_available")
                        .with_transform(TransformTag::ToInteger)
                        .with_default(json!(0)),
                ],
            ),
            mapping(
                EntityKind::Pricing,
                vec![
                    FieldMapping::new("sku", "sku").required(),
                    FieldMapping::new("price", "price").with_transform(TransformTag::ToNumber),
                    FieldMapping::new("compare_at_price", "compare_at_price")
                        .with_transform(TransformTag::ToNumber),
                    FieldMapping::new("currency", "currency"),
                ],
            ),
            mapping(
                EntityKind::Customers,
                vec![
                    FieldMapping::new("email", "email")
                        .required()
                        .with_transform(TransformTag::Lowercase),
                    FieldMapping::new("first_name", "first_name"),
                    FieldMapping::new("last_name", "last_name"),
                    FieldMapping::new("phone", "phone"),
                    FieldMapping::new("default_address.company", "company_name"),
                ],
            ),
            mapping(
                EntityKind::Orders,
                vec![
                    FieldMapping::new("name", "order_number").required(),
                    FieldMapping::new("customer.id", "customer_id")
                        .with_transform(TransformTag::ToString),
                    FieldMapping::new("currency", "currency"),
                    FieldMapping::new("subtotal_price", "subtotal")
                        .with_transform(TransformTag::ToNumber),
                    FieldMapping::new("total_tax", "tax_total")
                        .with_transform(TransformTag::ToNumber),
                    FieldMapping::new("total_price", "total").with_transform(TransformTag::ToNumber),
                ],
            ),
        ]
    }
}

/// Cancellation wins, then fulfillment, then payment state.
fn order_status(record: &Value) -> String {
    if record.get("cancelled_at").is_some_and(|v| !v.is_null()) {
        return "cancelled".to_string();
    }
    value_as_string(record.get("fulfillment_status"))
        .or_else(|| value_as_string(record.get("financial_status")))
        .map(|s| map_status(ORDER_STATUS, &s))
        .unwrap_or_else(|| "pending".to_string())
}

/// Flatten `[{namespace, key, value}]` into `{"namespace.key": value}`.
fn flatten_metafields(metafields: Option<&Value>) -> Map<String, Value> {
    let Some(Value::Array(items)) = metafields else {
        return Map::new();
    };
    items
        .iter()
        .filter_map(|field| {
            let key = value_as_string(field.get("key"))?;
            let namespace =
                value_as_string(field.get("namespace")).unwrap_or_else(|| "global".to_string());
            let value = field.get("value").cloned().unwrap_or(Value::Null);
            Some((format!("{namespace}.{key}"), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::mapping::MappingRegistry;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn transformer() -> ShopifyTransformer {
        ShopifyTransformer::default()
    }

    #[test]
    fn product_reads_first_variant_and_flattens_metafields() {
        let product = transformer()
            .transform_product(&json!({
                "id": 632910392,
                "title": "IPod Nano",
                "product_type": "Cult Products",
                "status": "draft",
                "vendor": "Apple",
                "variants": [{"sku": "IPOD-8GB", "price": "199.00", "grams": 567}],
                "metafields": [
                    {"namespace": "custom", "key": "dimensions", "value": "4x2x0.5"},
                    {"namespace": "seo", "key": "hidden", "value": 1}
                ],
                "updated_at": "2024-05-01T10:00:00-04:00"
            }))
            .unwrap();

        assert_eq!(product.external_id, "632910392");
        assert_eq!(product.sku, "IPOD-8GB");
        assert_eq!(product.price, Some(199.0));
        assert_eq!(product.weight, Some(0.567));
        assert_eq!(product.dimensions.as_deref(), Some("4 x 2 x 0.5"));
        assert_eq!(product.status, "draft");
        assert!(!product.is_active);
        assert_eq!(product.updated_at, "2024-05-01T14:00:00.000Z");
        assert_eq!(product.metadata["vendor"], "Apple");
        assert_eq!(product.metadata["seo.hidden"], 1);
    }

    #[test]
    fn product_date_errors_name_shopify() {
        let err = transformer()
            .transform_product(&json!({"id": 1, "updated_at": "yesterday"}))
            .unwrap_err();
        assert_matches!(err, CoreError::Transform(ref msg)
            if msg.contains("Invalid Shopify date format: \"yesterday\""));
    }

    #[test]
    fn inventory_level_uses_location_id_for_code_when_unnamed() {
        let inv = transformer()
            .transform_inventory(&json!({
                "inventory_item_id": 808950810,
                "location_id": 905684977,
                "available": 6,
                "updated_at": "2024-05-01"
            }))
            .unwrap();
        assert_eq!(inv.id, "808950810_905684977");
        assert_eq!(inv.warehouse_code, "905684977");
        assert_eq!(inv.quantity_on_hand, 6.0);
    }

    #[test]
    fn order_status_precedence() {
        let base = json!({
            "id": 450789469,
            "name": "#1001",
            "created_at": "2024-05-02T00:00:00Z",
            "financial_status": "paid",
            "line_items": [{"sku": "IPOD-8GB", "quantity": 2, "price": "199.00"}]
        });
        let order = transformer().transform_sales_order(&base).unwrap();
        assert_eq!(order.status, "processing");
        assert_eq!(order.order_number, "#1001");
        assert_eq!(order.total, 398.0);

        let mut fulfilled = base.clone();
        fulfilled["fulfillment_status"] = json!("fulfilled");
        assert_eq!(transformer().transform_sales_order(&fulfilled).unwrap().status, "shipped");

        let mut cancelled = fulfilled.clone();
        cancelled["cancelled_at"] = json!("2024-05-03T00:00:00Z");
        assert_eq!(transformer().transform_sales_order(&cancelled).unwrap().status, "cancelled");
    }

    #[test]
    fn customer_state_vocabulary() {
        let customer = transformer()
            .transform_customer(&json!({
                "id": 207119551,
                "email": "Bob.Norman@Example.com",
                "state": "disabled",
                "default_address": {"company": "Acme"}
            }))
            .unwrap();
        assert_eq!(customer.email, "bob.norman@example.com");
        assert_eq!(customer.status, "inactive");
        assert_eq!(customer.company_name.as_deref(), Some("Acme"));
    }

    #[test]
    fn reverse_product_mapping_writes_variant_array() {
        let registry = MappingRegistry::new();
        for mapping in transformer().field_mappings() {
            registry.define_mapping(mapping).unwrap();
        }
        let out = registry
            .transform(
                CANONICAL_SCHEMA,
                SYSTEM,
                "products",
                &json!({"sku": "IPOD-8GB", "price": 199.0, "name": "IPod Nano"}),
            )
            .unwrap();
        assert_eq!(
            out,
            json!({"title": "IPod Nano", "variants": [{"sku": "IPOD-8GB", "price": 199.0}]})
        );
    }
}
