//! Per-system transformers converting external record shapes into the
//! canonical shape.
//!
//! Each transformer is pure: no I/O, no shared state beyond its options.
//! Tenant-specific field names are handled with a rename table rather than a
//! code fork, see [`TransformerOptions`].

pub mod common;
pub mod netsuite;
pub mod records;
pub mod shopify;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityKind;
use crate::error::{CoreError, CoreResult};
use crate::mapping::{MappingRegistry, SchemaMapping};

pub use common::{
    build_composite_key, derive_location_code, normalize_dimensions, parse_system_date,
    validate_record,
};
pub use netsuite::NetSuiteTransformer;
pub use records::{
    UnifiedCustomer, UnifiedInventory, UnifiedOrderLine, UnifiedPricing, UnifiedProduct,
    UnifiedSalesOrder,
};
pub use shopify::ShopifyTransformer;

/// Construction options shared by every transformer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformerOptions {
    /// External field name → field name the fixed logic reads.
    #[serde(default)]
    pub field_renames: HashMap<String, String>,
}

/// Converts one external system's records into canonical records.
pub trait SystemTransformer: Send + Sync {
    /// Lower-case system identifier stored on integrations, e.g. `netsuite`.
    fn system(&self) -> &'static str;

    /// Human-readable system name used in error messages.
    fn display_name(&self) -> &'static str;

    fn transform_product(&self, record: &Value) -> CoreResult<UnifiedProduct>;
    fn transform_inventory(&self, record: &Value) -> CoreResult<UnifiedInventory>;
    fn transform_pricing(&self, record: &Value) -> CoreResult<UnifiedPricing>;
    fn transform_customer(&self, record: &Value) -> CoreResult<UnifiedCustomer>;
    fn transform_sales_order(&self, record: &Value) -> CoreResult<UnifiedSalesOrder>;

    /// Base field mappings from this system to the canonical schema.
    ///
    /// Registering them gives the reverse (canonical → system) direction
    /// used when pushing records out.
    fn field_mappings(&self) -> Vec<SchemaMapping>;

    /// Transform and validate a record of any kind into canonical JSON.
    fn transform_entity(&self, kind: EntityKind, record: &Value) -> CoreResult<Value> {
        let label = format!("{} {}", self.display_name(), kind);
        match kind {
            EntityKind::Products => to_canonical(&label, &self.transform_product(record)?),
            EntityKind::Inventory => to_canonical(&label, &self.transform_inventory(record)?),
            EntityKind::Pricing => to_canonical(&label, &self.transform_pricing(record)?),
            EntityKind::Customers => to_canonical(&label, &self.transform_customer(record)?),
            EntityKind::Orders => to_canonical(&label, &self.transform_sales_order(record)?),
        }
    }
}

fn to_canonical<T>(label: &str, record: &T) -> CoreResult<Value>
where
    T: Serialize + validator::Validate,
{
    validate_record(label, record)?;
    serde_json::to_value(record)
        .map_err(|e| CoreError::Internal(format!("Failed to serialize {label}: {e}")))
}

/// Lookup of transformers by system identifier.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    transformers: HashMap<String, Arc<dyn SystemTransformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in NetSuite and Shopify transformers.
    pub fn with_defaults(options: &HashMap<String, TransformerOptions>) -> Self {
        let opts = |system: &str| options.get(system).cloned().unwrap_or_default();
        let mut registry = Self::new();
        registry.register(Arc::new(NetSuiteTransformer::new(opts(netsuite::SYSTEM))));
        registry.register(Arc::new(ShopifyTransformer::new(opts(shopify::SYSTEM))));
        registry
    }

    pub fn register(&mut self, transformer: Arc<dyn SystemTransformer>) {
        self.transformers
            .insert(transformer.system().to_string(), transformer);
    }

    pub fn get(&self, system: &str) -> Option<Arc<dyn SystemTransformer>> {
        self.transformers.get(system).cloned()
    }

    /// Register every transformer's base mappings into `mappings`.
    pub fn register_base_mappings(&self, mappings: &MappingRegistry) -> CoreResult<()> {
        for transformer in self.transformers.values() {
            for mapping in transformer.field_mappings() {
                mappings.define_mapping(mapping)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut systems: Vec<&String> = self.transformers.keys().collect();
        systems.sort();
        f.debug_struct("TransformerRegistry")
            .field("systems", &systems)
            .finish()
    }
}
