//! Conversion between external record shapes and canonical records.
//!
//! Pulling prefers the system's [`SystemTransformer`]; systems without one
//! fall back to a mapping registered for `(system → unified, entity)`.
//! Pushing always goes through the registered reverse mapping.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use syncbridge_core::entity::EntityKind;
use syncbridge_core::error::{CoreError, CoreResult};
use syncbridge_core::mapping::{MappingRegistry, CANONICAL_SCHEMA};
use syncbridge_core::transform::common::{apply_field_renames, value_as_string};
use syncbridge_core::transform::{SystemTransformer, TransformerRegistry};

pub struct Normalizer {
    transformers: TransformerRegistry,
    mappings: Arc<MappingRegistry>,
}

impl Normalizer {
    pub fn new(transformers: TransformerRegistry, mappings: Arc<MappingRegistry>) -> Self {
        Self {
            transformers,
            mappings,
        }
    }

    /// Built-in transformers with their base mappings registered into a
    /// fresh registry.
    pub fn with_defaults() -> CoreResult<Self> {
        let transformers = TransformerRegistry::with_defaults(&HashMap::new());
        let mappings = Arc::new(MappingRegistry::new());
        transformers.register_base_mappings(&mappings)?;
        Ok(Self::new(transformers, mappings))
    }

    pub fn mappings(&self) -> &Arc<MappingRegistry> {
        &self.mappings
    }

    pub fn transformer(&self, system: &str) -> Option<Arc<dyn SystemTransformer>> {
        self.transformers.get(system)
    }

    /// Convert one external record into its canonical form.
    ///
    /// `renames` are the integration's own field renames, applied before any
    /// other logic.
    pub fn to_canonical(
        &self,
        system: &str,
        kind: EntityKind,
        record: &Value,
        renames: &HashMap<String, String>,
    ) -> CoreResult<Value> {
        let record = apply_field_renames(record, renames);
        if let Some(transformer) = self.transformers.get(system) {
            return transformer.transform_entity(kind, &record);
        }
        if self.mappings.has_mapping(system, CANONICAL_SCHEMA, kind.as_str()) {
            return self
                .mappings
                .transform(system, CANONICAL_SCHEMA, kind.as_str(), &record);
        }
        Err(CoreError::Validation(format!(
            "No transformer or mapping for {system} {kind}"
        )))
    }

    /// Convert one canonical record into `system`'s shape.
    pub fn from_canonical(&self, system: &str, kind: EntityKind, record: &Value) -> CoreResult<Value> {
        self.mappings
            .transform(CANONICAL_SCHEMA, system, kind.as_str(), record)
    }
}

/// Canonical store key of a canonical record.
pub fn canonical_key(kind: EntityKind, record: &Value) -> CoreResult<String> {
    let field = kind.canonical_key_field();
    value_as_string(record.get(field)).ok_or_else(|| {
        CoreError::Validation(format!("Canonical {kind} record has no '{field}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use syncbridge_core::mapping::{FieldMapping, SchemaMapping};

    #[test]
    fn transformer_path_applies_integration_renames() {
        let normalizer = Normalizer::with_defaults().unwrap();
        let renames = HashMap::from([("custitem_code".to_string(), "itemId".to_string())]);
        let canonical = normalizer
            .to_canonical(
                "netsuite",
                EntityKind::Products,
                &json!({
                    "internalId": "42",
                    "custitem_code": "BOLT-1",
                    "displayName": "Bolt",
                    "lastModifiedDate": "2024-01-15T10:30:00Z"
                }),
                &renames,
            )
            .unwrap();
        assert_eq!(canonical["sku"], "BOLT-1");
        assert_eq!(canonical_key(EntityKind::Products, &canonical).unwrap(), "BOLT-1");
    }

    #[test]
    fn mapping_path_for_systems_without_transformer() {
        let normalizer = Normalizer::with_defaults().unwrap();
        normalizer
            .mappings()
            .define_mapping(SchemaMapping::new(
                "SAP",
                CANONICAL_SCHEMA,
                "products",
                vec![FieldMapping::new("MATERIAL", "sku").required()],
            ))
            .unwrap();

        let canonical = normalizer
            .to_canonical("SAP", EntityKind::Products, &json!({"MATERIAL": "M-1"}), &HashMap::new())
            .unwrap();
        assert_eq!(canonical, json!({"sku": "M-1"}));

        let back = normalizer
            .from_canonical("SAP", EntityKind::Products, &canonical)
            .unwrap();
        assert_eq!(back, json!({"MATERIAL": "M-1"}));
    }

    #[test]
    fn unknown_system_is_a_validation_error() {
        let normalizer = Normalizer::with_defaults().unwrap();
        assert_matches!(
            normalizer.to_canonical("sap", EntityKind::Orders, &json!({}), &HashMap::new()),
            Err(CoreError::Validation(m)) if m.contains("sap orders")
        );
    }

    #[test]
    fn push_shape_uses_reverse_base_mapping() {
        let normalizer = Normalizer::with_defaults().unwrap();
        let shaped = normalizer
            .from_canonical(
                "shopify",
                EntityKind::Products,
                &json!({"sku": "IPOD-8GB", "name": "IPod Nano", "price": 199.0}),
            )
            .unwrap();
        assert_eq!(shaped["variants"][0]["sku"], "IPOD-8GB");
        assert_eq!(shaped["title"], "IPod Nano");
    }

    #[test]
    fn composite_kinds_key_by_id() {
        let record = json!({"id": "808950810_905684977", "sku": "IPOD-8GB"});
        assert_eq!(
            canonical_key(EntityKind::Inventory, &record).unwrap(),
            "808950810_905684977"
        );
        assert!(canonical_key(EntityKind::Customers, &record).is_err());
    }
}
