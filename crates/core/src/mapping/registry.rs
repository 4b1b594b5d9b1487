//! Schema mapping registry.
//!
//! Mappings are registered per `(source_system, target_system, entity)` and
//! applied field by field. Registering a mapping toward the canonical schema
//! also derives the reverse mapping by swapping field names.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::path::{FieldPath, MAX_INDEX};
use crate::error::{CoreError, CoreResult};

/// Name of the canonical schema every external system maps to and from.
pub const CANONICAL_SCHEMA: &str = "unified";

// ---------------------------------------------------------------------------
// Field-level building blocks
// ---------------------------------------------------------------------------

/// Fallback used when a field resolves to null or undefined.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    fn produce(&self) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Generator(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// Named value transforms that can be declared in configuration data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformTag {
    Trim,
    Uppercase,
    Lowercase,
    ToNumber,
    ToInteger,
    ToBoolean,
    ToString,
}

impl TransformTag {
    /// Apply the transform. Undefined input stays undefined; values the
    /// transform cannot interpret become undefined.
    pub fn apply(self, value: Option<Value>) -> Option<Value> {
        let value = value?;
        match self {
            Self::Trim => Some(map_str(value, |s| s.trim().to_string())),
            Self::Uppercase => Some(map_str(value, |s| s.to_uppercase())),
            Self::Lowercase => Some(map_str(value, |s| s.to_lowercase())),
            Self::ToNumber => match value {
                Value::Number(_) => Some(value),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number),
                Value::Bool(b) => Some(Value::from(u8::from(b))),
                _ => None,
            },
            Self::ToInteger => match &value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                    .map(Value::from),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| Value::from(f.trunc() as i64)),
                _ => None,
            },
            Self::ToBoolean => match value {
                Value::Bool(b) => Some(Value::Bool(b)),
                Value::Number(n) => Some(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "yes" | "y" | "1" | "t" => Some(Value::Bool(true)),
                    "false" | "no" | "n" | "0" | "f" | "" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            Self::ToString => match value {
                Value::String(_) => Some(value),
                Value::Null => Some(Value::Null),
                other => Some(Value::String(match other {
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    composite => composite.to_string(),
                })),
            },
        }
    }
}

fn map_str(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

/// Custom transform signature: receives the resolved value (or `None` when
/// undefined) and returns the transformed value.
pub type TransformFn = Arc<dyn Fn(Option<Value>) -> Option<Value> + Send + Sync>;

/// A per-field transform: either a declarative tag or custom code.
#[derive(Clone)]
pub enum FieldTransform {
    Tag(TransformTag),
    Custom(TransformFn),
}

impl FieldTransform {
    fn apply(&self, value: Option<Value>) -> Option<Value> {
        match self {
            Self::Tag(tag) => tag.apply(value),
            Self::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for FieldTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.debug_tuple("Tag").field(tag).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One source-path → target-path rule.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub source_path: FieldPath,
    pub target_path: FieldPath,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub transform: Option<FieldTransform>,
}

impl FieldMapping {
    pub fn new(source_path: &str, target_path: &str) -> Self {
        Self {
            source_path: FieldPath::parse(source_path),
            target_path: FieldPath::parse(target_path),
            required: false,
            default: None,
            transform: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Literal(value));
        self
    }

    pub fn with_default_fn(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Generator(Arc::new(f)));
        self
    }

    pub fn with_transform(mut self, tag: TransformTag) -> Self {
        self.transform = Some(FieldTransform::Tag(tag));
        self
    }

    pub fn with_transform_fn(
        mut self,
        f: impl Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(FieldTransform::Custom(Arc::new(f)));
        self
    }

    /// Resolve, transform and default the value for this field.
    fn resolve(&self, data: &Value) -> Option<Value> {
        let mut value = self.source_path.resolve(data).cloned();
        if let Some(transform) = &self.transform {
            value = transform.apply(value);
        }
        if value.as_ref().map_or(true, Value::is_null) {
            if let Some(default) = &self.default {
                value = Some(default.produce());
            }
        }
        value
    }

    fn missing_message(&self) -> String {
        format!("Required field {} is missing", self.target_path)
    }
}

/// Declarative form of a [`FieldMapping`], as stored in tenant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMappingConfig {
    pub source_path: String,
    pub target_path: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub transform: Option<TransformTag>,
}

impl From<FieldMappingConfig> for FieldMapping {
    fn from(config: FieldMappingConfig) -> Self {
        let mut mapping = FieldMapping::new(&config.source_path, &config.target_path);
        mapping.required = config.required;
        mapping.default = config.default.map(DefaultValue::Literal);
        mapping.transform = config.transform.map(FieldTransform::Tag);
        mapping
    }
}

// ---------------------------------------------------------------------------
// Schema mapping
// ---------------------------------------------------------------------------

/// All field rules converting one entity from one system to another.
#[derive(Debug, Clone)]
pub struct SchemaMapping {
    pub source_system: String,
    pub target_system: String,
    pub entity: String,
    pub mappings: Vec<FieldMapping>,
}

impl SchemaMapping {
    pub fn new(
        source_system: impl Into<String>,
        target_system: impl Into<String>,
        entity: impl Into<String>,
        mappings: Vec<FieldMapping>,
    ) -> Self {
        Self {
            source_system: source_system.into(),
            target_system: target_system.into(),
            entity: entity.into(),
            mappings,
        }
    }

    /// Derive the canonical → source mapping.
    ///
    /// Only field names are swapped: transforms, defaults and required flags
    /// of the forward direction are not carried over.
    pub fn reversed(&self) -> Self {
        Self {
            source_system: self.target_system.clone(),
            target_system: self.source_system.clone(),
            entity: self.entity.clone(),
            mappings: self
                .mappings
                .iter()
                .map(|m| FieldMapping::new(m.target_path.as_str(), m.source_path.as_str()))
                .collect(),
        }
    }

    fn key(&self) -> MappingKey {
        MappingKey::new(&self.source_system, &self.target_system, &self.entity)
    }

    fn check_paths(&self) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for mapping in &self.mappings {
            // Source paths become target paths in the reverse mapping.
            for path in [&mapping.source_path, &mapping.target_path] {
                if let Some(idx) = path.oversized_index() {
                    return Err(CoreError::Validation(format!(
                        "Index {idx} in path '{path}' exceeds the maximum of {MAX_INDEX}"
                    )));
                }
            }
            if !seen.insert(mapping.target_path.as_str()) {
                return Err(CoreError::Validation(format!(
                    "Duplicate target path '{}' in mapping {} -> {} ({})",
                    mapping.target_path, self.source_system, self.target_system, self.entity
                )));
            }
        }
        Ok(())
    }
}

/// Declarative form of a [`SchemaMapping`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMappingConfig {
    pub source_system: String,
    pub target_system: String,
    pub entity: String,
    pub mappings: Vec<FieldMappingConfig>,
}

impl From<SchemaMappingConfig> for SchemaMapping {
    fn from(config: SchemaMappingConfig) -> Self {
        SchemaMapping::new(
            config.source_system,
            config.target_system,
            config.entity,
            config.mappings.into_iter().map(FieldMapping::from).collect(),
        )
    }
}

/// Outcome of [`MappingRegistry::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct MappingKey {
    source: String,
    target: String,
    entity: String,
}

impl MappingKey {
    fn new(source: &str, target: &str, entity: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            entity: entity.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owned mapping store, shared via `Arc` by the components that need it.
///
/// Writes happen at configuration time; transforms only take read locks.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    mappings: RwLock<BTreeMap<MappingKey, SchemaMapping>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapping, replacing any previous mapping for the same
    /// `(source, target, entity)`.
    ///
    /// A mapping targeting [`CANONICAL_SCHEMA`] also registers its
    /// name-swapped reverse.
    pub fn define_mapping(&self, mapping: SchemaMapping) -> CoreResult<()> {
        mapping.check_paths()?;

        let reverse = (mapping.target_system == CANONICAL_SCHEMA).then(|| mapping.reversed());

        let mut guard = self.write();
        guard.insert(mapping.key(), mapping);
        if let Some(reverse) = reverse {
            guard.insert(reverse.key(), reverse);
        }
        Ok(())
    }

    pub fn has_mapping(&self, source: &str, target: &str, entity: &str) -> bool {
        self.read()
            .contains_key(&MappingKey::new(source, target, entity))
    }

    /// Convert one record from `source` to `target` shape.
    ///
    /// Fields resolving to null/undefined that are not required are left out
    /// of the output entirely.
    pub fn transform(
        &self,
        source: &str,
        target: &str,
        entity: &str,
        data: &Value,
    ) -> CoreResult<Value> {
        let guard = self.read();
        let mapping = lookup(&guard, source, target, entity)?;
        apply_mapping(mapping, data)
    }

    /// Eager, order-preserving [`transform`](Self::transform) over a slice.
    pub fn transform_array(
        &self,
        source: &str,
        target: &str,
        entity: &str,
        data: &[Value],
    ) -> CoreResult<Vec<Value>> {
        let guard = self.read();
        let mapping = lookup(&guard, source, target, entity)?;
        data.iter().map(|item| apply_mapping(mapping, item)).collect()
    }

    /// Non-failing dual of [`transform`](Self::transform): collects one
    /// message per required field that resolves to undefined.
    pub fn validate(
        &self,
        source: &str,
        target: &str,
        entity: &str,
        data: &Value,
    ) -> MappingValidation {
        let guard = self.read();
        let mapping = match lookup(&guard, source, target, entity) {
            Ok(m) => m,
            Err(e) => {
                return MappingValidation {
                    valid: false,
                    errors: vec![e.to_string()],
                }
            }
        };

        let errors: Vec<String> = mapping
            .mappings
            .iter()
            .filter(|m| m.required && m.resolve(data).is_none())
            .map(FieldMapping::missing_message)
            .collect();

        MappingValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Snapshot of every registered mapping, ordered by key.
    pub fn get_all_mappings(&self) -> Vec<SchemaMapping> {
        self.read().values().cloned().collect()
    }

    /// Drop every registered mapping.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<MappingKey, SchemaMapping>> {
        self.mappings.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<MappingKey, SchemaMapping>> {
        self.mappings.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn lookup<'a>(
    mappings: &'a BTreeMap<MappingKey, SchemaMapping>,
    source: &str,
    target: &str,
    entity: &str,
) -> CoreResult<&'a SchemaMapping> {
    mappings
        .get(&MappingKey::new(source, target, entity))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "No mapping registered for {source} -> {target} ({entity})"
            ))
        })
}

fn apply_mapping(mapping: &SchemaMapping, data: &Value) -> CoreResult<Value> {
    let mut out = Map::new();
    for field in &mapping.mappings {
        match field.resolve(data) {
            None if field.required => {
                return Err(CoreError::Validation(field.missing_message()));
            }
            Some(Value::Null) if !field.required => {}
            None => {}
            Some(value) => field.target_path.assign(&mut out, value),
        }
    }
    Ok(Value::Object(out))
}
