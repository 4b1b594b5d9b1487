//! Schema mapping layer: a path evaluator plus an owned registry of
//! field-level mappings between external schemas and the canonical schema.

pub mod path;
pub mod registry;

pub use path::{FieldPath, PathSegment};
pub use registry::{
    DefaultValue, FieldMapping, FieldMappingConfig, FieldTransform, MappingRegistry,
    MappingValidation, SchemaMapping, SchemaMappingConfig, TransformTag, CANONICAL_SCHEMA,
};
