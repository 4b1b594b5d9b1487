//! Bulk operation vocabulary, option validation, chunk planning and
//! per-row record shaping.
//!
//! Everything here is pure; the engine that applies rows lives in
//! `syncbridge-pipeline`.

pub mod csv_import;
pub mod report;

use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::ValidateEmail;

use crate::entity::EntityKind;
use crate::error::{CoreError, CoreResult};

pub use csv_import::{parse_upload, CsvRow, CsvUpload, ImportLimits, ParsedCsv};
pub use report::{
    escape_csv_field, export_file_name, render_csv, render_export, render_report, report_file_name,
    ReportRow, REPORT_HEADER,
};

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const MAX_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const MAX_CONCURRENT_CHUNKS: usize = 10;

/// Entity kinds accepted by bulk operations.
pub const BULK_ENTITY_TYPES: [EntityKind; 4] = [
    EntityKind::Products,
    EntityKind::Inventory,
    EntityKind::Pricing,
    EntityKind::Customers,
];

/// Error text for records reverted by rollback-on-error.
pub const ERROR_ROLLED_BACK: &str = "rolled back";

/// Error text for rows never applied because the operation aborted.
pub const ERROR_SKIPPED: &str = "skipped: operation aborted";

/// Error text for rows never applied because the operation was cancelled.
pub const ERROR_CANCELLED: &str = "cancelled";

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Import,
    Export,
    Update,
    Delete,
}

impl OperationType {
    pub const ALL: [OperationType; 4] = [Self::Import, Self::Export, Self::Update, Self::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Export => "export",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown operation type '{s}'")))
    }

    /// Whether existing records must be present for a row to apply.
    pub fn requires_existing(self) -> bool {
        !matches!(self, Self::Import)
    }
}

/// What was done (or attempted) for one input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Create,
    Update,
    Delete,
    Export,
}

impl RecordAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Export => "export",
        }
    }

    /// Action recorded for a row of `op` when the record does (not) exist.
    pub fn for_operation(op: OperationType, exists: bool) -> Self {
        match op {
            OperationType::Import if exists => Self::Update,
            OperationType::Import => Self::Create,
            OperationType::Update => Self::Update,
            OperationType::Delete => Self::Delete,
            OperationType::Export => Self::Export,
        }
    }

    /// Whether applying this action changes the canonical store.
    pub fn mutates(self) -> bool {
        !matches!(self, Self::Export)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Failed,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Bulk operation status IDs matching `bulk_operation_statuses` seed data.
pub mod status {
    pub const PENDING: i16 = 1;
    pub const PROCESSING: i16 = 2;
    pub const COMPLETED: i16 = 3;
    pub const PARTIAL: i16 = 4;
    pub const FAILED: i16 = 5;
    pub const CANCELLED: i16 = 6;
    pub const ROLLED_BACK: i16 = 7;

    pub fn valid_transitions(from: i16) -> &'static [i16] {
        match from {
            PENDING => &[PROCESSING, FAILED, CANCELLED],
            PROCESSING => &[COMPLETED, PARTIAL, FAILED, CANCELLED],
            COMPLETED | PARTIAL => &[ROLLED_BACK],
            _ => &[],
        }
    }

    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Whether the operation has stopped processing rows.
    pub fn is_finished(status: i16) -> bool {
        !matches!(status, PENDING | PROCESSING)
    }

    pub fn name(id: i16) -> &'static str {
        match id {
            PENDING => "pending",
            PROCESSING => "processing",
            COMPLETED => "completed",
            PARTIAL => "partial",
            FAILED => "failed",
            CANCELLED => "cancelled",
            ROLLED_BACK => "rolled_back",
            _ => "unknown",
        }
    }
}

/// Final status of a run that was not cancelled.
pub fn final_status(failed_records: usize, rolled_back: bool) -> i16 {
    if rolled_back {
        status::FAILED
    } else if failed_records == 0 {
        status::COMPLETED
    } else {
        status::PARTIAL
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options as submitted alongside an upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkOptions {
    pub operation_type: String,
    pub entity_type: String,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub validate_only: bool,
    #[serde(default)]
    pub rollback_on_error: bool,
}

/// Validated, defaulted options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkPlan {
    pub operation_type: OperationType,
    pub entity_type: EntityKind,
    pub chunk_size: usize,
    pub max_concurrent: usize,
    pub validate_only: bool,
    pub rollback_on_error: bool,
}

impl BulkOptions {
    pub fn validate(&self) -> CoreResult<BulkPlan> {
        let operation_type = OperationType::parse(&self.operation_type)?;
        let entity_type: EntityKind = self.entity_type.parse()?;
        if !BULK_ENTITY_TYPES.contains(&entity_type) {
            return Err(CoreError::Validation(format!(
                "Entity type '{entity_type}' is not supported for bulk operations"
            )));
        }

        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if !(1..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(CoreError::Validation(format!(
                "Chunk size must be between 1 and {MAX_CHUNK_SIZE}, got {chunk_size}"
            )));
        }

        let max_concurrent = self.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT);
        if !(1..=MAX_CONCURRENT_CHUNKS).contains(&max_concurrent) {
            return Err(CoreError::Validation(format!(
                "Max concurrent must be between 1 and {MAX_CONCURRENT_CHUNKS}, got {max_concurrent}"
            )));
        }

        Ok(BulkPlan {
            operation_type,
            entity_type,
            chunk_size,
            max_concurrent,
            validate_only: self.validate_only,
            rollback_on_error: self.rollback_on_error,
        })
    }
}

/// Split `total` rows into consecutive index ranges of at most `chunk_size`.
pub fn plan_chunks(total: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let size = chunk_size.max(1);
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}

// ---------------------------------------------------------------------------
// Row shaping
// ---------------------------------------------------------------------------

/// Columns parsed as numbers for each bulk entity kind.
pub fn numeric_columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Products => &["price", "cost", "weight"],
        EntityKind::Inventory => &[
            "quantity_on_hand",
            "quantity_available",
            "quantity_committed",
            "quantity_on_order",
            "reorder_point",
        ],
        EntityKind::Pricing => &["price", "min_quantity", "compare_at_price"],
        EntityKind::Customers | EntityKind::Orders => &[],
    }
}

/// Turn one CSV row into a canonical record payload.
///
/// Empty cells are omitted. Numeric columns must parse; customer emails must
/// be well formed. The row key is written to the kind's canonical key field,
/// so inventory and pricing records carry their composite `id`. For delete
/// and export only the key matters.
pub fn shape_row(kind: EntityKind, op: OperationType, row: &CsvRow) -> CoreResult<Value> {
    let key_field = kind.canonical_key_field();
    let Some(key) = row.key.as_deref() else {
        return Err(CoreError::Validation(format!(
            "Row {}: missing value for '{}'",
            row.index,
            kind.identity_fields().join("', '")
        )));
    };

    if kind == EntityKind::Customers && !key.validate_email() {
        return Err(CoreError::Validation(format!(
            "Row {}: invalid email '{key}'",
            row.index
        )));
    }

    let mut record = Map::new();
    record.insert(key_field.to_string(), Value::String(key.to_string()));
    if matches!(op, OperationType::Delete | OperationType::Export) {
        return Ok(Value::Object(record));
    }

    let numeric = numeric_columns(kind);
    for (column, raw) in &row.values {
        if column == key_field || raw.is_empty() {
            continue;
        }
        let value = if numeric.contains(&column.as_str()) {
            let parsed = raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(serde_json::Number::from_f64)
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Row {}: column '{column}' is not a number: \"{raw}\"",
                        row.index
                    ))
                })?;
            Value::Number(parsed)
        } else {
            Value::String(raw.clone())
        };
        record.insert(column.clone(), value);
    }
    Ok(Value::Object(record))
}
