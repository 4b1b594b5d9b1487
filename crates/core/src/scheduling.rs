//! Sync job vocabularies, priority derivation and the job status state
//! machine.
//!
//! Lives in `core` so the repository layer, the orchestrator and the worker
//! share one definition of what a valid sync job looks like.

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::error::{CoreError, CoreResult};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Queue priority for `low` jobs.
pub const PRIORITY_LOW: i32 = 20;

/// Queue priority for `medium` jobs. Default.
pub const PRIORITY_MEDIUM: i32 = 50;

/// Queue priority for `high` jobs. Dequeued before all others.
pub const PRIORITY_HIGH: i32 = 80;

/// Caller-facing priority label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl SyncPriority {
    /// Numeric queue priority; higher is dequeued first.
    pub fn queue_priority(self) -> i32 {
        match self {
            Self::Low => PRIORITY_LOW,
            Self::Medium => PRIORITY_MEDIUM,
            Self::High => PRIORITY_HIGH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(CoreError::Validation(format!(
                "Unknown priority '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Job configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    #[default]
    Full,
    Incremental,
    Manual,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            "manual" => Ok(Self::Manual),
            other => Err(CoreError::Validation(format!("Unknown job type '{other}'"))),
        }
    }
}

/// Direction of a sync relative to the external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Pull,
    Push,
    Bidirectional,
}

impl SyncMode {
    pub fn pulls(self) -> bool {
        matches!(self, Self::Pull | Self::Bidirectional)
    }

    pub fn pushes(self) -> bool {
        matches!(self, Self::Push | Self::Bidirectional)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Bidirectional => "bidirectional",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "pull" => Ok(Self::Pull),
            "push" => Ok(Self::Push),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(CoreError::Validation(format!("Unknown sync mode '{other}'"))),
        }
    }
}

pub const MIN_BATCH_SIZE: i32 = 1;
pub const MAX_BATCH_SIZE: i32 = 10_000;
pub const DEFAULT_BATCH_SIZE: i32 = 100;

fn default_batch_size() -> i32 {
    DEFAULT_BATCH_SIZE
}

/// Request to create a sync job, as submitted by a caller.
///
/// Entity types stay strings here so an unknown name surfaces as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobConfig {
    pub integration_id: DbId,
    #[serde(default)]
    pub job_type: JobType,
    pub entity_types: Vec<String>,
    #[serde(default)]
    pub sync_mode: SyncMode,
    #[serde(default = "default_batch_size")]
    pub batch_size: i32,
    #[serde(default)]
    pub priority: SyncPriority,
}

impl SyncJobConfig {
    /// Check the configuration and return the parsed, de-duplicated entity
    /// types in request order.
    pub fn validate(&self) -> CoreResult<Vec<EntityKind>> {
        if self.entity_types.is_empty() {
            return Err(CoreError::Validation(
                "At least one entity type is required".to_string(),
            ));
        }
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(CoreError::Validation(format!(
                "Batch size must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }

        let mut kinds = Vec::with_capacity(self.entity_types.len());
        for raw in &self.entity_types {
            let kind: EntityKind = raw.parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Sync job status IDs matching `sync_job_statuses` seed data.
pub mod state_machine {
    pub const PENDING: i16 = 1;
    pub const QUEUED: i16 = 2;
    pub const RUNNING: i16 = 3;
    pub const COMPLETED: i16 = 4;
    pub const FAILED: i16 = 5;
    pub const CANCELLED: i16 = 6;

    /// Terminal statuses; a job in one of these is never reused.
    pub const TERMINAL: &[i16] = &[COMPLETED, FAILED, CANCELLED];

    /// Status IDs reachable from `from_status`.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            PENDING => &[QUEUED, CANCELLED],
            QUEUED => &[RUNNING, CANCELLED],
            RUNNING => &[COMPLETED, FAILED, CANCELLED],
            _ => &[],
        }
    }

    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    pub fn is_terminal(status: i16) -> bool {
        TERMINAL.contains(&status)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!(
                "Invalid transition: {} ({from}) -> {} ({to})",
                status_name(from),
                status_name(to)
            ))
        }
    }

    pub fn status_name(id: i16) -> &'static str {
        match id {
            PENDING => "pending",
            QUEUED => "queued",
            RUNNING => "running",
            COMPLETED => "completed",
            FAILED => "failed",
            CANCELLED => "cancelled",
            _ => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::state_machine::*;
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn config(entity_types: &[&str], batch_size: i32) -> SyncJobConfig {
        SyncJobConfig {
            integration_id: 1,
            job_type: JobType::Full,
            entity_types: entity_types.iter().map(|s| s.to_string()).collect(),
            sync_mode: SyncMode::Pull,
            batch_size,
            priority: SyncPriority::Medium,
        }
    }

    #[test]
    fn priorities_map_to_queue_values() {
        assert_eq!(SyncPriority::Low.queue_priority(), 20);
        assert_eq!(SyncPriority::Medium.queue_priority(), 50);
        assert_eq!(SyncPriority::High.queue_priority(), 80);
        assert!(SyncPriority::High.queue_priority() > SyncPriority::Low.queue_priority());
    }

    #[test]
    fn config_defaults_from_json() {
        let cfg: SyncJobConfig = serde_json::from_value(json!({
            "integration_id": 3,
            "entity_types": ["products"]
        }))
        .unwrap();
        assert_eq!(cfg.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.priority, SyncPriority::Medium);
        assert_eq!(cfg.sync_mode, SyncMode::Pull);
        assert_eq!(cfg.job_type, JobType::Full);
    }

    #[test]
    fn empty_entity_types_rejected() {
        assert_matches!(config(&[], 100).validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn batch_size_bounds() {
        assert!(config(&["products"], 1).validate().is_ok());
        assert!(config(&["products"], 10_000).validate().is_ok());
        assert_matches!(
            config(&["products"], 0).validate(),
            Err(CoreError::Validation(msg)) if msg.contains("Batch size")
        );
        assert!(config(&["products"], 10_001).validate().is_err());
    }

    #[test]
    fn unknown_entity_type_rejected_and_duplicates_collapsed() {
        assert!(config(&["widgets"], 10).validate().is_err());
        let kinds = config(&["orders", "products", "orders"], 10).validate().unwrap();
        assert_eq!(kinds, vec![EntityKind::Orders, EntityKind::Products]);
    }

    #[test]
    fn lifecycle_is_monotonic() {
        assert!(can_transition(PENDING, QUEUED));
        assert!(can_transition(QUEUED, RUNNING));
        assert!(can_transition(RUNNING, COMPLETED));
        assert!(can_transition(RUNNING, FAILED));
        assert!(!can_transition(RUNNING, QUEUED));
        assert!(!can_transition(QUEUED, PENDING));
    }

    #[test]
    fn early_states_may_cancel() {
        assert!(can_transition(PENDING, CANCELLED));
        assert!(can_transition(QUEUED, CANCELLED));
        assert!(can_transition(RUNNING, CANCELLED));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in [COMPLETED, FAILED, CANCELLED] {
            assert!(is_terminal(status));
            assert!(valid_transitions(status).is_empty());
        }
        let err = validate_transition(COMPLETED, RUNNING).unwrap_err();
        assert_eq!(err, "Invalid transition: completed (4) -> running (3)");
    }

    #[test]
    fn sync_mode_directions() {
        assert!(SyncMode::Pull.pulls() && !SyncMode::Pull.pushes());
        assert!(SyncMode::Push.pushes() && !SyncMode::Push.pulls());
        assert!(SyncMode::Bidirectional.pulls() && SyncMode::Bidirectional.pushes());
    }
}
