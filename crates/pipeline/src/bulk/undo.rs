//! Undo log for bulk operations.
//!
//! Every mutating row leaves one [`UndoEntry`] holding the canonical data it
//! replaced. The log is persisted as a JSON array in
//! `bulk_operations.undo_data` so a finished operation can be reverted later.
//!
//! Chunks run concurrently, so row order is not application order; entries
//! are reverted by `sequence`, the order their writes reached the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use syncbridge_core::bulk::RecordAction;
use syncbridge_core::error::{CoreError, CoreResult};
use syncbridge_core::types::DbId;

use crate::store::CanonicalStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    /// Position in the order writes were applied.
    #[serde(default)]
    pub sequence: u64,
    pub record_index: i32,
    pub entity_type: String,
    pub record_key: String,
    pub action: RecordAction,
    /// Canonical data before the row was applied; `None` for creates.
    pub previous: Option<Value>,
}

impl UndoEntry {
    /// Apply the inverse of this entry's action.
    ///
    /// Restore the previous data when there was any, otherwise delete what
    /// the row created.
    pub async fn revert(&self, canonical: &dyn CanonicalStore, tenant_id: DbId) -> CoreResult<()> {
        match (self.action, &self.previous) {
            (RecordAction::Export, _) => Ok(()),
            (_, Some(previous)) => {
                canonical
                    .upsert(tenant_id, &self.entity_type, &self.record_key, previous)
                    .await?;
                Ok(())
            }
            (RecordAction::Create | RecordAction::Update, None) => {
                canonical
                    .delete(tenant_id, &self.entity_type, &self.record_key)
                    .await?;
                Ok(())
            }
            (RecordAction::Delete, None) => Err(CoreError::Rollback(format!(
                "No previous data to restore for {} '{}'",
                self.entity_type, self.record_key
            ))),
        }
    }
}

/// Sort entries so the most recently applied write is reverted first.
pub fn reverse_order(entries: &mut [UndoEntry]) {
    entries.sort_by(|a, b| {
        b.sequence
            .cmp(&a.sequence)
            .then_with(|| b.record_index.cmp(&a.record_index))
    });
}

/// Revert `entries` in the order given. Failures are collected so one bad
/// entry does not stop the rest.
pub async fn revert_all(
    canonical: &dyn CanonicalStore,
    tenant_id: DbId,
    entries: &[UndoEntry],
) -> Vec<CoreError> {
    let mut errors = Vec::new();
    for entry in entries {
        if let Err(e) = entry.revert(canonical, tenant_id).await {
            tracing::error!(
                record_index = entry.record_index,
                record_key = %entry.record_key,
                error = %e,
                "Failed to revert bulk record",
            );
            errors.push(CoreError::Rollback(format!(
                "Record {}: {e}",
                entry.record_index
            )));
        }
    }
    errors
}

pub fn encode(entries: &[UndoEntry]) -> CoreResult<Value> {
    serde_json::to_value(entries)
        .map_err(|e| CoreError::Internal(format!("Failed to encode undo data: {e}")))
}

pub fn decode(undo_data: &Value) -> CoreResult<Vec<UndoEntry>> {
    if undo_data.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(undo_data.clone())
        .map_err(|e| CoreError::Internal(format!("Corrupt undo data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStores;
    use serde_json::json;

    fn entry(index: i32, action: RecordAction, previous: Option<Value>) -> UndoEntry {
        UndoEntry {
            sequence: u64::try_from(index).unwrap(),
            record_index: index,
            entity_type: "products".into(),
            record_key: "A".into(),
            action,
            previous,
        }
    }

    #[tokio::test]
    async fn create_is_reverted_by_delete() {
        let store = MemoryStores::new();
        store.upsert(1, "products", "A", &json!({"sku": "A"})).await.unwrap();

        entry(1, RecordAction::Create, None).revert(&store, 1).await.unwrap();

        assert!(store.get(1, "products", "A").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_reverted_by_restore() {
        let store = MemoryStores::new();
        let previous = json!({"sku": "A", "price": 3.0});

        entry(1, RecordAction::Delete, Some(previous.clone()))
            .revert(&store, 1)
            .await
            .unwrap();

        assert_eq!(store.get(1, "products", "A").await.unwrap(), Some(previous));
    }

    #[tokio::test]
    async fn stacked_updates_restore_oldest_value() {
        let store = MemoryStores::new();
        store.upsert(1, "products", "A", &json!({"v": 3})).await.unwrap();
        let mut entries = vec![
            entry(1, RecordAction::Update, Some(json!({"v": 1}))),
            entry(2, RecordAction::Update, Some(json!({"v": 2}))),
        ];
        reverse_order(&mut entries);

        let errors = revert_all(&store, 1, &entries).await;

        assert!(errors.is_empty());
        assert_eq!(store.get(1, "products", "A").await.unwrap(), Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn application_order_beats_row_order() {
        let store = MemoryStores::new();
        store.upsert(1, "products", "A", &json!({"v": "first"})).await.unwrap();
        // Row 2 reached the store before row 1.
        let mut later_row = entry(2, RecordAction::Create, None);
        later_row.sequence = 1;
        let mut earlier_row = entry(1, RecordAction::Update, Some(json!({"v": "second"})));
        earlier_row.sequence = 2;
        let mut entries = vec![later_row, earlier_row];
        reverse_order(&mut entries);

        assert_eq!(entries[0].record_index, 1);
        assert!(revert_all(&store, 1, &entries).await.is_empty());
        assert!(store.get(1, "products", "A").await.unwrap().is_none());
    }

    #[test]
    fn null_undo_data_decodes_empty() {
        assert!(decode(&Value::Null).unwrap().is_empty());
        let encoded = encode(&[entry(4, RecordAction::Create, None)]).unwrap();
        assert_eq!(encoded[0]["action"], "create");
        assert!(decode(&json!({"not": "a list"})).is_err());
    }
}
