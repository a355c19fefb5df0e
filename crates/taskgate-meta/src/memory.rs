use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::RwLock;

use crate::types::{StatusRecord, StatusStore, UpdateOutcome};

#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, StatusRecord>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional write, used to seed records.
    pub async fn put(&self, id: &str, record: StatusRecord) {
        self.inner.write().await.records.insert(id.to_string(), record);
    }

    pub async fn get(&self, id: &str) -> Option<StatusRecord> {
        let inner = self.inner.read().await;
        inner.records.get(id).cloned()
    }
}

#[async_trait::async_trait]
impl StatusStore for MemoryStatusStore {
    async fn update_if_absent_or_pending(
        &self,
        id: &str,
        new_status: &str,
        receive_unix_nano: i64,
    ) -> UpdateOutcome {
        let mut inner = self.inner.write().await;
        if let Some(current) = inner.records.get(id) {
            if !current.accepts_update() {
                return UpdateOutcome::ConditionFailed;
            }
        }
        let record = StatusRecord {
            status: new_status.to_string(),
            receive_unix_nano,
        };
        inner.records.insert(id.to_string(), record);
        UpdateOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{STATUS_PENDING, STATUS_PROCESSING};

    #[tokio::test]
    async fn test_update_absent_record() {
        let store = MemoryStatusStore::new();
        let out = store
            .update_if_absent_or_pending("a", STATUS_PROCESSING, 99)
            .await;
        assert_eq!(out, UpdateOutcome::Applied);
        let rec = store.get("a").await.unwrap();
        assert_eq!(rec.status, STATUS_PROCESSING);
        assert_eq!(rec.receive_unix_nano, 99);
    }

    #[tokio::test]
    async fn test_update_pending_record() {
        let store = MemoryStatusStore::new();
        store
            .put(
                "a",
                StatusRecord {
                    status: STATUS_PENDING.to_string(),
                    receive_unix_nano: 0,
                },
            )
            .await;
        let out = store.update_if_absent_or_pending("a", STATUS_PROCESSING, 5).await;
        assert!(out.is_applied());
    }

    #[tokio::test]
    async fn test_seeded_finished_record_is_kept() {
        let store = MemoryStatusStore::new();
        let done = StatusRecord {
            status: "done".to_string(),
            receive_unix_nano: 7,
        };
        store.put("a", done.clone()).await;
        let out = store.update_if_absent_or_pending("a", STATUS_PROCESSING, 9).await;
        assert_eq!(out, UpdateOutcome::ConditionFailed);
        assert_eq!(store.get("a").await, Some(done));
    }

    #[tokio::test]
    async fn test_second_delivery_loses_race() {
        let store = MemoryStatusStore::new();
        assert!(store
            .update_if_absent_or_pending("a", STATUS_PROCESSING, 1)
            .await
            .is_applied());
        let out = store.update_if_absent_or_pending("a", STATUS_PROCESSING, 2).await;
        assert_eq!(out, UpdateOutcome::ConditionFailed);
        assert_eq!(store.get("a").await.unwrap().receive_unix_nano, 1);
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_apply_once() {
        let store = MemoryStatusStore::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                s.update_if_absent_or_pending("same", STATUS_PROCESSING, i).await
            }));
        }
        let mut applied = 0;
        for h in handles {
            if h.await.unwrap().is_applied() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }
}
