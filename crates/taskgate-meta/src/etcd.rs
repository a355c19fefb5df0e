use std::sync::Arc;

use anyhow::Result;
use etcd_client::{Client, Compare, CompareOp, Txn, TxnOp};
use tokio::sync::Mutex;

use crate::types::{StatusRecord, StatusStore, UpdateOutcome};

const KEY_PREFIX: &str = "/status/";

#[derive(Clone)]
pub struct EtcdStatusStore {
    client: Arc<Mutex<Client>>,
}

impl EtcdStatusStore {
    pub async fn connect(endpoints: &[String]) -> Result<Self> {
        let c = Client::connect(endpoints, None).await?;
        Ok(Self {
            client: Arc::new(Mutex::new(c)),
        })
    }

    fn key(id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }

    /// Returns `Ok(false)` when the condition did not hold.
    async fn try_update(&self, id: &str, new_status: &str, receive_unix_nano: i64) -> Result<bool> {
        let key = Self::key(id);
        let value = serde_json::to_vec(&StatusRecord {
            status: new_status.to_string(),
            receive_unix_nano,
        })?;

        let mut cli = self.client.lock().await;

        // absent: version == 0; pending: pin the revision we inspected.
        let cmp = match cli.get(key.as_str(), None).await?.kvs().first() {
            None => Compare::version(key.as_str(), CompareOp::Equal, 0),
            Some(kv) => {
                let current: StatusRecord = match serde_json::from_slice(kv.value()) {
                    Ok(r) => r,
                    Err(_) => return Ok(false),
                };
                if !current.accepts_update() {
                    return Ok(false);
                }
                Compare::mod_revision(key.as_str(), CompareOp::Equal, kv.mod_revision())
            }
        };

        let put = TxnOp::put(key.as_str(), value, None);
        let txn = Txn::new().when([cmp]).and_then([put]);
        let resp = cli.txn(txn).await?;
        Ok(resp.succeeded())
    }
}

#[async_trait::async_trait]
impl StatusStore for EtcdStatusStore {
    async fn update_if_absent_or_pending(
        &self,
        id: &str,
        new_status: &str,
        receive_unix_nano: i64,
    ) -> UpdateOutcome {
        match self.try_update(id, new_status, receive_unix_nano).await {
            Ok(true) => UpdateOutcome::Applied,
            Ok(false) => UpdateOutcome::ConditionFailed,
            Err(e) => UpdateOutcome::Failed(e.to_string()),
        }
    }
}
