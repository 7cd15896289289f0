use std::time::Duration;

use etcd_client::{Client, Compare, CompareOp, ConnectOptions, GetOptions, Txn, TxnOp};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};

use super::Etcd;

/// Lazily connected etcd client. A failed call drops the client so the next
/// call reconnects.
pub struct EtcdClientWrapper {
    config: Etcd,
    client: Mutex<Option<Client>>,
}

impl EtcdClientWrapper {
    pub fn new(config: Etcd) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    async fn create_client(&self) -> Result<Client, etcd_client::Error> {
        let mut options = ConnectOptions::default();
        if let Some(timeout) = self.config.timeout {
            options = options.with_timeout(Duration::from_secs(timeout as u64));
        };
        if let Some(connect_timeout) = self.config.connect_timeout {
            options = options.with_connect_timeout(Duration::from_secs(connect_timeout as u64));
        };
        if let (Some(user), Some(password)) = (&self.config.user, &self.config.password) {
            options = options.with_user(user.clone(), password.clone());
        };

        Client::connect(self.config.host.clone(), Some(options)).await
    }

    /// Returns a handle to the shared client, connecting first if needed.
    async fn client(&self) -> StoreResult<Client> {
        let mut client_guard = self.client.lock().await;

        if client_guard.is_none() {
            log::info!("Creating new etcd client...");
            *client_guard = Some(self.create_client().await?);
        }
        client_guard
            .clone()
            .ok_or_else(|| StoreError::Unavailable("etcd client is not initialized".to_string()))
    }

    async fn reset_on_error<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            log::warn!("etcd request failed, resetting client: {}", err);
            *self.client.lock().await = None;
        }
        result
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut client = self.client().await?;
        let result = client
            .get(key, None)
            .await
            .map(|resp| resp.kvs().first().map(|kv| kv.value().to_vec()))
            .map_err(StoreError::from);
        self.reset_on_error(result).await
    }

    pub async fn list(&self, prefix: &str) -> StoreResult<Vec<Vec<u8>>> {
        let mut client = self.client().await?;
        let result = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await
            .map(|resp| resp.kvs().iter().map(|kv| kv.value().to_vec()).collect())
            .map_err(StoreError::from);
        self.reset_on_error(result).await
    }

    /// Writes `value` only if `key` has never been created. Returns whether
    /// the write happened.
    pub async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> StoreResult<bool> {
        let mut client = self.client().await?;
        let txn = Txn::new()
            .when(vec![Compare::create_revision(key, CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(key, value, None)]);
        let result = client
            .txn(txn)
            .await
            .map(|resp| resp.succeeded())
            .map_err(StoreError::from);
        self.reset_on_error(result).await
    }
}

pub fn json_to_resource<T: DeserializeOwned>(value: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(value)?)
}
