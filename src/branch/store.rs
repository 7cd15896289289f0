//! Branch persistence.
//!
//! Stores key branches by `(client_id, title)` and refuse a second insert of
//! the same pair, so a duplicate that slips past the create action's lookup is
//! still rejected here.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    config::etcd::{json_to_resource, EtcdClientWrapper},
    error::{StoreError, StoreResult},
};

use super::BranchAggregate;

#[async_trait]
pub trait BranchStore: Send + Sync {
    async fn find_by_client_id_and_title(
        &self,
        client_id: &str,
        title: &str,
    ) -> StoreResult<Option<BranchAggregate>>;

    /// Inserts `branch`, failing with [`StoreError::Conflict`] when its
    /// client already has a branch with the same title.
    async fn insert(&self, branch: BranchAggregate) -> StoreResult<()>;

    /// All branches of a client, ordered by title.
    async fn list_by_client_id(&self, client_id: &str) -> StoreResult<Vec<BranchAggregate>>;
}

#[derive(Default)]
pub struct MemoryBranchStore {
    branches: DashMap<(String, String), BranchAggregate>,
}

impl MemoryBranchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BranchStore for MemoryBranchStore {
    async fn find_by_client_id_and_title(
        &self,
        client_id: &str,
        title: &str,
    ) -> StoreResult<Option<BranchAggregate>> {
        Ok(self
            .branches
            .get(&(client_id.to_string(), title.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn insert(&self, branch: BranchAggregate) -> StoreResult<()> {
        match self
            .branches
            .entry((branch.client_id.clone(), branch.title.clone()))
        {
            Entry::Occupied(_) => Err(StoreError::Conflict {
                client_id: branch.client_id,
                title: branch.title,
            }),
            Entry::Vacant(entry) => {
                entry.insert(branch);
                Ok(())
            }
        }
    }

    async fn list_by_client_id(&self, client_id: &str) -> StoreResult<Vec<BranchAggregate>> {
        let mut branches: Vec<BranchAggregate> = self
            .branches
            .iter()
            .filter(|entry| entry.key().0 == client_id)
            .map(|entry| entry.value().clone())
            .collect();
        branches.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(branches)
    }
}

/// Branches stored as JSON under `{prefix}/branches/{client_id}/{title}`,
/// with client id and title base64url encoded.
pub struct EtcdBranchStore {
    etcd: EtcdClientWrapper,
}

impl EtcdBranchStore {
    pub fn new(etcd: EtcdClientWrapper) -> Self {
        Self { etcd }
    }

    // client ids are encoded too, so no client's prefix can cover another's keys
    fn client_prefix(&self, client_id: &str) -> String {
        format!(
            "{}/branches/{}/",
            self.etcd.prefix(),
            URL_SAFE_NO_PAD.encode(client_id.as_bytes())
        )
    }

    fn branch_key(&self, client_id: &str, title: &str) -> String {
        format!(
            "{}{}",
            self.client_prefix(client_id),
            URL_SAFE_NO_PAD.encode(title.as_bytes())
        )
    }
}

#[async_trait]
impl BranchStore for EtcdBranchStore {
    async fn find_by_client_id_and_title(
        &self,
        client_id: &str,
        title: &str,
    ) -> StoreResult<Option<BranchAggregate>> {
        match self.etcd.get(&self.branch_key(client_id, title)).await? {
            Some(value) => Ok(Some(json_to_resource(&value)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, branch: BranchAggregate) -> StoreResult<()> {
        let key = self.branch_key(&branch.client_id, &branch.title);
        let value = serde_json::to_vec(&branch)?;
        if self.etcd.put_if_absent(&key, value).await? {
            Ok(())
        } else {
            Err(StoreError::Conflict {
                client_id: branch.client_id,
                title: branch.title,
            })
        }
    }

    async fn list_by_client_id(&self, client_id: &str) -> StoreResult<Vec<BranchAggregate>> {
        let mut branches = self
            .etcd
            .list(&self.client_prefix(client_id))
            .await?
            .iter()
            .map(|value| json_to_resource::<BranchAggregate>(value))
            .collect::<StoreResult<Vec<_>>>()?;
        branches.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(branches)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::config::Etcd;

    fn branch(client_id: &str, title: &str) -> BranchAggregate {
        BranchAggregate {
            id: Uuid::new_v4(),
            company_id: 1,
            client_id: client_id.to_string(),
            title: title.to_string(),
            address: None,
            phone: None,
            email: None,
            order_extra: None,
        }
    }

    #[tokio::test]
    async fn test_memory_store_insert_and_find() {
        let store = MemoryBranchStore::new();
        let created = branch("c1", "Main Office");
        store.insert(created.clone()).await.unwrap();

        let found = store
            .find_by_client_id_and_title("c1", "Main Office")
            .await
            .unwrap();
        assert_eq!(found, Some(created));
        assert!(store
            .find_by_client_id_and_title("c2", "Main Office")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate() {
        let store = MemoryBranchStore::new();
        store.insert(branch("c1", "Main Office")).await.unwrap();

        let err = store.insert(branch("c1", "Main Office")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // same title under another client is fine
        store.insert(branch("c2", "Main Office")).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_list_sorted() {
        let store = MemoryBranchStore::new();
        store.insert(branch("c1", "Warehouse")).await.unwrap();
        store.insert(branch("c1", "Airport")).await.unwrap();
        store.insert(branch("c2", "Downtown")).await.unwrap();

        let titles: Vec<String> = store
            .list_by_client_id("c1")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["Airport", "Warehouse"]);
    }

    fn etcd_store() -> EtcdBranchStore {
        EtcdBranchStore::new(EtcdClientWrapper::new(Etcd {
            host: vec!["127.0.0.1:2379".to_string()],
            prefix: "/company-admin".to_string(),
            timeout: None,
            connect_timeout: None,
            user: None,
            password: None,
        }))
    }

    #[test]
    fn test_etcd_branch_key_encodes_title() {
        let store = etcd_store();
        let prefix = store.client_prefix("c1");
        assert_eq!(prefix, "/company-admin/branches/YzE/");

        let key = store.branch_key("c1", "North/South");
        assert!(key.starts_with(&prefix));
        assert!(!key[prefix.len()..].contains('/'));
    }

    #[test]
    fn test_etcd_client_prefixes_do_not_overlap() {
        let store = etcd_store();
        let key = store.branch_key("acme/eu", "Depot");
        assert!(!key.starts_with(&store.client_prefix("acme")));
        assert!(key.starts_with(&store.client_prefix("acme/eu")));
        assert!(!store.client_prefix("acme/eu")["/company-admin/branches/".len()..]
            .trim_end_matches('/')
            .contains('/'));
    }
}
