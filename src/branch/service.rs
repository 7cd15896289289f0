use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CreateBranchError, StoreResult};

use super::{
    store::BranchStore, BranchAggregate, BranchForm, Company, OrderExtra, OrderExtraForm,
    Permission, PermissionSet,
};

/// Lookup and write operations the create action delegates to.
#[async_trait]
pub trait CompanyBranchCreateService: Send + Sync {
    async fn find_by_client_id_and_title(
        &self,
        client_id: &str,
        title: &str,
    ) -> StoreResult<Option<BranchAggregate>>;

    async fn create_company_branch(
        &self,
        company: &Company,
        branch: &BranchForm,
        order_extra: &OrderExtraForm,
        permissions: &PermissionSet,
    ) -> Result<BranchAggregate, CreateBranchError>;
}

/// Creation service writing through a [`BranchStore`].
pub struct StoreBranchService {
    store: Arc<dyn BranchStore>,
}

impl StoreBranchService {
    pub fn new(store: Arc<dyn BranchStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CompanyBranchCreateService for StoreBranchService {
    async fn find_by_client_id_and_title(
        &self,
        client_id: &str,
        title: &str,
    ) -> StoreResult<Option<BranchAggregate>> {
        self.store
            .find_by_client_id_and_title(client_id, title)
            .await
    }

    async fn create_company_branch(
        &self,
        company: &Company,
        branch: &BranchForm,
        order_extra: &OrderExtraForm,
        permissions: &PermissionSet,
    ) -> Result<BranchAggregate, CreateBranchError> {
        if branch.title.trim().is_empty() {
            return Err(CreateBranchError::NotCreated(
                "branch title is empty".to_string(),
            ));
        }

        // order settings are only applied for users allowed to manage them
        let order_extra = if permissions.contains(Permission::ManageOrderExtra) {
            Some(OrderExtra::from(order_extra))
        } else {
            log::debug!(
                "Dropping order extra for client {}: missing {}",
                company.client_id,
                Permission::ManageOrderExtra
            );
            None
        };

        let aggregate = BranchAggregate::new(company, branch, order_extra);
        self.store.insert(aggregate.clone()).await?;

        log::info!(
            "Created branch {} '{}' for client {}",
            aggregate.id,
            aggregate.title,
            aggregate.client_id
        );
        Ok(aggregate)
    }
}
