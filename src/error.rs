//! Error types of the branch store and the creation service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("branch '{title}' already exists for client {client_id}")]
    Conflict { client_id: String, title: String },

    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),

    #[error("invalid stored branch: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of a failed branch creation.
#[derive(Debug, Error)]
pub enum CreateBranchError {
    /// The service declined to create the branch without failing.
    #[error("branch was not created: {0}")]
    NotCreated(String),

    /// The store already holds a branch with the same client and title.
    #[error("duplicate branch '{title}' for client {client_id}")]
    Duplicate { client_id: String, title: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CreateBranchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { client_id, title } => {
                CreateBranchError::Duplicate { client_id, title }
            }
            other => CreateBranchError::Store(other),
        }
    }
}
