//! Company branch domain: companies, permissions, forms and the created aggregate.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod form;
pub mod service;
pub mod store;

pub use form::{BranchForm, Form, OrderExtraForm};

/// Owning company of a branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: u64,
    pub client_id: String,
    pub name: String,
}

/// A single admin capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "company_branch.create")]
    CreateBranch,
    #[serde(rename = "company_branch.order_extra")]
    ManageOrderExtra,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Permission::CreateBranch => "company_branch.create",
            Permission::ManageOrderExtra => "company_branch.order_extra",
        };
        write!(f, "{}", name)
    }
}

/// Capabilities of the acting admin user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionSet {
    permissions: HashSet<Permission>,
}

impl PermissionSet {
    pub fn new<I: IntoIterator<Item = Permission>>(permissions: I) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

/// Order settings attached to a branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderExtra {
    pub contract_number: Option<String>,
    pub payment_deferral_days: u32,
    pub min_order_amount: f64,
    pub comment: Option<String>,
}

impl From<&OrderExtraForm> for OrderExtra {
    fn from(form: &OrderExtraForm) -> Self {
        Self {
            contract_number: form.contract_number.clone(),
            payment_deferral_days: form.payment_deferral_days,
            min_order_amount: form.min_order_amount,
            comment: form.comment.clone(),
        }
    }
}

/// A persisted company branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchAggregate {
    pub id: Uuid,
    pub company_id: u64,
    pub client_id: String,
    pub title: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub order_extra: Option<OrderExtra>,
}

impl BranchAggregate {
    /// Builds a new aggregate with a fresh id. Order extras are attached only
    /// when given.
    pub fn new(company: &Company, branch: &BranchForm, order_extra: Option<OrderExtra>) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id: company.id,
            client_id: company.client_id.clone(),
            title: branch.title.clone(),
            address: branch.address.clone(),
            phone: branch.phone.clone(),
            email: branch.email.clone(),
            order_extra,
        }
    }
}
