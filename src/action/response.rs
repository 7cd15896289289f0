use http::StatusCode;
use serde::{Serialize, Serializer};

use crate::{
    branch::{BranchAggregate, Form},
    message::Message,
};

/// Branches returned to the caller.
#[derive(Debug, Default, Serialize)]
pub struct CompanyBranchViewResponse {
    branches: Vec<BranchAggregate>,
}

impl CompanyBranchViewResponse {
    pub fn add_company_branch_aggregate(&mut self, aggregate: BranchAggregate) {
        self.branches.push(aggregate);
    }

    pub fn branches(&self) -> &[BranchAggregate] {
        &self.branches
    }
}

/// Response state filled by an admin action and serialized by the HTTP layer.
#[derive(Debug, Serialize)]
pub struct BaseResponse {
    #[serde(serialize_with = "serialize_status")]
    status: StatusCode,
    messages: Vec<Message>,
    #[serde(flatten)]
    branch: CompanyBranchViewResponse,
}

impl Default for BaseResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            messages: Vec::new(),
            branch: CompanyBranchViewResponse::default(),
        }
    }
}

impl BaseResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn set_status_code(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Copies the messages of `form` into the response.
    pub fn add_message_collection<T>(&mut self, form: &Form<T>) {
        self.messages.extend_from_slice(form.messages());
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn branch_view(&self) -> &CompanyBranchViewResponse {
        &self.branch
    }

    pub fn branch_view_mut(&mut self) -> &mut CompanyBranchViewResponse {
        &mut self.branch
    }
}

fn serialize_status<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}
