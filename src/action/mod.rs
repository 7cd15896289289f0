//! Admin actions.
//!
//! An action reads a [`CombinedRequest`], writes its outcome into a
//! [`BaseResponse`] and reports success as a plain `bool`. Failures never
//! escape an action: they are turned into a response status, and into a log
//! entry when the caller must not see the details.

use std::sync::Arc;

use http::StatusCode;

use crate::{
    branch::service::CompanyBranchCreateService, error::CreateBranchError, logging::LogService,
    message::Message,
};

pub mod request;
pub mod response;


pub use request::{AdminPermissionRequest, CombinedRequest, CompanyBranchCreateRequest};
pub use response::{BaseResponse, CompanyBranchViewResponse};

const CREATE_SITE: &str = "CompanyBranchCreateAction::run";

/// Creates a company branch after validating both forms and rejecting a
/// title the company's client already uses.
pub struct CompanyBranchCreateAction {
    service: Arc<dyn CompanyBranchCreateService>,
    log: Arc<dyn LogService>,
}

impl CompanyBranchCreateAction {
    pub fn new(service: Arc<dyn CompanyBranchCreateService>, log: Arc<dyn LogService>) -> Self {
        Self { service, log }
    }

    /// Returns `true` when the branch was created and attached to the
    /// response.
    ///
    /// # Panics
    ///
    /// When the request carries no company. The HTTP layer resolves the
    /// company before dispatching, so a missing one is a wiring bug.
    pub async fn run(&self, request: &CombinedRequest, response: &mut BaseResponse) -> bool {
        let permissions = request.permission.permissions();
        let create_request = &request.branch_create;

        let branch_form = create_request.branch_form();
        if !branch_form.is_valid() {
            response.set_status_code(StatusCode::BAD_REQUEST);
            response.add_message_collection(branch_form);
            return false;
        }

        let order_extra_form = create_request.order_extra_form();
        if !order_extra_form.is_valid() {
            response.set_status_code(StatusCode::BAD_REQUEST);
            response.add_message_collection(order_extra_form);
            return false;
        }

        let company = create_request
            .company()
            .expect("company must be resolved before creating a branch");
        let title = &branch_form.data().title;

        match self
            .service
            .find_by_client_id_and_title(&company.client_id, title)
            .await
        {
            Ok(None) => {}
            Ok(Some(_)) => {
                response.set_status_code(StatusCode::BAD_REQUEST);
                response.push_message(Message::global_error(StatusCode::BAD_REQUEST));
                return false;
            }
            Err(err) => {
                self.log.log_for_exception(&err, CREATE_SITE);
                response.set_status_code(StatusCode::INTERNAL_SERVER_ERROR);
                return false;
            }
        }

        let created = self
            .service
            .create_company_branch(
                company,
                branch_form.data(),
                order_extra_form.data(),
                permissions,
            )
            .await;

        match created {
            Ok(aggregate) => {
                response
                    .branch_view_mut()
                    .add_company_branch_aggregate(aggregate);
                true
            }
            Err(CreateBranchError::NotCreated(reason)) => {
                log::debug!("{}: branch not created: {}", CREATE_SITE, reason);
                response.set_status_code(StatusCode::INTERNAL_SERVER_ERROR);
                false
            }
            // another request created the same title after our lookup
            Err(CreateBranchError::Duplicate { .. }) => {
                response.set_status_code(StatusCode::BAD_REQUEST);
                response.push_message(Message::global_error(StatusCode::BAD_REQUEST));
                false
            }
            Err(err) => {
                self.log.log_for_exception(&err, CREATE_SITE);
                response.set_status_code(StatusCode::INTERNAL_SERVER_ERROR);
                false
            }
        }
    }
}
