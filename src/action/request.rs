use crate::branch::{BranchForm, Company, Form, OrderExtraForm, PermissionSet};

/// Permissions of the authenticated admin.
#[derive(Clone, Debug, Default)]
pub struct AdminPermissionRequest {
    permissions: PermissionSet,
}

impl AdminPermissionRequest {
    pub fn new(permissions: PermissionSet) -> Self {
        Self { permissions }
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }
}

/// Parsed input of a branch create call.
#[derive(Clone, Debug)]
pub struct CompanyBranchCreateRequest {
    branch_form: Form<BranchForm>,
    order_extra_form: Form<OrderExtraForm>,
    company: Option<Company>,
}

impl CompanyBranchCreateRequest {
    pub fn new(branch: BranchForm, order_extra: OrderExtraForm) -> Self {
        Self::from_forms(Form::new(branch), Form::new(order_extra))
    }

    pub fn from_forms(
        branch_form: Form<BranchForm>,
        order_extra_form: Form<OrderExtraForm>,
    ) -> Self {
        Self {
            branch_form,
            order_extra_form,
            company: None,
        }
    }

    pub fn with_company(mut self, company: Company) -> Self {
        self.company = Some(company);
        self
    }

    pub fn branch_form(&self) -> &Form<BranchForm> {
        &self.branch_form
    }

    pub fn order_extra_form(&self) -> &Form<OrderExtraForm> {
        &self.order_extra_form
    }

    pub fn company(&self) -> Option<&Company> {
        self.company.as_ref()
    }
}

/// Everything the create action reads, one field per concern.
#[derive(Clone, Debug)]
pub struct CombinedRequest {
    pub permission: AdminPermissionRequest,
    pub branch_create: CompanyBranchCreateRequest,
}
