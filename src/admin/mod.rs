use std::{
    collections::{BTreeMap, HashMap},
    error::Error,
    sync::Arc,
};

use async_trait::async_trait;
use http::{header, Method, Response, StatusCode};
use matchit::{Match, Router};
use pingora::{
    apps::http_app::ServeHttp, protocols::http::ServerSession, services::listening::Service,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    action::{
        AdminPermissionRequest, BaseResponse, CombinedRequest, CompanyBranchCreateAction,
        CompanyBranchCreateRequest,
    },
    branch::{
        store::BranchStore, BranchForm, Company, Form, OrderExtraForm, Permission, PermissionSet,
    },
    config::{Admin, ApiKey},
    utils::response::{content_type, CommonErrors, ResponseBuilder},
};

const BRANCHES_PATH: &str = "/admin/companies/{company_id}/branches";

#[async_trait]
trait Handler {
    async fn handle(
        &self,
        ctx: &AdminContext,
        session: &mut ServerSession,
        params: BTreeMap<String, String>,
        permissions: PermissionSet,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>>;
}

/// Body of a branch create call. The forms stay raw JSON until
/// [`Form::from_json`] so type errors are reported per field.
#[derive(Debug, Deserialize)]
struct CreateBranchPayload {
    #[serde(default)]
    branch: Option<Value>,
    #[serde(default)]
    order_extra: Option<Value>,
}

/// Collaborators shared by all admin handlers.
pub struct AdminContext {
    store: Arc<dyn BranchStore>,
    create_action: CompanyBranchCreateAction,
    companies: HashMap<u64, Company>,
}

impl AdminContext {
    pub fn new<I>(
        store: Arc<dyn BranchStore>,
        create_action: CompanyBranchCreateAction,
        companies: I,
    ) -> Self
    where
        I: IntoIterator<Item = Company>,
    {
        Self {
            store,
            create_action,
            companies: companies.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    fn company(&self, company_id: &str) -> Option<&Company> {
        company_id
            .parse::<u64>()
            .ok()
            .and_then(|id| self.companies.get(&id))
    }

    /// Runs the create action for the company addressed by `company_id`.
    pub async fn create_branch(
        &self,
        company_id: &str,
        permissions: PermissionSet,
        body: &[u8],
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
        if !permissions.contains(Permission::CreateBranch) {
            return Ok(CommonErrors::forbidden(&format!(
                "Missing permission {}",
                Permission::CreateBranch
            )));
        }

        let Some(company) = self.company(company_id) else {
            return Ok(CommonErrors::not_found("Company not found"));
        };

        let payload: CreateBranchPayload =
            serde_json::from_slice(body).map_err(|e| format!("Invalid JSON data: {}", e))?;

        let request = CombinedRequest {
            permission: AdminPermissionRequest::new(permissions),
            branch_create: CompanyBranchCreateRequest::from_forms(
                Form::<BranchForm>::from_json(payload.branch),
                Form::<OrderExtraForm>::from_json(payload.order_extra),
            )
            .with_company(company.clone()),
        };
        let mut response = BaseResponse::new();
        if !self.create_action.run(&request, &mut response).await {
            log::debug!(
                "Branch create for company {} failed with {}",
                company.id,
                response.status_code()
            );
        }

        Ok(ResponseBuilder::json(response.status_code(), &response))
    }

    pub async fn list_branches(&self, company_id: &str) -> Response<Vec<u8>> {
        let Some(company) = self.company(company_id) else {
            return CommonErrors::not_found("Company not found");
        };

        match self.store.list_by_client_id(&company.client_id).await {
            Ok(branches) => {
                let mut response = BaseResponse::new();
                for branch in branches {
                    response.branch_view_mut().add_company_branch_aggregate(branch);
                }
                ResponseBuilder::json(StatusCode::OK, &response)
            }
            Err(e) => {
                log::error!("Failed to list branches of company {}: {}", company.id, e);
                CommonErrors::internal_server_error("Internal Server Error")
            }
        }
    }
}

pub struct AdminHttpApp {
    ctx: AdminContext,
    router: Router<HashMap<Method, Box<dyn Handler + Send + Sync>>>,

    config: Admin,
}

impl AdminHttpApp {
    pub fn new(config: Admin, ctx: AdminContext) -> Self {
        let mut this = Self {
            ctx,
            router: Router::new(),
            config,
        };

        this.route(BRANCHES_PATH, Method::POST, Box::new(BranchCreateHandler))
            .route(BRANCHES_PATH, Method::GET, Box::new(BranchListHandler));

        this
    }

    fn route(
        &mut self,
        path: &str,
        method: Method,
        handler: Box<dyn Handler + Send + Sync>,
    ) -> &mut Self {
        if let Ok(routes) = self.router.at_mut(path) {
            routes.value.insert(method, handler);
        } else {
            let mut handlers = HashMap::new();
            handlers.insert(method, handler);
            if let Err(e) = self.router.insert(path, handlers) {
                log::error!("Failed to register admin route {}: {}", path, e);
            }
        }
        self
    }

    pub fn admin_http_service(config: Admin, ctx: AdminContext) -> Service<Self> {
        let addr = config.address.to_string();
        let mut service = Service::new("Admin HTTP".to_string(), Self::new(config, ctx));
        service.add_tcp(&addr);
        service
    }
}

#[async_trait]
impl ServeHttp for AdminHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        http_session.set_keepalive(None);

        let presented = http_session
            .get_header("x-api-key")
            .and_then(|value| value.to_str().ok());
        let Some(permissions) = permissions_for_key(&self.config.api_keys, presented) else {
            return CommonErrors::forbidden("Must provide api key");
        };

        let (path, method) = {
            let req_header = http_session.req_header();
            (req_header.uri.path().to_string(), req_header.method.clone())
        };

        match self.router.at(&path) {
            Ok(Match { value, params }) => match value.get(&method) {
                Some(handler) => {
                    let params: BTreeMap<String, String> = params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();
                    match handler
                        .handle(&self.ctx, http_session, params, permissions)
                        .await
                    {
                        Ok(resp) => resp,
                        Err(e) => CommonErrors::bad_request(&e.to_string()),
                    }
                }
                None => CommonErrors::method_not_allowed(),
            },
            Err(_) => CommonErrors::not_found("Not Found"),
        }
    }
}

struct BranchCreateHandler;

#[async_trait]
impl Handler for BranchCreateHandler {
    async fn handle(
        &self,
        ctx: &AdminContext,
        http_session: &mut ServerSession,
        params: BTreeMap<String, String>,
        permissions: PermissionSet,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
        validate_content_type(http_session)?;

        let body_data = read_request_body(http_session).await?;
        let company_id = params.get("company_id").ok_or("Missing company ID")?;

        ctx.create_branch(company_id, permissions, &body_data).await
    }
}

struct BranchListHandler;

#[async_trait]
impl Handler for BranchListHandler {
    async fn handle(
        &self,
        ctx: &AdminContext,
        _http_session: &mut ServerSession,
        params: BTreeMap<String, String>,
        _permissions: PermissionSet,
    ) -> Result<Response<Vec<u8>>, Box<dyn Error>> {
        let company_id = params.get("company_id").ok_or("Missing company ID")?;
        Ok(ctx.list_branches(company_id).await)
    }
}

/// Permissions granted to the presented api key, `None` if it is unknown.
fn permissions_for_key(keys: &[ApiKey], presented: Option<&str>) -> Option<PermissionSet> {
    let presented = presented?;
    keys.iter()
        .find(|key| key.key == presented)
        .map(ApiKey::permission_set)
}

fn validate_content_type(http_session: &ServerSession) -> Result<(), Box<dyn Error>> {
    match http_session.get_header(header::CONTENT_TYPE) {
        Some(ct) if is_json_content_type(ct.to_str()?) => Ok(()),
        _ => Err("Content-Type must be application/json".into()),
    }
}

fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(content_type::APPLICATION_JSON))
}

async fn read_request_body(http_session: &mut ServerSession) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut body_data = Vec::new();
    while let Some(bytes) = http_session.read_request_body().await? {
        body_data.extend_from_slice(&bytes);
    }
    Ok(body_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        branch::{service::StoreBranchService, store::MemoryBranchStore},
        logging::DefaultLogService,
    };

    fn context() -> AdminContext {
        let store: Arc<dyn BranchStore> = Arc::new(MemoryBranchStore::new());
        let action = CompanyBranchCreateAction::new(
            Arc::new(StoreBranchService::new(store.clone())),
            Arc::new(DefaultLogService),
        );
        AdminContext::new(
            store,
            action,
            [Company {
                id: 1,
                client_id: "client-1".to_string(),
                name: "Acme".to_string(),
            }],
        )
    }

    fn permissions() -> PermissionSet {
        PermissionSet::new([Permission::CreateBranch, Permission::ManageOrderExtra])
    }

    fn body(response: &Response<Vec<u8>>) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_create_branch() {
        let ctx = context();
        let payload = br#"{
            "branch": {"title": "Main Office", "email": "office@example.com"},
            "order_extra": {"payment_deferral_days": 30}
        }"#;

        let response = ctx.create_branch("1", permissions(), payload).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body(&response);
        assert_eq!(json["status"], 200);
        assert_eq!(json["branches"][0]["title"], "Main Office");
        assert_eq!(json["branches"][0]["client_id"], "client-1");
        assert_eq!(json["branches"][0]["order_extra"]["payment_deferral_days"], 30);

        let listed = ctx.list_branches("1").await;
        assert_eq!(listed.status(), StatusCode::OK);
        assert_eq!(body(&listed)["branches"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_branch() {
        let ctx = context();
        let payload = br#"{"branch": {"title": "Main Office"}}"#;

        let first = ctx.create_branch("1", permissions(), payload).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = ctx.create_branch("1", permissions(), payload).await.unwrap();
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let json = body(&second);
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert!(json["messages"][0]["field"].is_null());
        assert_eq!(json["messages"][0]["code"], 400);
    }

    #[tokio::test]
    async fn test_create_invalid_form() {
        let ctx = context();
        let payload = br#"{"branch": {"title": "", "email": "nope"}}"#;

        let response = ctx.create_branch("1", permissions(), payload).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body(&response);
        assert_eq!(json["messages"][0]["field"], "email");
        assert!(json["branches"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_unknown_company() {
        let ctx = context();
        let payload = br#"{"branch": {"title": "Main Office"}}"#;

        let response = ctx.create_branch("2", permissions(), payload).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ctx.create_branch("abc", permissions(), payload).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_malformed_body() {
        let ctx = context();
        let err = ctx
            .create_branch("1", permissions(), b"{not json")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON data"));
    }

    #[tokio::test]
    async fn test_create_wrong_field_types() {
        let ctx = context();
        let payload = br#"{
            "branch": {"title": "Main Office"},
            "order_extra": {"payment_deferral_days": -1}
        }"#;

        let response = ctx.create_branch("1", permissions(), payload).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body(&response);
        assert_eq!(json["status"], 400);
        assert_eq!(json["messages"][0]["field"], "payment_deferral_days");
        assert!(json["branches"].as_array().unwrap().is_empty());

        let response = ctx
            .create_branch("1", permissions(), br#"{"branch": {"title": 5}}"#)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["messages"][0]["field"], "title");
        assert_eq!(body(&ctx.list_branches("1").await)["branches"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_create_requires_permission() {
        let ctx = context();
        let payload = br#"{"branch": {"title": "Main Office"}}"#;

        let only_extra = PermissionSet::new([Permission::ManageOrderExtra]);
        let response = ctx.create_branch("1", only_extra, payload).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ctx
            .create_branch("1", PermissionSet::default(), payload)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(ctx
            .store
            .list_by_client_id("client-1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_unknown_company() {
        let ctx = context();
        assert_eq!(ctx.list_branches("9").await.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_permissions_for_key() {
        let keys = vec![ApiKey {
            key: "edd1c9f034335f136f87ad84b625c8f1".to_string(),
            permissions: vec![Permission::CreateBranch],
        }];
        let granted =
            permissions_for_key(&keys, Some("edd1c9f034335f136f87ad84b625c8f1")).unwrap();
        assert!(granted.contains(Permission::CreateBranch));
        assert!(permissions_for_key(&keys, Some("wrong")).is_none());
        assert!(permissions_for_key(&keys, None).is_none());
    }

    #[test]
    fn test_json_content_type() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(!is_json_content_type("text/plain"));
    }

    #[test]
    fn test_routes_registered() {
        let app = AdminHttpApp::new(Admin::default(), context());
        let matched = app.router.at("/admin/companies/1/branches").unwrap();
        assert!(matched.value.contains_key(&Method::POST));
        assert!(matched.value.contains_key(&Method::GET));
        assert_eq!(matched.params.get("company_id"), Some("1"));
    }
}
