use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppResult;
use crate::handlers::common::ValidJson;
use crate::middlewares::AuthUser;
use crate::models::{ApiTag, CaseStep, CreateTestCase, TestCase, TestCaseDetail};
use crate::repositories::CaseRepository;
use crate::state::AppState;

// ============ Request/Response DTOs ============

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCaseRequest {
    pub name: String,
    pub relation: Option<i32>,
    pub tag: Option<ApiTag>,
    /// API definitions to snapshot, in step order
    pub api_ids: Vec<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseResponse {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub relation: i32,
    pub tag: ApiTag,
    pub length: i32,
    pub creator: Option<String>,
    pub updater: Option<String>,
    #[schema(value_type = String)]
    pub created_at: time::OffsetDateTime,
    #[schema(value_type = String)]
    pub updated_at: time::OffsetDateTime,
}

impl From<TestCase> for CaseResponse {
    fn from(c: TestCase) -> Self {
        Self {
            id: c.id,
            project_id: c.project_id,
            name: c.name,
            relation: c.relation,
            tag: c.tag,
            length: c.length,
            creator: c.creator,
            updater: c.updater,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseStepResponse {
    pub id: i32,
    pub step: i32,
    pub name: String,
    /// Stored canonical body, as copied from the source definition
    pub body: String,
    pub url: String,
    pub method: String,
    pub source_api_id: Option<i32>,
    pub updater: Option<String>,
    #[schema(value_type = String)]
    pub updated_at: time::OffsetDateTime,
}

impl From<CaseStep> for CaseStepResponse {
    fn from(s: CaseStep) -> Self {
        Self {
            id: s.id,
            step: s.step,
            name: s.name,
            body: s.body,
            url: s.url,
            method: s.method,
            source_api_id: s.source_api_id,
            updater: s.updater,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseDetailResponse {
    #[serde(flatten)]
    pub case: CaseResponse,
    pub steps: Vec<CaseStepResponse>,
}

impl From<TestCaseDetail> for CaseDetailResponse {
    fn from(d: TestCaseDetail) -> Self {
        Self {
            case: d.case.into(),
            steps: d.steps.into_iter().map(|s| s.into()).collect(),
        }
    }
}

// ============ Handlers ============

/// Create a test case from an ordered list of API definitions
#[utoipa::path(
    post,
    path = "/api/projects/{project_id}/cases",
    params(
        ("project_id" = i32, Path, description = "Project ID")
    ),
    request_body = CreateCaseRequest,
    responses(
        (status = 200, description = "Test case created", body = CaseDetailResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project or API not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Test Cases"
)]
pub async fn create_case(
    user: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i32>,
    ValidJson(payload): ValidJson<CreateCaseRequest>,
) -> AppResult<Json<CaseDetailResponse>> {
    let input = CreateTestCase {
        name: payload.name,
        relation: payload.relation,
        tag: payload.tag,
        api_ids: payload.api_ids,
    };

    let detail = CaseRepository::create(&state.db, project_id, &user.username, &input).await?;
    Ok(Json(detail.into()))
}

/// Get a test case with its steps
#[utoipa::path(
    get,
    path = "/api/cases/{id}",
    params(
        ("id" = i32, Path, description = "Test case ID")
    ),
    responses(
        (status = 200, description = "Test case with steps", body = CaseDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Test case not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Test Cases"
)]
pub async fn get_case(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<CaseDetailResponse>> {
    let detail = CaseRepository::find_with_steps(&state.db, id).await?;
    Ok(Json(detail.into()))
}
