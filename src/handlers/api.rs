use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppResult;
use crate::handlers::common::{non_blank, parse_flag, parse_optional, ValidJson, ValidQuery};
use crate::handlers::PaginationParams;
use crate::middlewares::AuthUser;
use crate::models::{Api, ApiTag, RigEnv};
use crate::repositories::{ApiFilter, ApiRepository, Repository};
use crate::services::{ApiPayload, ExecutableRequest, FormatService, ParseService, SyncService};
use crate::state::AppState;

// ============ Request/Response DTOs ============

/// Query string of the definition list. Values arrive as text so that blank
/// values can be told apart from bad ones.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ApiListParams {
    /// Owning project
    pub project: i32,
    /// Directory node (relation)
    pub node: Option<String>,
    /// Whitespace-separated tokens matched against name or url
    pub search: Option<String>,
    pub tag: Option<String>,
    #[serde(rename = "rigEnv")]
    pub rig_env: Option<String>,
    /// `1` lists the recycle bin
    pub delete: Option<String>,
    /// `1` restricts to definitions created by the caller
    #[serde(rename = "onlyMe")]
    pub only_me: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ApiListParams {
    pub fn to_filter(&self, caller: &str) -> AppResult<ApiFilter> {
        let mut filter = ApiFilter::new(self.project)
            .with_search(non_blank(self.search.as_deref()).unwrap_or_default());

        filter.deleted = parse_flag("delete", self.delete.as_deref())?;
        if parse_flag("onlyMe", self.only_me.as_deref())? {
            filter.creator = Some(caller.to_string());
        }
        filter.node = parse_optional::<i32>("node", self.node.as_deref())?;
        filter.tag = parse_optional::<ApiTag>("tag", self.tag.as_deref())?;
        filter.rig_env = parse_optional::<RigEnv>("rigEnv", self.rig_env.as_deref())?;

        Ok(filter)
    }

    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub url: String,
    pub method: String,
    pub relation: i32,
    pub tag: ApiTag,
    pub rig_id: Option<i32>,
    pub rig_env: RigEnv,
    pub creator: Option<String>,
    pub updater: Option<String>,
    pub deleted: bool,
    #[schema(value_type = String)]
    pub created_at: time::OffsetDateTime,
    #[schema(value_type = String)]
    pub updated_at: time::OffsetDateTime,
}

impl From<Api> for ApiResponse {
    fn from(a: Api) -> Self {
        Self {
            id: a.id,
            project_id: a.project_id,
            name: a.name,
            url: a.url,
            method: a.method,
            relation: a.relation,
            tag: a.tag,
            rig_id: a.rig_id,
            rig_env: a.rig_env,
            creator: a.creator,
            updater: a.updater,
            deleted: a.deleted,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiListResponse {
    pub data: Vec<ApiResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// A stored definition expanded for editing and execution
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiDetailResponse {
    pub id: i32,
    #[schema(value_type = Object)]
    pub body: ExecutableRequest,
    pub success: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TagRequest {
    pub tag: ApiTag,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CopyRequest {
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApiIdItem {
    pub id: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    pub api_id: i32,
    pub affected_steps: u64,
    pub touched_cases: u64,
    #[schema(value_type = String)]
    pub synced_at: time::OffsetDateTime,
}

// ============ Handlers ============

/// List API definitions of a project
#[utoipa::path(
    get,
    path = "/api/apis",
    params(ApiListParams),
    responses(
        (status = 200, description = "Page of API definitions", body = ApiListResponse),
        (status = 400, description = "Invalid filter value"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "APIs"
)]
pub async fn list_apis(
    user: AuthUser,
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<ApiListParams>,
) -> AppResult<Json<ApiListResponse>> {
    let filter = params.to_filter(&user.username)?;
    let (limit, offset) = params.pagination().window();

    let apis = ApiRepository::list(&state.db, &filter, limit, offset).await?;
    let total = ApiRepository::count(&state.db, &filter).await?;

    Ok(Json(ApiListResponse {
        data: apis.into_iter().map(|a| a.into()).collect(),
        total,
        limit,
        offset,
    }))
}

/// Create an API definition from an editor payload
#[utoipa::path(
    post,
    path = "/api/apis",
    request_body = ApiPayload,
    responses(
        (status = 200, description = "API definition created", body = ApiResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "APIs"
)]
pub async fn create_api(
    user: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ApiPayload>,
) -> AppResult<Json<ApiResponse>> {
    let draft = FormatService::format(payload)?;
    let api = ApiRepository::create(&state.db, &draft, &user.username).await?;
    Ok(Json(api.into()))
}

/// Get an API definition expanded into an executable request
#[utoipa::path(
    get,
    path = "/api/apis/{id}",
    params(
        ("id" = i32, Path, description = "API ID")
    ),
    responses(
        (status = 200, description = "Expanded API definition", body = ApiDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "API not found"),
        (status = 500, description = "Stored body is malformed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "APIs"
)]
pub async fn get_api(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiDetailResponse>> {
    let api = ApiRepository::find_by_id(&state.db, id).await?;
    let body = ParseService::parse_stored(&api.body)?;

    Ok(Json(ApiDetailResponse {
        id: api.id,
        body,
        success: true,
    }))
}

/// Replace an API definition with a newly formatted one
#[utoipa::path(
    put,
    path = "/api/apis/{id}",
    params(
        ("id" = i32, Path, description = "API ID")
    ),
    request_body = ApiPayload,
    responses(
        (status = 200, description = "API definition updated", body = ApiResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "API or project not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "APIs"
)]
pub async fn update_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<ApiPayload>,
) -> AppResult<Json<ApiResponse>> {
    let draft = FormatService::format(payload)?;
    let api = ApiRepository::update(&state.db, id, &draft, &user.username).await?;
    Ok(Json(api.into()))
}

/// Move an API definition to the recycle bin
#[utoipa::path(
    delete,
    path = "/api/apis/{id}",
    params(
        ("id" = i32, Path, description = "API ID")
    ),
    responses(
        (status = 200, description = "API definition soft-deleted", body = DeleteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "API not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "APIs"
)]
pub async fn delete_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<DeleteResponse>> {
    ApiRepository::soft_delete(&state.db, id, Some(&user.username)).await?;
    Ok(Json(DeleteResponse { deleted: 1 }))
}

/// Move several API definitions to the recycle bin; unknown ids are skipped
#[utoipa::path(
    delete,
    path = "/api/apis",
    request_body = Vec<ApiIdItem>,
    responses(
        (status = 200, description = "Number of definitions soft-deleted", body = DeleteResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "APIs"
)]
pub async fn delete_apis(
    user: AuthUser,
    State(state): State<AppState>,
    ValidJson(items): ValidJson<Vec<ApiIdItem>>,
) -> AppResult<Json<DeleteResponse>> {
    let ids: Vec<i32> = items.iter().map(|item| item.id).collect();
    let deleted = ApiRepository::soft_delete_many(&state.db, &ids, Some(&user.username)).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Set the debug tag of an API definition
#[utoipa::path(
    patch,
    path = "/api/apis/{id}/tag",
    params(
        ("id" = i32, Path, description = "API ID")
    ),
    request_body = TagRequest,
    responses(
        (status = 200, description = "Tag updated", body = ApiResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "API not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "APIs"
)]
pub async fn set_api_tag(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<TagRequest>,
) -> AppResult<Json<ApiResponse>> {
    let api = ApiRepository::set_tag(&state.db, id, payload.tag, &user.username).await?;
    Ok(Json(api.into()))
}

/// Duplicate an API definition under a new name
#[utoipa::path(
    post,
    path = "/api/apis/{id}/copy",
    params(
        ("id" = i32, Path, description = "API ID")
    ),
    request_body = CopyRequest,
    responses(
        (status = 200, description = "Copy created", body = ApiResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "API not found"),
        (status = 500, description = "Stored body is malformed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "APIs"
)]
pub async fn copy_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<CopyRequest>,
) -> AppResult<Json<ApiResponse>> {
    let api = ApiRepository::copy(&state.db, id, &payload.name, &user.username).await?;
    Ok(Json(api.into()))
}

/// Push the current definition into every case step copied from it
#[utoipa::path(
    patch,
    path = "/api/apis/{id}/sync",
    params(
        ("id" = i32, Path, description = "API ID")
    ),
    responses(
        (status = 200, description = "Dependent case steps synced", body = SyncResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "API not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "APIs"
)]
pub async fn sync_api(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<SyncResponse>> {
    let outcome = SyncService::sync_case(&state.db, id, &user.username).await?;

    Ok(Json(SyncResponse {
        api_id: outcome.api_id,
        affected_steps: outcome.affected_steps,
        touched_cases: outcome.touched_cases,
        synced_at: outcome.synced_at,
    }))
}
