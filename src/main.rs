use anyhow::Context;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use caseflow::config::Config;
use caseflow::handlers::{
    ApiDetailResponse, ApiIdItem, ApiListResponse, ApiResponse, CaseDetailResponse, CaseResponse,
    CaseStepResponse, CopyRequest, CreateCaseRequest, CreateProjectRequest, DeleteResponse,
    ProjectResponse, SyncResponse, TagRequest,
};
use caseflow::models::{ApiTag, HttpMethod, RigEnv};
use caseflow::services::{ApiPayload, PayloadSections};
use caseflow::state::AppState;
use caseflow::{build_router, handlers};

/// Security scheme for Bearer token
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::project::create_project,
        handlers::project::get_project,
        handlers::api::list_apis,
        handlers::api::create_api,
        handlers::api::get_api,
        handlers::api::update_api,
        handlers::api::delete_api,
        handlers::api::delete_apis,
        handlers::api::set_api_tag,
        handlers::api::copy_api,
        handlers::api::sync_api,
        handlers::case::create_case,
        handlers::case::get_case,
    ),
    components(schemas(
        CreateProjectRequest,
        ProjectResponse,
        ApiPayload,
        PayloadSections,
        ApiResponse,
        ApiListResponse,
        ApiDetailResponse,
        ApiIdItem,
        TagRequest,
        CopyRequest,
        DeleteResponse,
        SyncResponse,
        CreateCaseRequest,
        CaseResponse,
        CaseStepResponse,
        CaseDetailResponse,
        ApiTag,
        RigEnv,
        HttpMethod,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Projects", description = "Project management endpoints"),
        (name = "APIs", description = "API definition endpoints: format, parse, filter, tag, soft-delete and sync"),
        (name = "Test Cases", description = "Test cases built from API definition snapshots")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; LOG_FORMAT=json switches to structured output
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    let addr = config.server_addr();

    tracing::info!("Connecting to database...");
    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;
    tracing::info!("Database connection established");

    // Build the main application router
    let app = build_router(state)
        // Add Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server started on http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
