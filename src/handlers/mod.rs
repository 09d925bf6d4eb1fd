pub mod api;
pub mod case;
pub mod common;
pub mod project;

pub use api::{
    copy_api, create_api, delete_api, delete_apis, get_api, list_apis, set_api_tag, sync_api,
    update_api, ApiDetailResponse, ApiIdItem, ApiListParams, ApiListResponse, ApiResponse,
    CopyRequest, DeleteResponse, SyncResponse, TagRequest,
};
pub use case::{
    create_case, get_case, CaseDetailResponse, CaseResponse, CaseStepResponse, CreateCaseRequest,
};
pub use common::{PaginationParams, ValidJson, ValidQuery};
pub use project::{create_project, get_project, CreateProjectRequest, ProjectResponse};
