use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};

use caseflow::entity::api::{Column as ApiColumn, Entity as ApiEntity};
use caseflow::models::{Api, CreateProject, CreateTestCase, Project, TestCaseDetail};
use caseflow::repositories::{ApiRepository, CaseRepository, ProjectRepository};
use caseflow::services::{ApiPayload, AuthService, FormatService};
use caseflow::state::AppState;

/// Authentication info for tests
#[allow(dead_code)]
pub struct TestAuth {
    pub username: String,
    pub token: String,
}

impl TestAuth {
    /// Get the Authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Factory for creating test data
pub struct Factory<'a> {
    state: &'a AppState,
}

#[allow(dead_code)]
impl<'a> Factory<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Issue a token for a caller identity
    pub fn create_user(&self, username: &str) -> TestAuth {
        let token = AuthService::generate_token(username, &self.state.config).unwrap();

        TestAuth {
            username: username.to_string(),
            token,
        }
    }

    pub async fn create_project(&self, creator: &str) -> Project {
        self.create_project_with_name(creator, "Test Project").await
    }

    pub async fn create_project_with_name(&self, creator: &str, name: &str) -> Project {
        let input = CreateProject {
            name: name.to_string(),
            description: Some("A test project".to_string()),
        };

        ProjectRepository::create(&self.state.db, creator, &input)
            .await
            .unwrap()
    }

    /// Format and store an API definition from a raw editor payload
    pub async fn create_api_from(&self, creator: &str, payload: Value) -> Api {
        let payload: ApiPayload = serde_json::from_value(payload).unwrap();
        let draft = FormatService::format(payload).unwrap();

        ApiRepository::create(&self.state.db, &draft, creator)
            .await
            .unwrap()
    }

    pub async fn create_api(&self, project_id: i32, creator: &str, name: &str, url: &str) -> Api {
        self.create_api_from(
            creator,
            json!({
                "name": name,
                "url": url,
                "method": "GET",
                "project": project_id,
                "header": [{"key": "Accept", "value": "application/json", "desc": ""}],
                "validate": [{"comparator": "equals", "actual": "status_code", "expect": "200", "type": 2}]
            }),
        )
        .await
    }

    pub async fn create_case(
        &self,
        project_id: i32,
        creator: &str,
        name: &str,
        api_ids: &[i32],
    ) -> TestCaseDetail {
        let input = CreateTestCase {
            name: name.to_string(),
            relation: None,
            tag: None,
            api_ids: api_ids.to_vec(),
        };

        CaseRepository::create(&self.state.db, project_id, creator, &input)
            .await
            .unwrap()
    }

    /// Overwrite a stored body with arbitrary text, bypassing Format
    pub async fn corrupt_api_body(&self, api_id: i32, text: &str) {
        ApiEntity::update_many()
            .col_expr(ApiColumn::Body, Expr::value(text.to_string()))
            .filter(ApiColumn::Id.eq(api_id))
            .exec(&self.state.db)
            .await
            .unwrap();
    }
}
