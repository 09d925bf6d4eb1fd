use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::ApiTag;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub relation: i32,
    pub tag: ApiTag,
    pub length: i32,
    pub creator: Option<String>,
    pub updater: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Snapshot of an API definition taken when it was attached or last synced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseStep {
    pub id: i32,
    pub case_id: i32,
    pub step: i32,
    pub name: String,
    pub body: String,
    pub url: String,
    pub method: String,
    pub source_api_id: Option<i32>,
    pub creator: Option<String>,
    pub updater: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateTestCase {
    pub name: String,
    pub relation: Option<i32>,
    pub tag: Option<ApiTag>,
    /// Ordered API definition ids, one step each
    pub api_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseDetail {
    pub case: TestCase,
    pub steps: Vec<CaseStep>,
}
