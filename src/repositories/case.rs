use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::db;
use crate::entity::api::{Column as ApiColumn, Entity as ApiEntity};
use crate::entity::case::{self, Entity as CaseEntity};
use crate::entity::case_step::{self, Column as StepColumn, Entity as CaseStepEntity};
use crate::error::{AppError, AppResult};
use crate::models::{ApiTag, CaseStep, CreateTestCase, TestCase, TestCaseDetail};
use crate::repositories::{ProjectRepository, Repository};

/// Test case repository for database operations
pub struct CaseRepository;

#[async_trait]
impl Repository<TestCase> for CaseRepository {
    async fn find_by_id(db: &DatabaseConnection, id: i32) -> AppResult<TestCase> {
        let model = CaseEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("TestCase".to_string()))?;

        Ok(model.into())
    }
}

impl CaseRepository {
    /// Create a test case whose steps snapshot the given API definitions, in
    /// order. Either the case and all of its steps are stored or nothing is.
    pub async fn create(
        db: &DatabaseConnection,
        project_id: i32,
        creator: &str,
        input: &CreateTestCase,
    ) -> AppResult<TestCaseDetail> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("`name` is required".to_string()));
        }
        ProjectRepository::ensure_exists(db, project_id).await?;

        let txn = db.begin().await?;
        let now = db::now();

        let case = case::ActiveModel {
            project_id: Set(project_id),
            name: Set(name.to_string()),
            relation: Set(input.relation.unwrap_or(0)),
            tag: Set(input.tag.unwrap_or_default().code()),
            length: Set(input.api_ids.len() as i32),
            creator: Set(Some(creator.to_string())),
            updater: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut steps: Vec<CaseStep> = Vec::with_capacity(input.api_ids.len());
        for (index, &api_id) in input.api_ids.iter().enumerate() {
            let api = ApiEntity::find_by_id(api_id)
                .filter(ApiColumn::Deleted.eq(false))
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Api {}", api_id)))?;

            if api.project_id != project_id {
                return Err(AppError::Validation(format!(
                    "Api {} belongs to another project",
                    api_id
                )));
            }

            let step = case_step::ActiveModel {
                case_id: Set(case.id),
                step: Set(index as i32 + 1),
                name: Set(api.name),
                body: Set(api.body),
                url: Set(api.url),
                method: Set(api.method),
                source_api_id: Set(Some(api.id)),
                creator: Set(Some(creator.to_string())),
                updater: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            steps.push(step.into());
        }

        txn.commit().await?;

        tracing::info!(case_id = case.id, project_id, steps = steps.len(), creator, "Test case created");
        Ok(TestCaseDetail {
            case: case.into(),
            steps,
        })
    }

    /// Find a test case together with its ordered steps
    pub async fn find_with_steps(db: &DatabaseConnection, id: i32) -> AppResult<TestCaseDetail> {
        let case = Self::find_by_id(db, id).await?;
        let steps = Self::list_steps(db, id).await?;

        Ok(TestCaseDetail { case, steps })
    }

    /// Steps of a test case in execution order
    pub async fn list_steps(db: &DatabaseConnection, case_id: i32) -> AppResult<Vec<CaseStep>> {
        let models = CaseStepEntity::find()
            .filter(StepColumn::CaseId.eq(case_id))
            .order_by_asc(StepColumn::Step)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    /// Steps snapshotting a given API definition
    pub async fn list_steps_by_source(
        db: &DatabaseConnection,
        api_id: i32,
    ) -> AppResult<Vec<CaseStep>> {
        let models = CaseStepEntity::find()
            .filter(StepColumn::SourceApiId.eq(api_id))
            .order_by_asc(StepColumn::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

// Conversions from SeaORM models to our domain models
impl From<case::Model> for TestCase {
    fn from(m: case::Model) -> Self {
        Self {
            id: m.id,
            project_id: m.project_id,
            name: m.name,
            relation: m.relation,
            tag: ApiTag::from_code(m.tag),
            length: m.length,
            creator: m.creator,
            updater: m.updater,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<case_step::Model> for CaseStep {
    fn from(m: case_step::Model) -> Self {
        Self {
            id: m.id,
            case_id: m.case_id,
            step: m.step,
            name: m.name,
            body: m.body,
            url: m.url,
            method: m.method,
            source_api_id: m.source_api_id,
            creator: m.creator,
            updater: m.updater,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
