use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::db;
use crate::entity::project::{self, ActiveModel, Entity as ProjectEntity};
use crate::error::{AppError, AppResult};
use crate::models::{CreateProject, Project};
use crate::repositories::Repository;

/// Project repository for database operations
pub struct ProjectRepository;

#[async_trait]
impl Repository<Project> for ProjectRepository {
    async fn find_by_id(db: &DatabaseConnection, id: i32) -> AppResult<Project> {
        let model = ProjectEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Project".to_string()))?;

        Ok(model.into())
    }
}

impl ProjectRepository {
    /// Create a new project
    pub async fn create(
        db: &DatabaseConnection,
        creator: &str,
        input: &CreateProject,
    ) -> AppResult<Project> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("`name` is required".to_string()));
        }

        let now = db::now();
        let model = ActiveModel {
            name: Set(name.to_string()),
            description: Set(input.description.clone()),
            creator: Set(Some(creator.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = model.insert(db).await?;
        Ok(result.into())
    }

    /// Fail with NotFound unless the project exists
    pub async fn ensure_exists(db: &DatabaseConnection, id: i32) -> AppResult<()> {
        if Self::exists(db, id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Project {}", id)))
        }
    }
}

// Conversion from SeaORM model to our domain model
impl From<project::Model> for Project {
    fn from(m: project::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            creator: m.creator,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
