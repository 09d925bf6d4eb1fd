pub mod api;
pub mod case;
pub mod project;

pub use api::{ApiFilter, ApiRepository};
pub use case::CaseRepository;
pub use project::ProjectRepository;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::error::{AppError, AppResult};

/// Base repository trait for lookups by primary key
#[async_trait]
pub trait Repository<T>
where
    T: Send + Sync,
{
    /// Find entity by ID
    async fn find_by_id(db: &DatabaseConnection, id: i32) -> AppResult<T>;

    /// Check whether an entity with this ID exists
    async fn exists(db: &DatabaseConnection, id: i32) -> AppResult<bool> {
        match Self::find_by_id(db, id).await {
            Ok(_) => Ok(true),
            Err(AppError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
