use async_trait::async_trait;
use sea_orm::sea_query::{Expr, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::db;
use crate::entity::api::{self, ActiveModel, Column, Entity as ApiEntity};
use crate::error::{AppError, AppResult};
use crate::models::{Api, ApiDraft, ApiTag, CanonicalBody, RigEnv};
use crate::repositories::{ProjectRepository, Repository};

/// Composable filter over API definitions. Always scoped to a project and a
/// deleted state; every other criterion is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiFilter {
    pub project_id: i32,
    pub deleted: bool,
    /// Only records created by this identity
    pub creator: Option<String>,
    /// Each token must appear in the name or the url
    pub search: Vec<String>,
    pub node: Option<i32>,
    pub tag: Option<ApiTag>,
    pub rig_env: Option<RigEnv>,
}

impl ApiFilter {
    pub fn new(project_id: i32) -> Self {
        Self {
            project_id,
            ..Default::default()
        }
    }

    /// Split free text into search tokens; blank text clears the search
    pub fn with_search(mut self, text: &str) -> Self {
        self.search = text.split_whitespace().map(str::to_string).collect();
        self
    }

    pub fn condition(&self) -> Condition {
        let mut condition = Condition::all()
            .add(Column::ProjectId.eq(self.project_id))
            .add(Column::Deleted.eq(self.deleted));

        if let Some(creator) = &self.creator {
            condition = condition.add(Column::Creator.eq(creator.as_str()));
        }

        for token in &self.search {
            condition = condition.add(
                Condition::any()
                    .add(Expr::col(Column::Name).like(substring_pattern(token)))
                    .add(Expr::col(Column::Url).like(substring_pattern(token))),
            );
        }

        if let Some(node) = self.node {
            condition = condition.add(Column::Relation.eq(node));
        }
        if let Some(tag) = self.tag {
            condition = condition.add(Column::Tag.eq(tag.code()));
        }
        if let Some(rig_env) = self.rig_env {
            condition = condition.add(Column::RigEnv.eq(rig_env.code()));
        }

        condition
    }
}

/// Escape LIKE metacharacters so the token matches literally
fn escape_like(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for c in token.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn substring_pattern(token: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(token))).escape('\\')
}

/// API repository for database operations
pub struct ApiRepository;

#[async_trait]
impl Repository<Api> for ApiRepository {
    async fn find_by_id(db: &DatabaseConnection, id: i32) -> AppResult<Api> {
        let model = ApiEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Api".to_string()))?;

        Ok(model.into())
    }
}

impl ApiRepository {
    /// Persist a formatted API definition
    pub async fn create(db: &DatabaseConnection, draft: &ApiDraft, creator: &str) -> AppResult<Api> {
        ProjectRepository::ensure_exists(db, draft.project_id).await?;

        let now = db::now();
        let model = ActiveModel {
            project_id: Set(draft.project_id),
            name: Set(draft.name.clone()),
            body: Set(draft.body.encode()?),
            url: Set(draft.url.clone()),
            method: Set(draft.method.to_string()),
            relation: Set(draft.relation),
            tag: Set(ApiTag::default().code()),
            rig_id: Set(draft.rig_id),
            rig_env: Set(draft.rig_env.code()),
            creator: Set(Some(creator.to_string())),
            updater: Set(None),
            deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = model.insert(db).await?;
        tracing::info!(api_id = result.id, project_id = result.project_id, creator, "Api created");
        Ok(result.into())
    }

    /// Overwrite an API definition with a freshly formatted one
    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        draft: &ApiDraft,
        updater: &str,
    ) -> AppResult<Api> {
        ProjectRepository::ensure_exists(db, draft.project_id).await?;

        let model = ApiEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Api".to_string()))?;

        let mut active: ActiveModel = model.into();
        active.name = Set(draft.name.clone());
        active.body = Set(draft.body.encode()?);
        active.url = Set(draft.url.clone());
        active.method = Set(draft.method.to_string());
        active.relation = Set(draft.relation);
        active.rig_id = Set(draft.rig_id);
        active.rig_env = Set(draft.rig_env.code());
        active.updater = Set(Some(updater.to_string()));
        active.updated_at = Set(db::now());

        let result = active.update(db).await?;
        tracing::info!(api_id = id, updater, "Api updated");
        Ok(result.into())
    }

    /// One page of API definitions, most recently updated first
    pub async fn list(
        db: &DatabaseConnection,
        filter: &ApiFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<Api>> {
        let models = ApiEntity::find()
            .filter(filter.condition())
            .order_by_desc(Column::UpdatedAt)
            .order_by_desc(Column::Id)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    /// Count API definitions matching a filter
    pub async fn count(db: &DatabaseConnection, filter: &ApiFilter) -> AppResult<u64> {
        let count = ApiEntity::find()
            .filter(filter.condition())
            .count(db)
            .await?;

        Ok(count)
    }

    /// Mark one API definition deleted
    pub async fn soft_delete(
        db: &DatabaseConnection,
        id: i32,
        updater: Option<&str>,
    ) -> AppResult<()> {
        let mut update = ApiEntity::update_many()
            .col_expr(Column::Deleted, Expr::value(true))
            .col_expr(Column::UpdatedAt, Expr::value(db::now()));
        if let Some(updater) = updater {
            update = update.col_expr(Column::Updater, Expr::value(updater.to_string()));
        }

        let result = update.filter(Column::Id.eq(id)).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Api {}", id)));
        }

        tracing::info!(api_id = id, updater, "Api soft-deleted");
        Ok(())
    }

    /// Mark several API definitions deleted. Each id is applied on its own:
    /// unknown ids are skipped and do not undo the others.
    pub async fn soft_delete_many(
        db: &DatabaseConnection,
        ids: &[i32],
        updater: Option<&str>,
    ) -> AppResult<u64> {
        let mut deleted = 0;
        for &id in ids {
            match Self::soft_delete(db, id, updater).await {
                Ok(()) => deleted += 1,
                Err(AppError::NotFound(_)) => {
                    tracing::debug!(api_id = id, "Skipping unknown api in bulk delete");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(deleted)
    }

    /// Set the debug tag of an API definition
    pub async fn set_tag(
        db: &DatabaseConnection,
        id: i32,
        tag: ApiTag,
        updater: &str,
    ) -> AppResult<Api> {
        let result = ApiEntity::update_many()
            .col_expr(Column::Tag, Expr::value(tag.code()))
            .col_expr(Column::Updater, Expr::value(updater.to_string()))
            .col_expr(Column::UpdatedAt, Expr::value(db::now()))
            .filter(Column::Id.eq(id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Api {}", id)));
        }

        tracing::info!(api_id = id, ?tag, updater, "Api tag updated");
        Self::find_by_id(db, id).await
    }

    /// Duplicate an API definition under a new name. The stored body goes
    /// through the strict decoder, so a corrupt source is reported rather
    /// than copied.
    pub async fn copy(
        db: &DatabaseConnection,
        id: i32,
        name: &str,
        caller: &str,
    ) -> AppResult<Api> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("`name` is required".to_string()));
        }

        let source = ApiEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Api".to_string()))?;

        let mut body = CanonicalBody::decode(&source.body)?;
        body.name = name.to_string();

        let now = db::now();
        let model = ActiveModel {
            project_id: Set(source.project_id),
            name: Set(name.to_string()),
            body: Set(body.encode()?),
            url: Set(source.url),
            method: Set(source.method),
            relation: Set(source.relation),
            tag: Set(source.tag),
            rig_id: Set(source.rig_id),
            rig_env: Set(source.rig_env),
            creator: Set(Some(caller.to_string())),
            updater: Set(Some(caller.to_string())),
            deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = model.insert(db).await?;
        tracing::info!(api_id = result.id, source_api_id = id, caller, "Api copied");
        Ok(result.into())
    }
}

// Conversion from SeaORM model to our domain model
impl From<api::Model> for Api {
    fn from(m: api::Model) -> Self {
        Self {
            id: m.id,
            project_id: m.project_id,
            name: m.name,
            body: m.body,
            url: m.url,
            method: m.method,
            relation: m.relation,
            tag: ApiTag::from_code(m.tag),
            rig_id: m.rig_id,
            rig_env: RigEnv::from_code(m.rig_env),
            creator: m.creator,
            updater: m.updater,
            deleted: m.deleted,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
