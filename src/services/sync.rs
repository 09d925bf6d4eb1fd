use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, TransactionTrait,
};
use time::OffsetDateTime;

use crate::db;
use crate::entity::api::Entity as ApiEntity;
use crate::entity::case::{Column as CaseColumn, Entity as CaseEntity};
use crate::entity::case_step::{Column as StepColumn, Entity as CaseStepEntity};
use crate::error::{AppError, AppResult};

/// What a sync touched
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub api_id: i32,
    pub affected_steps: u64,
    pub touched_cases: u64,
    pub synced_at: OffsetDateTime,
}

/// Propagates API definition edits into the case steps that copied it
pub struct SyncService;

impl SyncService {
    /// Copy the current name, body, url and method of an API definition into
    /// every case step sourced from it, then stamp each owning test case.
    ///
    /// Runs as one transaction. The source row is locked for the duration,
    /// so concurrent syncs of the same API serialize while different APIs
    /// proceed in parallel. Any failure rolls the whole sync back.
    pub async fn sync_case(
        db: &DatabaseConnection,
        api_id: i32,
        updater: &str,
    ) -> AppResult<SyncOutcome> {
        let txn = db.begin().await?;

        let source = ApiEntity::find_by_id(api_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Api {}", api_id)))?;

        let synced_at = db::now();

        let steps = CaseStepEntity::update_many()
            .col_expr(StepColumn::Name, Expr::value(source.name))
            .col_expr(StepColumn::Body, Expr::value(source.body))
            .col_expr(StepColumn::Url, Expr::value(source.url))
            .col_expr(StepColumn::Method, Expr::value(source.method))
            .col_expr(StepColumn::Updater, Expr::value(updater.to_string()))
            .col_expr(StepColumn::UpdatedAt, Expr::value(synced_at))
            .filter(StepColumn::SourceApiId.eq(api_id))
            .exec(&txn)
            .await?;

        let case_ids: Vec<i32> = CaseStepEntity::find()
            .select_only()
            .column(StepColumn::CaseId)
            .distinct()
            .filter(StepColumn::SourceApiId.eq(api_id))
            .into_tuple()
            .all(&txn)
            .await?;

        let touched_cases = if case_ids.is_empty() {
            0
        } else {
            CaseEntity::update_many()
                .col_expr(CaseColumn::Updater, Expr::value(updater.to_string()))
                .col_expr(CaseColumn::UpdatedAt, Expr::value(synced_at))
                .filter(CaseColumn::Id.is_in(case_ids))
                .exec(&txn)
                .await?
                .rows_affected
        };

        txn.commit().await?;

        tracing::info!(
            api_id,
            updater,
            affected_steps = steps.rows_affected,
            touched_cases,
            "Case steps synced from api"
        );

        Ok(SyncOutcome {
            api_id,
            affected_steps: steps.rows_affected,
            touched_cases,
            synced_at,
        })
    }
}
