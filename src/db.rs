use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use time::OffsetDateTime;

use crate::entity::{api, case, case_step, project};

/// Current time truncated to microseconds, the precision the store keeps
pub fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

/// Create tables and indexes from the entity definitions if they are missing
pub async fn bootstrap(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, project::Entity).await?;
    create_table(db, &schema, api::Entity).await?;
    create_table(db, &schema, case::Entity).await?;
    create_table(db, &schema, case_step::Entity).await?;

    let indexes = [
        Index::create()
            .if_not_exists()
            .name("idx_apis_project_deleted")
            .table(api::Entity)
            .col(api::Column::ProjectId)
            .col(api::Column::Deleted)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_case_steps_source_api")
            .table(case_step::Entity)
            .col(case_step::Column::SourceApiId)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_case_steps_case")
            .table(case_step::Entity)
            .col(case_step::Column::CaseId)
            .to_owned(),
    ];
    for index in indexes {
        db.execute(backend.build(&index)).await?;
    }

    tracing::info!("Database schema ready");
    Ok(())
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}
