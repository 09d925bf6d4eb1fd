use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Denormalized snapshot of an API definition inside a test case
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "case_steps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub case_id: i32,
    pub step: i32,
    #[sea_orm(column_type = "String(StringLen::N(100))")]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    #[sea_orm(column_type = "String(StringLen::N(255))")]
    pub url: String,
    #[sea_orm(column_type = "String(StringLen::N(10))")]
    pub method: String,
    pub source_api_id: Option<i32>,
    pub creator: Option<String>,
    pub updater: Option<String>,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::case::Entity",
        from = "Column::CaseId",
        to = "super::case::Column::Id"
    )]
    Case,
    #[sea_orm(
        belongs_to = "super::api::Entity",
        from = "Column::SourceApiId",
        to = "super::api::Column::Id"
    )]
    SourceApi,
}

impl Related<super::case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Case.def()
    }
}

impl Related<super::api::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SourceApi.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
