use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "apis")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub project_id: i32,
    #[sea_orm(column_type = "String(StringLen::N(100))")]
    pub name: String,
    /// Versioned canonical body, JSON text
    #[sea_orm(column_type = "Text")]
    pub body: String,
    #[sea_orm(column_type = "String(StringLen::N(255))")]
    pub url: String,
    #[sea_orm(column_type = "String(StringLen::N(10))")]
    pub method: String,
    pub relation: i32,
    pub tag: i16,
    pub rig_id: Option<i32>,
    pub rig_env: i16,
    pub creator: Option<String>,
    pub updater: Option<String>,
    pub deleted: bool,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
    #[sea_orm(has_many = "super::case_step::Entity")]
    CaseSteps,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::case_step::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CaseSteps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
