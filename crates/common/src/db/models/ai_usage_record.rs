//! AI usage record entity
//!
//! Append-only log of tool invocations; feeds both quota counting and
//! reporting.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ai_usage_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tool_id: Uuid,

    pub school_id: Uuid,

    pub user_id: Uuid,

    pub status: UsageStatus,

    /// Rendered prompt size, for cost reporting
    pub prompt_chars: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub response_body: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ai_tool::Entity",
        from = "Column::ToolId",
        to = "super::ai_tool::Column::Id"
    )]
    Tool,

    #[sea_orm(
        belongs_to = "super::school::Entity",
        from = "Column::SchoolId",
        to = "super::school::Column::Id"
    )]
    School,
}

impl Related<super::ai_tool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tool.def()
    }
}

impl Related<super::school::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
