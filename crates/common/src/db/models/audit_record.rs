//! Audit record entity
//!
//! Links a content to its submitter and records the reviewer decision.
//! Immutable once resolved; at most one pending record per content.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum AuditStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub content_id: Uuid,

    pub school_id: Uuid,

    pub submitter_id: Uuid,

    pub status: AuditStatus,

    /// Reviewer who resolved the record
    pub reviewer_id: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub remark: Option<String>,

    /// Course the content should be promoted into on approval
    pub target_course_id: Option<Uuid>,

    /// Visibility requested for the course placement
    pub target_visibility: Option<super::content_space::Visibility>,

    pub created_at: DateTimeWithTimeZone,

    pub resolved_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Check if the record is in a terminal state
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, AuditStatus::Approved | AuditStatus::Rejected)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::content::Entity",
        from = "Column::ContentId",
        to = "super::content::Column::Id"
    )]
    Content,

    #[sea_orm(
        belongs_to = "super::school::Entity",
        from = "Column::SchoolId",
        to = "super::school::Column::Id"
    )]
    School,
}

impl Related<super::content::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Content.def()
    }
}

impl Related<super::school::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
