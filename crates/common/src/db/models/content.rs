//! Content entity: a unit of teaching material authored by a teacher

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Content lifecycle status.
///
/// Legal transitions: draft -> pending -> {approved, rejected}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ContentStatus {
    #[sea_orm(string_value = "draft")]
    #[default]
    Draft,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Where the content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    #[sea_orm(string_value = "upload")]
    Upload,
    #[sea_orm(string_value = "ai_generate")]
    AiGenerate,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub school_id: Uuid,

    pub creator_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub body: String,

    pub status: ContentStatus,

    pub source: ContentSource,

    /// Course the content was approved into, if any
    pub course_id: Option<Uuid>,

    pub is_deleted: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Only draft content is editable
    pub fn is_editable(&self) -> bool {
        self.status == ContentStatus::Draft
    }

    /// Whether the content is in a terminal audit state
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.status,
            ContentStatus::Approved | ContentStatus::Rejected
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::school::Entity",
        from = "Column::SchoolId",
        to = "super::school::Column::Id"
    )]
    School,

    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,

    #[sea_orm(has_many = "super::content_space::Entity")]
    Spaces,

    #[sea_orm(has_many = "super::audit_record::Entity")]
    AuditRecords,
}

impl Related<super::school::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::content_space::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Spaces.def()
    }
}

impl Related<super::audit_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuditRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
