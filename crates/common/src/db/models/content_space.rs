//! Content space placement entity
//!
//! A content sits in exactly one active space at a time; moving it
//! deactivates the prior row and creates the target one.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Placement context for content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    #[sea_orm(string_value = "personal")]
    Personal,
    #[sea_orm(string_value = "course")]
    Course,
    #[sea_orm(string_value = "school")]
    School,
    #[sea_orm(string_value = "platform")]
    Platform,
}

/// Visibility level within a space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum Visibility {
    #[sea_orm(string_value = "private")]
    #[default]
    Private,
    /// Visible to the course leader only
    #[sea_orm(string_value = "leader")]
    Leader,
    #[sea_orm(string_value = "public")]
    Public,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_spaces")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub content_id: Uuid,

    pub kind: SpaceKind,

    /// User for personal spaces, course for course spaces, school for
    /// school spaces
    pub owner_id: Uuid,

    pub visibility: Visibility,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::content::Entity",
        from = "Column::ContentId",
        to = "super::content::Column::Id"
    )]
    Content,
}

impl Related<super::content::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Content.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
