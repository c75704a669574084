//! AI tool entity: a configured capability (prompt templates + provider
//! parameters) usable by schools within quota

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ai_tools")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Stable code used by clients to invoke the tool
    #[sea_orm(column_type = "Text", unique)]
    pub code: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// System prompt template with {placeholder} substitution
    #[sea_orm(column_type = "Text")]
    pub system_prompt: String,

    /// User prompt template with {placeholder} substitution
    #[sea_orm(column_type = "Text")]
    pub user_prompt: String,

    /// Declared parameter schema (see `ai::ParamSpec`)
    #[sea_orm(column_type = "JsonBinary")]
    pub params: serde_json::Value,

    /// Model override; falls back to the configured default when empty
    #[sea_orm(column_type = "Text", nullable)]
    pub model: Option<String>,

    pub max_tokens: i32,

    /// Stored as tenths to keep the column integral (7 = 0.7)
    pub temperature_tenths: i16,

    pub is_enabled: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Sampling temperature as the provider expects it
    pub fn temperature(&self) -> f32 {
        f32::from(self.temperature_tenths) / 10.0
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::school_tool_grant::Entity")]
    Grants,

    #[sea_orm(has_many = "super::ai_usage_record::Entity")]
    UsageRecords,
}

impl Related<super::school_tool_grant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Grants.def()
    }
}

impl Related<super::ai_usage_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsageRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
