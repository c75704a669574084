//! SeaORM entity models
//!
//! Database entities for ClassForge

mod school;
mod course;
mod course_teacher;
mod content;
mod content_space;
mod audit_record;
mod ai_tool;
mod school_tool_grant;
mod ai_usage_record;

pub use school::{
    Entity as SchoolEntity,
    Model as School,
    ActiveModel as SchoolActiveModel,
    Column as SchoolColumn,
};

pub use course::{
    Entity as CourseEntity,
    Model as Course,
    ActiveModel as CourseActiveModel,
    Column as CourseColumn,
};

pub use course_teacher::{
    Entity as CourseTeacherEntity,
    Model as CourseTeacher,
    ActiveModel as CourseTeacherActiveModel,
    Column as CourseTeacherColumn,
};

pub use content::{
    Entity as ContentEntity,
    Model as Content,
    ActiveModel as ContentActiveModel,
    Column as ContentColumn,
    ContentSource,
    ContentStatus,
};

pub use content_space::{
    Entity as ContentSpaceEntity,
    Model as ContentSpace,
    ActiveModel as ContentSpaceActiveModel,
    Column as ContentSpaceColumn,
    SpaceKind,
    Visibility,
};

pub use audit_record::{
    Entity as AuditRecordEntity,
    Model as AuditRecord,
    ActiveModel as AuditRecordActiveModel,
    Column as AuditRecordColumn,
    AuditStatus,
};

pub use ai_tool::{
    Entity as AiToolEntity,
    Model as AiTool,
    ActiveModel as AiToolActiveModel,
    Column as AiToolColumn,
};

pub use school_tool_grant::{
    Entity as SchoolToolGrantEntity,
    Model as SchoolToolGrant,
    ActiveModel as SchoolToolGrantActiveModel,
    Column as SchoolToolGrantColumn,
};

pub use ai_usage_record::{
    Entity as AiUsageRecordEntity,
    Model as AiUsageRecord,
    ActiveModel as AiUsageRecordActiveModel,
    Column as AiUsageRecordColumn,
    UsageStatus,
};
