//! Repository traits for data access
//!
//! One trait per entity, returning plain entity models. The SeaORM
//! [`Repository`](super::Repository) implements them against Postgres;
//! [`MemoryStore`](super::MemoryStore) implements them in-process for
//! tests and local development. Core services depend only on these
//! traits.

use crate::db::models::*;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// School (tenant) access
#[async_trait]
pub trait SchoolRepo: Send + Sync {
    async fn insert_school(&self, school: School) -> Result<School>;

    async fn find_school(&self, id: Uuid) -> Result<Option<School>>;

    /// Lookup by API key hash; only active schools are returned
    async fn find_school_by_api_key_hash(&self, hash: &str) -> Result<Option<School>>;
}

/// Course access
#[async_trait]
pub trait CourseRepo: Send + Sync {
    async fn insert_course(&self, course: Course) -> Result<Course>;

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>>;

    async fn add_course_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> Result<()>;

    /// Whether the user is a co-teacher on the course (leader not included)
    async fn is_course_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> Result<bool>;
}

/// Content access. Reads exclude soft-deleted rows.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn insert_content(&self, content: Content) -> Result<Content>;

    async fn find_content(&self, id: Uuid) -> Result<Option<Content>>;

    /// Full-row update keyed by id
    async fn update_content(&self, content: Content) -> Result<Content>;

    async fn list_contents(
        &self,
        school_id: Uuid,
        creator_id: Option<Uuid>,
        status: Option<ContentStatus>,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Content>, u64)>;

    /// Soft delete; returns false when the row was already gone
    async fn soft_delete_content(&self, id: Uuid) -> Result<bool>;
}

/// Audit record access
#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn insert_audit(&self, audit: AuditRecord) -> Result<AuditRecord>;

    async fn find_audit(&self, id: Uuid) -> Result<Option<AuditRecord>>;

    async fn find_pending_audit_for_content(&self, content_id: Uuid)
        -> Result<Option<AuditRecord>>;

    async fn list_pending_audits(
        &self,
        school_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<AuditRecord>, u64)>;

    /// Atomically resolve a pending audit (conditional write on
    /// `status = pending`). Returns false when the record was already
    /// resolved — the caller surfaces that as a state error. This is the
    /// only double-processing guard in the system.
    async fn resolve_audit(
        &self,
        id: Uuid,
        to: AuditStatus,
        reviewer_id: Uuid,
        remark: Option<String>,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Content space access
#[async_trait]
pub trait SpaceRepo: Send + Sync {
    async fn insert_space(&self, space: ContentSpace) -> Result<ContentSpace>;

    async fn active_space_for_content(&self, content_id: Uuid) -> Result<Option<ContentSpace>>;

    async fn spaces_for_content(&self, content_id: Uuid) -> Result<Vec<ContentSpace>>;

    /// Deactivate every active placement; returns rows affected
    async fn deactivate_spaces_for_content(&self, content_id: Uuid) -> Result<u64>;

    async fn update_space_visibility(&self, space_id: Uuid, visibility: Visibility) -> Result<()>;
}

/// AI tool and grant access
#[async_trait]
pub trait ToolRepo: Send + Sync {
    async fn insert_tool(&self, tool: AiTool) -> Result<AiTool>;

    async fn find_tool_by_code(&self, code: &str) -> Result<Option<AiTool>>;

    async fn list_enabled_tools(&self) -> Result<Vec<AiTool>>;

    async fn insert_grant(&self, grant: SchoolToolGrant) -> Result<SchoolToolGrant>;

    async fn find_grant(&self, school_id: Uuid, tool_id: Uuid) -> Result<Option<SchoolToolGrant>>;
}

/// AI usage log access (append-only)
#[async_trait]
pub trait UsageRepo: Send + Sync {
    async fn insert_usage(&self, record: AiUsageRecord) -> Result<AiUsageRecord>;

    /// Count usage rows for (tool, school) created at or after `since`
    async fn count_usage_since(
        &self,
        tool_id: Uuid,
        school_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64>;

    /// Usage rows for a school, newest first (reporting surface)
    async fn list_usage(
        &self,
        school_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<AiUsageRecord>, u64)>;
}

/// Aggregate store: everything the core services need
pub trait Store:
    SchoolRepo + CourseRepo + ContentRepo + AuditRepo + SpaceRepo + ToolRepo + UsageRepo
{
}

impl<T> Store for T where
    T: SchoolRepo + CourseRepo + ContentRepo + AuditRepo + SpaceRepo + ToolRepo + UsageRepo
{
}
