//! In-memory store for tests and local development
//!
//! Implements the repository traits over process-local vectors guarded
//! by a single RwLock, so conditional writes keep the same atomicity
//! the SQL implementation gets from the database.

use crate::db::models::*;
use crate::db::store::*;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    schools: Vec<School>,
    courses: Vec<Course>,
    course_teachers: Vec<CourseTeacher>,
    contents: Vec<Content>,
    audits: Vec<AuditRecord>,
    spaces: Vec<ContentSpace>,
    tools: Vec<AiTool>,
    grants: Vec<SchoolToolGrant>,
    usage: Vec<AiUsageRecord>,
}

/// Process-local implementation of the repository traits
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchoolRepo for MemoryStore {
    async fn insert_school(&self, school: School) -> Result<School> {
        let mut inner = self.inner.write().await;
        inner.schools.push(school.clone());
        Ok(school)
    }

    async fn find_school(&self, id: Uuid) -> Result<Option<School>> {
        let inner = self.inner.read().await;
        Ok(inner.schools.iter().find(|s| s.id == id).cloned())
    }

    async fn find_school_by_api_key_hash(&self, hash: &str) -> Result<Option<School>> {
        let inner = self.inner.read().await;
        Ok(inner
            .schools
            .iter()
            .find(|s| s.api_key_hash == hash && s.is_active)
            .cloned())
    }
}

#[async_trait]
impl CourseRepo for MemoryStore {
    async fn insert_course(&self, course: Course) -> Result<Course> {
        let mut inner = self.inner.write().await;
        inner.courses.push(course.clone());
        Ok(course)
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>> {
        let inner = self.inner.read().await;
        Ok(inner.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn add_course_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.course_teachers.push(CourseTeacher {
            course_id,
            teacher_id,
            created_at: Utc::now().into(),
        });
        Ok(())
    }

    async fn is_course_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .course_teachers
            .iter()
            .any(|ct| ct.course_id == course_id && ct.teacher_id == teacher_id))
    }
}

#[async_trait]
impl ContentRepo for MemoryStore {
    async fn insert_content(&self, content: Content) -> Result<Content> {
        let mut inner = self.inner.write().await;
        inner.contents.push(content.clone());
        Ok(content)
    }

    async fn find_content(&self, id: Uuid) -> Result<Option<Content>> {
        let inner = self.inner.read().await;
        Ok(inner
            .contents
            .iter()
            .find(|c| c.id == id && !c.is_deleted)
            .cloned())
    }

    async fn update_content(&self, content: Content) -> Result<Content> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .contents
            .iter_mut()
            .find(|c| c.id == content.id)
            .ok_or_else(|| AppError::ContentNotFound {
                id: content.id.to_string(),
            })?;
        *slot = content.clone();
        Ok(content)
    }

    async fn list_contents(
        &self,
        school_id: Uuid,
        creator_id: Option<Uuid>,
        status: Option<ContentStatus>,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Content>, u64)> {
        let inner = self.inner.read().await;

        let mut matched: Vec<Content> = inner
            .contents
            .iter()
            .filter(|c| c.school_id == school_id && !c.is_deleted)
            .filter(|c| creator_id.map_or(true, |u| c.creator_id == u))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit.max(1) as usize)
            .collect();

        Ok((page, total))
    }

    async fn soft_delete_content(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner
            .contents
            .iter_mut()
            .find(|c| c.id == id && !c.is_deleted)
        {
            Some(content) => {
                content.is_deleted = true;
                content.updated_at = Utc::now().into();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AuditRepo for MemoryStore {
    async fn insert_audit(&self, audit: AuditRecord) -> Result<AuditRecord> {
        let mut inner = self.inner.write().await;
        inner.audits.push(audit.clone());
        Ok(audit)
    }

    async fn find_audit(&self, id: Uuid) -> Result<Option<AuditRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.audits.iter().find(|a| a.id == id).cloned())
    }

    async fn find_pending_audit_for_content(
        &self,
        content_id: Uuid,
    ) -> Result<Option<AuditRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .audits
            .iter()
            .find(|a| a.content_id == content_id && a.status == AuditStatus::Pending)
            .cloned())
    }

    async fn list_pending_audits(
        &self,
        school_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<AuditRecord>, u64)> {
        let inner = self.inner.read().await;

        let mut matched: Vec<AuditRecord> = inner
            .audits
            .iter()
            .filter(|a| a.school_id == school_id && a.status == AuditStatus::Pending)
            .cloned()
            .collect();

        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit.max(1) as usize)
            .collect();

        Ok((page, total))
    }

    async fn resolve_audit(
        &self,
        id: Uuid,
        to: AuditStatus,
        reviewer_id: Uuid,
        remark: Option<String>,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Status check and mutation happen under one write lock, matching
        // the conditional-UPDATE semantics of the SQL implementation.
        let mut inner = self.inner.write().await;
        match inner
            .audits
            .iter_mut()
            .find(|a| a.id == id && a.status == AuditStatus::Pending)
        {
            Some(audit) => {
                audit.status = to;
                audit.reviewer_id = Some(reviewer_id);
                audit.remark = remark;
                audit.resolved_at = Some(resolved_at.into());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SpaceRepo for MemoryStore {
    async fn insert_space(&self, space: ContentSpace) -> Result<ContentSpace> {
        let mut inner = self.inner.write().await;
        inner.spaces.push(space.clone());
        Ok(space)
    }

    async fn active_space_for_content(&self, content_id: Uuid) -> Result<Option<ContentSpace>> {
        let inner = self.inner.read().await;
        Ok(inner
            .spaces
            .iter()
            .find(|s| s.content_id == content_id && s.is_active)
            .cloned())
    }

    async fn spaces_for_content(&self, content_id: Uuid) -> Result<Vec<ContentSpace>> {
        let inner = self.inner.read().await;
        let mut spaces: Vec<ContentSpace> = inner
            .spaces
            .iter()
            .filter(|s| s.content_id == content_id)
            .cloned()
            .collect();
        spaces.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(spaces)
    }

    async fn deactivate_spaces_for_content(&self, content_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut affected = 0;
        for space in inner
            .spaces
            .iter_mut()
            .filter(|s| s.content_id == content_id && s.is_active)
        {
            space.is_active = false;
            affected += 1;
        }
        Ok(affected)
    }

    async fn update_space_visibility(&self, space_id: Uuid, visibility: Visibility) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(space) = inner.spaces.iter_mut().find(|s| s.id == space_id) {
            space.visibility = visibility;
        }
        Ok(())
    }
}

#[async_trait]
impl ToolRepo for MemoryStore {
    async fn insert_tool(&self, tool: AiTool) -> Result<AiTool> {
        let mut inner = self.inner.write().await;
        inner.tools.push(tool.clone());
        Ok(tool)
    }

    async fn find_tool_by_code(&self, code: &str) -> Result<Option<AiTool>> {
        let inner = self.inner.read().await;
        Ok(inner.tools.iter().find(|t| t.code == code).cloned())
    }

    async fn list_enabled_tools(&self) -> Result<Vec<AiTool>> {
        let inner = self.inner.read().await;
        let mut tools: Vec<AiTool> = inner.tools.iter().filter(|t| t.is_enabled).cloned().collect();
        tools.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(tools)
    }

    async fn insert_grant(&self, grant: SchoolToolGrant) -> Result<SchoolToolGrant> {
        let mut inner = self.inner.write().await;
        inner.grants.push(grant.clone());
        Ok(grant)
    }

    async fn find_grant(&self, school_id: Uuid, tool_id: Uuid) -> Result<Option<SchoolToolGrant>> {
        let inner = self.inner.read().await;
        Ok(inner
            .grants
            .iter()
            .find(|g| g.school_id == school_id && g.tool_id == tool_id)
            .cloned())
    }
}

#[async_trait]
impl UsageRepo for MemoryStore {
    async fn insert_usage(&self, record: AiUsageRecord) -> Result<AiUsageRecord> {
        let mut inner = self.inner.write().await;
        inner.usage.push(record.clone());
        Ok(record)
    }

    async fn count_usage_since(
        &self,
        tool_id: Uuid,
        school_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let inner = self.inner.read().await;
        let since: chrono::DateTime<chrono::FixedOffset> = since.into();
        Ok(inner
            .usage
            .iter()
            .filter(|u| u.tool_id == tool_id && u.school_id == school_id && u.created_at >= since)
            .count() as u64)
    }

    async fn list_usage(
        &self,
        school_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<AiUsageRecord>, u64)> {
        let inner = self.inner.read().await;

        let mut matched: Vec<AiUsageRecord> = inner
            .usage
            .iter()
            .filter(|u| u.school_id == school_id)
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit.max(1) as usize)
            .collect();

        Ok((page, total))
    }
}
