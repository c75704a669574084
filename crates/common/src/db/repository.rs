//! SeaORM repository for database operations
//!
//! Postgres implementation of the repository traits with proper error
//! handling. Writes go to the primary connection, reads prefer the
//! replica.

use crate::db::models::*;
use crate::db::store::*;
use crate::db::DbPool;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[async_trait]
impl SchoolRepo for Repository {
    async fn insert_school(&self, school: School) -> Result<School> {
        let active = school.into_active_model().reset_all();
        active.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn find_school(&self, id: Uuid) -> Result<Option<School>> {
        SchoolEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_school_by_api_key_hash(&self, hash: &str) -> Result<Option<School>> {
        SchoolEntity::find()
            .filter(SchoolColumn::ApiKeyHash.eq(hash))
            .filter(SchoolColumn::IsActive.eq(true))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl CourseRepo for Repository {
    async fn insert_course(&self, course: Course) -> Result<Course> {
        let active = course.into_active_model().reset_all();
        active.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<Course>> {
        CourseEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn add_course_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> Result<()> {
        let active = CourseTeacher {
            course_id,
            teacher_id,
            created_at: Utc::now().into(),
        }
        .into_active_model()
        .reset_all();
        active.insert(self.write_conn()).await?;
        Ok(())
    }

    async fn is_course_teacher(&self, course_id: Uuid, teacher_id: Uuid) -> Result<bool> {
        let count = CourseTeacherEntity::find()
            .filter(CourseTeacherColumn::CourseId.eq(course_id))
            .filter(CourseTeacherColumn::TeacherId.eq(teacher_id))
            .count(self.read_conn())
            .await?;

        Ok(count > 0)
    }
}

#[async_trait]
impl ContentRepo for Repository {
    async fn insert_content(&self, content: Content) -> Result<Content> {
        let active = content.into_active_model().reset_all();
        active.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn find_content(&self, id: Uuid) -> Result<Option<Content>> {
        ContentEntity::find_by_id(id)
            .filter(ContentColumn::IsDeleted.eq(false))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn update_content(&self, content: Content) -> Result<Content> {
        let active = content.into_active_model().reset_all();
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    async fn list_contents(
        &self,
        school_id: Uuid,
        creator_id: Option<Uuid>,
        status: Option<ContentStatus>,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Content>, u64)> {
        let limit = limit.max(1);

        let mut query = ContentEntity::find()
            .filter(ContentColumn::SchoolId.eq(school_id))
            .filter(ContentColumn::IsDeleted.eq(false));

        if let Some(creator) = creator_id {
            query = query.filter(ContentColumn::CreatorId.eq(creator));
        }

        if let Some(status) = status {
            query = query.filter(ContentColumn::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(ContentColumn::CreatedAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let contents = paginator.fetch_page(offset / limit).await?;

        Ok((contents, total))
    }

    async fn soft_delete_content(&self, id: Uuid) -> Result<bool> {
        let result = ContentEntity::update_many()
            .col_expr(ContentColumn::IsDeleted, Expr::value(true))
            .col_expr(
                ContentColumn::UpdatedAt,
                Expr::value(sea_orm::Value::from(Utc::now())),
            )
            .filter(ContentColumn::Id.eq(id))
            .filter(ContentColumn::IsDeleted.eq(false))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl AuditRepo for Repository {
    async fn insert_audit(&self, audit: AuditRecord) -> Result<AuditRecord> {
        let active = audit.into_active_model().reset_all();
        active.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn find_audit(&self, id: Uuid) -> Result<Option<AuditRecord>> {
        AuditRecordEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_pending_audit_for_content(
        &self,
        content_id: Uuid,
    ) -> Result<Option<AuditRecord>> {
        AuditRecordEntity::find()
            .filter(AuditRecordColumn::ContentId.eq(content_id))
            .filter(AuditRecordColumn::Status.eq(AuditStatus::Pending))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn list_pending_audits(
        &self,
        school_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<AuditRecord>, u64)> {
        let limit = limit.max(1);

        let paginator = AuditRecordEntity::find()
            .filter(AuditRecordColumn::SchoolId.eq(school_id))
            .filter(AuditRecordColumn::Status.eq(AuditStatus::Pending))
            .order_by_asc(AuditRecordColumn::CreatedAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let audits = paginator.fetch_page(offset / limit).await?;

        Ok((audits, total))
    }

    async fn resolve_audit(
        &self,
        id: Uuid,
        to: AuditStatus,
        reviewer_id: Uuid,
        remark: Option<String>,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Conditional update: the `status = pending` filter makes the
        // write a compare-and-swap, so exactly one of two racing
        // resolutions can claim the record.
        let result = AuditRecordEntity::update_many()
            .col_expr(AuditRecordColumn::Status, Expr::value(to))
            .col_expr(AuditRecordColumn::ReviewerId, Expr::value(Some(reviewer_id)))
            .col_expr(AuditRecordColumn::Remark, Expr::value(remark))
            .col_expr(
                AuditRecordColumn::ResolvedAt,
                Expr::value(sea_orm::Value::from(Some(resolved_at))),
            )
            .filter(AuditRecordColumn::Id.eq(id))
            .filter(AuditRecordColumn::Status.eq(AuditStatus::Pending))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl SpaceRepo for Repository {
    async fn insert_space(&self, space: ContentSpace) -> Result<ContentSpace> {
        let active = space.into_active_model().reset_all();
        active.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn active_space_for_content(&self, content_id: Uuid) -> Result<Option<ContentSpace>> {
        ContentSpaceEntity::find()
            .filter(ContentSpaceColumn::ContentId.eq(content_id))
            .filter(ContentSpaceColumn::IsActive.eq(true))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn spaces_for_content(&self, content_id: Uuid) -> Result<Vec<ContentSpace>> {
        ContentSpaceEntity::find()
            .filter(ContentSpaceColumn::ContentId.eq(content_id))
            .order_by_asc(ContentSpaceColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn deactivate_spaces_for_content(&self, content_id: Uuid) -> Result<u64> {
        let result = ContentSpaceEntity::update_many()
            .col_expr(ContentSpaceColumn::IsActive, Expr::value(false))
            .filter(ContentSpaceColumn::ContentId.eq(content_id))
            .filter(ContentSpaceColumn::IsActive.eq(true))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected)
    }

    async fn update_space_visibility(&self, space_id: Uuid, visibility: Visibility) -> Result<()> {
        ContentSpaceEntity::update_many()
            .col_expr(ContentSpaceColumn::Visibility, Expr::value(visibility))
            .filter(ContentSpaceColumn::Id.eq(space_id))
            .exec(self.write_conn())
            .await?;

        Ok(())
    }
}

#[async_trait]
impl ToolRepo for Repository {
    async fn insert_tool(&self, tool: AiTool) -> Result<AiTool> {
        let active = tool.into_active_model().reset_all();
        active.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn find_tool_by_code(&self, code: &str) -> Result<Option<AiTool>> {
        AiToolEntity::find()
            .filter(AiToolColumn::Code.eq(code))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn list_enabled_tools(&self) -> Result<Vec<AiTool>> {
        AiToolEntity::find()
            .filter(AiToolColumn::IsEnabled.eq(true))
            .order_by_asc(AiToolColumn::Code)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_grant(&self, grant: SchoolToolGrant) -> Result<SchoolToolGrant> {
        let active = grant.into_active_model().reset_all();
        active.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn find_grant(&self, school_id: Uuid, tool_id: Uuid) -> Result<Option<SchoolToolGrant>> {
        SchoolToolGrantEntity::find()
            .filter(SchoolToolGrantColumn::SchoolId.eq(school_id))
            .filter(SchoolToolGrantColumn::ToolId.eq(tool_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl UsageRepo for Repository {
    async fn insert_usage(&self, record: AiUsageRecord) -> Result<AiUsageRecord> {
        let active = record.into_active_model().reset_all();
        active.insert(self.write_conn()).await.map_err(Into::into)
    }

    async fn count_usage_since(
        &self,
        tool_id: Uuid,
        school_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        AiUsageRecordEntity::find()
            .filter(AiUsageRecordColumn::ToolId.eq(tool_id))
            .filter(AiUsageRecordColumn::SchoolId.eq(school_id))
            .filter(AiUsageRecordColumn::CreatedAt.gte(since))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn list_usage(
        &self,
        school_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<AiUsageRecord>, u64)> {
        let limit = limit.max(1);

        let paginator = AiUsageRecordEntity::find()
            .filter(AiUsageRecordColumn::SchoolId.eq(school_id))
            .order_by_desc(AiUsageRecordColumn::CreatedAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(offset / limit).await?;

        Ok((records, total))
    }
}
