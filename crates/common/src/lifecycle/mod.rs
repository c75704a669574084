//! Content lifecycle state machine
//!
//! Content moves draft -> pending -> {approved, rejected}. Submission
//! opens an audit record; resolution closes it and, on approval with a
//! course target, migrates the content's space from personal to course.
//! Every operation takes an explicit [`Principal`] — there is no ambient
//! request state in the core.

use crate::auth::Principal;
use crate::db::models::*;
use crate::db::{AuditRepo, ContentRepo, CourseRepo, SpaceRepo, Store};
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Content returned together with its active placement
#[derive(Debug, Clone)]
pub struct ContentWithSpace {
    pub content: Content,
    pub space: Option<ContentSpace>,
}

/// Service encapsulating all content state transitions
#[derive(Clone)]
pub struct ContentLifecycle {
    store: Arc<dyn Store>,
}

impl ContentLifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a draft content in the creator's personal space
    pub async fn create(
        &self,
        principal: &Principal,
        name: String,
        body: String,
        source: ContentSource,
    ) -> Result<Content> {
        let now = Utc::now();

        let content = self
            .store
            .insert_content(Content {
                id: Uuid::new_v4(),
                school_id: principal.school_id,
                creator_id: principal.user_id,
                name,
                body,
                status: ContentStatus::Draft,
                source,
                course_id: None,
                is_deleted: false,
                created_at: now.into(),
                updated_at: now.into(),
            })
            .await?;

        self.store
            .insert_space(ContentSpace {
                id: Uuid::new_v4(),
                content_id: content.id,
                kind: SpaceKind::Personal,
                owner_id: principal.user_id,
                visibility: Visibility::Private,
                is_active: true,
                created_at: now.into(),
            })
            .await?;

        let source_label = match content.source {
            ContentSource::Upload => "upload",
            ContentSource::AiGenerate => "ai_generate",
        };
        metrics::record_content_created(source_label);

        tracing::info!(
            content_id = %content.id,
            school_id = %principal.school_id,
            creator_id = %principal.user_id,
            "Content created"
        );

        Ok(content)
    }

    /// Fetch a content with its active space, enforcing tenant access
    pub async fn get(&self, principal: &Principal, content_id: Uuid) -> Result<ContentWithSpace> {
        let content = self.fetch_owned_by_school(principal, content_id).await?;
        let space = self.store.active_space_for_content(content_id).await?;

        Ok(ContentWithSpace { content, space })
    }

    /// List contents for the principal's school
    pub async fn list(
        &self,
        principal: &Principal,
        creator_id: Option<Uuid>,
        status: Option<ContentStatus>,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Content>, u64)> {
        self.store
            .list_contents(principal.school_id, creator_id, status, offset, limit)
            .await
    }

    /// Edit a draft's name/body. Only the creator may edit, and only
    /// while the content is in draft.
    pub async fn update_draft(
        &self,
        principal: &Principal,
        content_id: Uuid,
        name: Option<String>,
        body: Option<String>,
    ) -> Result<Content> {
        let mut content = self.fetch_owned_by_school(principal, content_id).await?;

        if content.creator_id != principal.user_id {
            return Err(AppError::Forbidden {
                message: "Only the creator may edit content".to_string(),
            });
        }

        if !content.is_editable() {
            return Err(AppError::InvalidTransition {
                message: format!("Content in status {:?} is not editable", content.status),
            });
        }

        if let Some(name) = name {
            content.name = name;
        }
        if let Some(body) = body {
            content.body = body;
        }
        content.updated_at = Utc::now().into();

        self.store.update_content(content).await
    }

    /// Soft-delete a content. Creator-only; content under audit must be
    /// resolved first.
    pub async fn delete(&self, principal: &Principal, content_id: Uuid) -> Result<()> {
        let content = self.fetch_owned_by_school(principal, content_id).await?;

        if content.creator_id != principal.user_id {
            return Err(AppError::Forbidden {
                message: "Only the creator may delete content".to_string(),
            });
        }

        if content.status == ContentStatus::Pending {
            return Err(AppError::InvalidTransition {
                message: "Content under audit cannot be deleted".to_string(),
            });
        }

        self.store.soft_delete_content(content_id).await?;
        Ok(())
    }

    /// Submit a draft for audit.
    ///
    /// Captures the optional course target and requested visibility on
    /// the audit record; they are applied when the record is approved.
    pub async fn submit(
        &self,
        principal: &Principal,
        content_id: Uuid,
        course_id: Option<Uuid>,
        visibility: Visibility,
    ) -> Result<AuditRecord> {
        let mut content = self.fetch_owned_by_school(principal, content_id).await?;

        if content.creator_id != principal.user_id {
            return Err(AppError::Forbidden {
                message: "Only the creator may submit content".to_string(),
            });
        }

        if content.status != ContentStatus::Draft {
            return Err(AppError::InvalidTransition {
                message: format!(
                    "Only draft content can be submitted, found {:?}",
                    content.status
                ),
            });
        }

        if self
            .store
            .find_pending_audit_for_content(content_id)
            .await?
            .is_some()
        {
            return Err(AppError::PendingAuditExists {
                content_id: content_id.to_string(),
            });
        }

        // Validate the promotion target up front so reviewers never see
        // an audit pointing at a foreign or missing course.
        let target_visibility = match course_id {
            Some(course_id) => {
                let course = self
                    .store
                    .find_course(course_id)
                    .await?
                    .ok_or_else(|| AppError::CourseNotFound {
                        id: course_id.to_string(),
                    })?;

                if course.school_id != principal.school_id {
                    return Err(AppError::SchoolMismatch);
                }

                if visibility == Visibility::Private {
                    return Err(AppError::Validation {
                        message: "Course placement requires public or leader visibility"
                            .to_string(),
                        field: Some("visibility".to_string()),
                    });
                }

                Some(visibility)
            }
            None => None,
        };

        let now = Utc::now();

        content.status = ContentStatus::Pending;
        content.updated_at = now.into();
        self.store.update_content(content).await?;

        let audit = self
            .store
            .insert_audit(AuditRecord {
                id: Uuid::new_v4(),
                content_id,
                school_id: principal.school_id,
                submitter_id: principal.user_id,
                status: AuditStatus::Pending,
                reviewer_id: None,
                remark: None,
                target_course_id: course_id,
                target_visibility,
                created_at: now.into(),
                resolved_at: None,
            })
            .await?;

        metrics::record_audit_submitted();

        tracing::info!(
            audit_id = %audit.id,
            content_id = %content_id,
            course_id = ?course_id,
            "Content submitted for audit"
        );

        Ok(audit)
    }

    /// Approve a pending audit.
    ///
    /// The pending -> approved flip is a conditional write; losing a
    /// race surfaces as [`AppError::AuditAlreadyResolved`].
    pub async fn approve(
        &self,
        principal: &Principal,
        audit_id: Uuid,
        remark: Option<String>,
    ) -> Result<AuditRecord> {
        principal.require_reviewer()?;

        let audit = self.fetch_audit_for_school(principal, audit_id).await?;
        let now = Utc::now();

        let claimed = self
            .store
            .resolve_audit(
                audit_id,
                AuditStatus::Approved,
                principal.user_id,
                remark,
                now,
            )
            .await?;

        if !claimed {
            return Err(AppError::AuditAlreadyResolved {
                id: audit_id.to_string(),
            });
        }

        let mut content = self
            .store
            .find_content(audit.content_id)
            .await?
            .ok_or_else(|| AppError::ContentNotFound {
                id: audit.content_id.to_string(),
            })?;

        content.status = ContentStatus::Approved;
        content.course_id = audit.target_course_id;
        content.updated_at = now.into();
        self.store.update_content(content).await?;

        if let Some(course_id) = audit.target_course_id {
            let visibility = audit.target_visibility.unwrap_or(Visibility::Leader);

            self.store
                .deactivate_spaces_for_content(audit.content_id)
                .await?;

            self.store
                .insert_space(ContentSpace {
                    id: Uuid::new_v4(),
                    content_id: audit.content_id,
                    kind: SpaceKind::Course,
                    owner_id: course_id,
                    visibility,
                    is_active: true,
                    created_at: now.into(),
                })
                .await?;
        }

        metrics::record_audit_resolved("approved");

        tracing::info!(
            audit_id = %audit_id,
            content_id = %audit.content_id,
            reviewer_id = %principal.user_id,
            "Audit approved"
        );

        self.refetch_audit(audit_id).await
    }

    /// Reject a pending audit. The content keeps its current space.
    pub async fn reject(
        &self,
        principal: &Principal,
        audit_id: Uuid,
        remark: Option<String>,
    ) -> Result<AuditRecord> {
        principal.require_reviewer()?;

        let audit = self.fetch_audit_for_school(principal, audit_id).await?;
        let now = Utc::now();

        let claimed = self
            .store
            .resolve_audit(
                audit_id,
                AuditStatus::Rejected,
                principal.user_id,
                remark,
                now,
            )
            .await?;

        if !claimed {
            return Err(AppError::AuditAlreadyResolved {
                id: audit_id.to_string(),
            });
        }

        let mut content = self
            .store
            .find_content(audit.content_id)
            .await?
            .ok_or_else(|| AppError::ContentNotFound {
                id: audit.content_id.to_string(),
            })?;

        content.status = ContentStatus::Rejected;
        content.updated_at = now.into();
        self.store.update_content(content).await?;

        metrics::record_audit_resolved("rejected");

        tracing::info!(
            audit_id = %audit_id,
            content_id = %audit.content_id,
            reviewer_id = %principal.user_id,
            "Audit rejected"
        );

        self.refetch_audit(audit_id).await
    }

    /// Change the visibility of a course-placed content.
    ///
    /// Allowed for the content creator, the course leader, or a course
    /// co-teacher. Only public and leader levels can be requested.
    pub async fn change_visibility(
        &self,
        principal: &Principal,
        content_id: Uuid,
        new_visibility: Visibility,
    ) -> Result<ContentSpace> {
        if new_visibility == Visibility::Private {
            return Err(AppError::Validation {
                message: "Visibility can only be changed to public or leader".to_string(),
                field: Some("visibility".to_string()),
            });
        }

        let content = self.fetch_owned_by_school(principal, content_id).await?;

        let space = self
            .store
            .active_space_for_content(content_id)
            .await?
            .filter(|s| s.kind == SpaceKind::Course)
            .ok_or_else(|| AppError::InvalidTransition {
                message: "Content is not placed in a course space".to_string(),
            })?;

        let course = self
            .store
            .find_course(space.owner_id)
            .await?
            .ok_or_else(|| AppError::CourseNotFound {
                id: space.owner_id.to_string(),
            })?;

        let permitted = content.creator_id == principal.user_id
            || course.leader_id == principal.user_id
            || self
                .store
                .is_course_teacher(course.id, principal.user_id)
                .await?;

        if !permitted {
            return Err(AppError::Forbidden {
                message: "Only the creator, course leader, or a co-teacher may change visibility"
                    .to_string(),
            });
        }

        self.store
            .update_space_visibility(space.id, new_visibility)
            .await?;

        tracing::info!(
            content_id = %content_id,
            space_id = %space.id,
            visibility = ?new_visibility,
            "Content visibility changed"
        );

        Ok(ContentSpace {
            visibility: new_visibility,
            ..space
        })
    }

    /// Reviewer worklist: pending audits for the principal's school
    pub async fn list_pending_audits(
        &self,
        principal: &Principal,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<AuditRecord>, u64)> {
        principal.require_reviewer()?;

        self.store
            .list_pending_audits(principal.school_id, offset, limit)
            .await
    }

    async fn fetch_owned_by_school(
        &self,
        principal: &Principal,
        content_id: Uuid,
    ) -> Result<Content> {
        let content = self
            .store
            .find_content(content_id)
            .await?
            .ok_or_else(|| AppError::ContentNotFound {
                id: content_id.to_string(),
            })?;

        if content.school_id != principal.school_id {
            return Err(AppError::SchoolMismatch);
        }

        Ok(content)
    }

    async fn fetch_audit_for_school(
        &self,
        principal: &Principal,
        audit_id: Uuid,
    ) -> Result<AuditRecord> {
        let audit = self
            .store
            .find_audit(audit_id)
            .await?
            .ok_or_else(|| AppError::AuditNotFound {
                id: audit_id.to_string(),
            })?;

        if audit.school_id != principal.school_id {
            return Err(AppError::SchoolMismatch);
        }

        Ok(audit)
    }

    async fn refetch_audit(&self, audit_id: Uuid) -> Result<AuditRecord> {
        self.store
            .find_audit(audit_id)
            .await?
            .ok_or_else(|| AppError::AuditNotFound {
                id: audit_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::MemoryStore;

    struct Fixture {
        lifecycle: ContentLifecycle,
        store: Arc<MemoryStore>,
        teacher: Principal,
        reviewer: Principal,
        course_id: Uuid,
        leader_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let school_id = Uuid::new_v4();
        let leader_id = Uuid::new_v4();
        let course_id = Uuid::new_v4();

        store
            .insert_course(Course {
                id: course_id,
                school_id,
                name: "Algebra I".to_string(),
                leader_id,
                created_at: Utc::now().into(),
            })
            .await
            .unwrap();

        let teacher = Principal {
            user_id: Uuid::new_v4(),
            school_id,
            role: Role::Teacher,
            request_id: "test".to_string(),
        };

        let reviewer = Principal {
            user_id: Uuid::new_v4(),
            school_id,
            role: Role::Reviewer,
            request_id: "test".to_string(),
        };

        Fixture {
            lifecycle: ContentLifecycle::new(store.clone()),
            store,
            teacher,
            reviewer,
            course_id,
            leader_id,
        }
    }

    async fn draft(fx: &Fixture) -> Content {
        fx.lifecycle
            .create(
                &fx.teacher,
                "Fractions worksheet".to_string(),
                "1/2 + 1/4 = ?".to_string(),
                ContentSource::Upload,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_places_content_in_personal_space() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        assert_eq!(content.status, ContentStatus::Draft);

        let space = fx
            .store
            .active_space_for_content(content.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(space.kind, SpaceKind::Personal);
        assert_eq!(space.owner_id, fx.teacher.user_id);
        assert_eq!(space.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn submit_moves_draft_to_pending_with_one_audit() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let audit = fx
            .lifecycle
            .submit(&fx.teacher, content.id, None, Visibility::Private)
            .await
            .unwrap();

        assert_eq!(audit.status, AuditStatus::Pending);
        assert_eq!(audit.submitter_id, fx.teacher.user_id);

        let content = fx.store.find_content(content.id).await.unwrap().unwrap();
        assert_eq!(content.status, ContentStatus::Pending);

        let pending = fx
            .store
            .find_pending_audit_for_content(content.id)
            .await
            .unwrap();
        assert!(pending.is_some());
    }

    #[tokio::test]
    async fn submit_fails_unless_draft() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        fx.lifecycle
            .submit(&fx.teacher, content.id, None, Visibility::Private)
            .await
            .unwrap();

        // Second submit: content is pending now
        let err = fx
            .lifecycle
            .submit(&fx.teacher, content.id, None, Visibility::Private)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn submit_rejects_foreign_course() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let foreign_course = Uuid::new_v4();
        let err = fx
            .lifecycle
            .submit(
                &fx.teacher,
                content.id,
                Some(foreign_course),
                Visibility::Public,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CourseNotFound { .. }));
    }

    #[tokio::test]
    async fn approve_with_course_target_migrates_space() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let audit = fx
            .lifecycle
            .submit(
                &fx.teacher,
                content.id,
                Some(fx.course_id),
                Visibility::Public,
            )
            .await
            .unwrap();

        let resolved = fx
            .lifecycle
            .approve(&fx.reviewer, audit.id, Some("Looks good".to_string()))
            .await
            .unwrap();

        assert_eq!(resolved.status, AuditStatus::Approved);
        assert_eq!(resolved.reviewer_id, Some(fx.reviewer.user_id));
        assert!(resolved.resolved_at.is_some());

        let content = fx.store.find_content(content.id).await.unwrap().unwrap();
        assert_eq!(content.status, ContentStatus::Approved);
        assert_eq!(content.course_id, Some(fx.course_id));

        // Active space is the course placement with requested visibility
        let active = fx
            .store
            .active_space_for_content(content.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.kind, SpaceKind::Course);
        assert_eq!(active.owner_id, fx.course_id);
        assert_eq!(active.visibility, Visibility::Public);

        // The old personal space is deactivated, never deleted
        let spaces = fx.store.spaces_for_content(content.id).await.unwrap();
        assert_eq!(spaces.len(), 2);
        let personal = spaces
            .iter()
            .find(|s| s.kind == SpaceKind::Personal)
            .unwrap();
        assert!(!personal.is_active);
    }

    #[tokio::test]
    async fn approve_twice_fails_with_state_error() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let audit = fx
            .lifecycle
            .submit(&fx.teacher, content.id, None, Visibility::Private)
            .await
            .unwrap();

        fx.lifecycle
            .approve(&fx.reviewer, audit.id, None)
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .approve(&fx.reviewer, audit.id, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AuditAlreadyResolved { .. }));
    }

    #[tokio::test]
    async fn reject_keeps_content_in_personal_space() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let audit = fx
            .lifecycle
            .submit(
                &fx.teacher,
                content.id,
                Some(fx.course_id),
                Visibility::Public,
            )
            .await
            .unwrap();

        let resolved = fx
            .lifecycle
            .reject(&fx.reviewer, audit.id, Some("Needs sources".to_string()))
            .await
            .unwrap();

        assert_eq!(resolved.status, AuditStatus::Rejected);

        let content = fx.store.find_content(content.id).await.unwrap().unwrap();
        assert_eq!(content.status, ContentStatus::Rejected);
        assert_eq!(content.course_id, None);

        let active = fx
            .store
            .active_space_for_content(content.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.kind, SpaceKind::Personal);
    }

    #[tokio::test]
    async fn approve_requires_reviewer_role() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let audit = fx
            .lifecycle
            .submit(&fx.teacher, content.id, None, Visibility::Private)
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .approve(&fx.teacher, audit.id, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn update_draft_rejected_after_submit() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        fx.lifecycle
            .submit(&fx.teacher, content.id, None, Visibility::Private)
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .update_draft(
                &fx.teacher,
                content.id,
                Some("New name".to_string()),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn change_visibility_permissions() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let audit = fx
            .lifecycle
            .submit(
                &fx.teacher,
                content.id,
                Some(fx.course_id),
                Visibility::Leader,
            )
            .await
            .unwrap();
        fx.lifecycle
            .approve(&fx.reviewer, audit.id, None)
            .await
            .unwrap();

        // A random teacher in the same school: denied
        let outsider = Principal {
            user_id: Uuid::new_v4(),
            school_id: fx.teacher.school_id,
            role: Role::Teacher,
            request_id: "test".to_string(),
        };
        let err = fx
            .lifecycle
            .change_visibility(&outsider, content.id, Visibility::Public)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        // The course leader: allowed
        let leader = Principal {
            user_id: fx.leader_id,
            school_id: fx.teacher.school_id,
            role: Role::Teacher,
            request_id: "test".to_string(),
        };
        let space = fx
            .lifecycle
            .change_visibility(&leader, content.id, Visibility::Public)
            .await
            .unwrap();
        assert_eq!(space.visibility, Visibility::Public);

        // A co-teacher: allowed
        let co_teacher = Principal {
            user_id: Uuid::new_v4(),
            school_id: fx.teacher.school_id,
            role: Role::Teacher,
            request_id: "test".to_string(),
        };
        fx.store
            .add_course_teacher(fx.course_id, co_teacher.user_id)
            .await
            .unwrap();
        let space = fx
            .lifecycle
            .change_visibility(&co_teacher, content.id, Visibility::Leader)
            .await
            .unwrap();
        assert_eq!(space.visibility, Visibility::Leader);
    }

    #[tokio::test]
    async fn change_visibility_requires_course_space() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let err = fx
            .lifecycle
            .change_visibility(&fx.teacher, content.id, Visibility::Public)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn change_visibility_to_private_is_invalid() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let err = fx
            .lifecycle
            .change_visibility(&fx.teacher, content.id, Visibility::Private)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn tenant_isolation_on_get() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let other_school = Principal {
            user_id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            role: Role::Teacher,
            request_id: "test".to_string(),
        };

        let err = fx.lifecycle.get(&other_school, content.id).await.unwrap_err();
        assert!(matches!(err, AppError::SchoolMismatch));
    }

    #[tokio::test]
    async fn delete_is_soft_and_creator_only() {
        let fx = fixture().await;
        let content = draft(&fx).await;

        let outsider = Principal {
            user_id: Uuid::new_v4(),
            school_id: fx.teacher.school_id,
            role: Role::Teacher,
            request_id: "test".to_string(),
        };
        let err = fx.lifecycle.delete(&outsider, content.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        fx.lifecycle.delete(&fx.teacher, content.id).await.unwrap();

        // Soft-deleted content is invisible to reads
        assert!(fx
            .store
            .find_content(content.id)
            .await
            .unwrap()
            .is_none());
    }
}
