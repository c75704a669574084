//! Audit workflow handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use classforge_common::{
    auth::Principal,
    db::models::{AuditRecord, AuditStatus, Visibility},
    errors::Result,
};

/// Reviewer decision payload
#[derive(Debug, Default, Deserialize)]
pub struct ResolveAuditRequest {
    #[serde(default)]
    pub remark: Option<String>,
}

/// Pagination for the pending worklist
#[derive(Debug, Deserialize)]
pub struct ListAuditsParams {
    #[serde(default)]
    pub offset: u64,

    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    20
}

#[derive(Serialize)]
pub struct AuditResponse {
    pub id: Uuid,
    pub content_id: Uuid,
    pub submitter_id: Uuid,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_course_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_visibility: Option<Visibility>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

impl From<AuditRecord> for AuditResponse {
    fn from(audit: AuditRecord) -> Self {
        Self {
            id: audit.id,
            content_id: audit.content_id,
            submitter_id: audit.submitter_id,
            status: audit.status,
            reviewer_id: audit.reviewer_id,
            remark: audit.remark,
            target_course_id: audit.target_course_id,
            target_visibility: audit.target_visibility,
            created_at: audit.created_at.to_rfc3339(),
            resolved_at: audit.resolved_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

#[derive(Serialize)]
pub struct AuditListResponse {
    pub items: Vec<AuditResponse>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Reviewer worklist: pending audits for the caller's school
pub async fn list_pending(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListAuditsParams>,
) -> Result<Json<AuditListResponse>> {
    let limit = params.limit.clamp(1, 100);

    let (audits, total) = state
        .lifecycle
        .list_pending_audits(&principal, params.offset, limit)
        .await?;

    Ok(Json(AuditListResponse {
        items: audits.into_iter().map(Into::into).collect(),
        total,
        offset: params.offset,
        limit,
    }))
}

/// Approve a pending audit
pub async fn approve(
    State(state): State<AppState>,
    principal: Principal,
    Path(audit_id): Path<Uuid>,
    Json(request): Json<ResolveAuditRequest>,
) -> Result<Json<AuditResponse>> {
    let audit = state
        .lifecycle
        .approve(&principal, audit_id, request.remark)
        .await?;

    Ok(Json(audit.into()))
}

/// Reject a pending audit
pub async fn reject(
    State(state): State<AppState>,
    principal: Principal,
    Path(audit_id): Path<Uuid>,
    Json(request): Json<ResolveAuditRequest>,
) -> Result<Json<AuditResponse>> {
    let audit = state
        .lifecycle
        .reject(&principal, audit_id, request.remark)
        .await?;

    Ok(Json(audit.into()))
}
