//! Content management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use classforge_common::{
    auth::Principal,
    db::models::{Content, ContentSource, ContentSpace, ContentStatus, SpaceKind, Visibility},
    errors::{AppError, Result},
};

/// Request to create a new content draft
#[derive(Debug, Deserialize, Validate)]
pub struct CreateContentRequest {
    #[validate(length(min = 1, max = 500))]
    pub name: String,

    #[validate(length(min = 1, max = 200000))]
    pub body: String,
}

/// Request to edit a draft
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContentRequest {
    #[validate(length(min = 1, max = 500))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 200000))]
    pub body: Option<String>,
}

/// Request to submit a draft for audit
#[derive(Debug, Deserialize)]
pub struct SubmitContentRequest {
    #[serde(default)]
    pub course_id: Option<Uuid>,

    #[serde(default)]
    pub visibility: Visibility,
}

/// Request to change a course placement's visibility
#[derive(Debug, Deserialize)]
pub struct ChangeVisibilityRequest {
    pub visibility: Visibility,
}

/// Pagination and filters for content listing
#[derive(Debug, Deserialize)]
pub struct ListContentsParams {
    #[serde(default)]
    pub offset: u64,

    #[serde(default = "default_limit")]
    pub limit: u64,

    #[serde(default)]
    pub status: Option<ContentStatus>,

    /// Restrict to the caller's own content
    #[serde(default)]
    pub mine: bool,
}

fn default_limit() -> u64 {
    20
}

#[derive(Serialize)]
pub struct SpaceResponse {
    pub kind: SpaceKind,
    pub owner_id: Uuid,
    pub visibility: Visibility,
}

impl From<ContentSpace> for SpaceResponse {
    fn from(space: ContentSpace) -> Self {
        Self {
            kind: space.kind,
            owner_id: space.owner_id,
            visibility: space.visibility,
        }
    }
}

#[derive(Serialize)]
pub struct ContentResponse {
    pub id: Uuid,
    pub name: String,
    pub body: String,
    pub status: ContentStatus,
    pub source: ContentSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<Uuid>,
    pub creator_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<SpaceResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl ContentResponse {
    fn from_content(content: Content, space: Option<ContentSpace>) -> Self {
        Self {
            id: content.id,
            name: content.name,
            body: content.body,
            status: content.status,
            source: content.source,
            course_id: content.course_id,
            creator_id: content.creator_id,
            space: space.map(Into::into),
            created_at: content.created_at.to_rfc3339(),
            updated_at: content.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct ContentListResponse {
    pub items: Vec<ContentResponse>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Response after submitting a content for audit
#[derive(Serialize)]
pub struct SubmitContentResponse {
    pub audit_id: Uuid,
    pub content_id: Uuid,
    pub status: String,
}

/// Create a new draft content
pub async fn create_content(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateContentRequest>,
) -> Result<(StatusCode, Json<ContentResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let content = state
        .lifecycle
        .create(&principal, request.name, request.body, ContentSource::Upload)
        .await?;

    let with_space = state.lifecycle.get(&principal, content.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ContentResponse::from_content(
            with_space.content,
            with_space.space,
        )),
    ))
}

/// Get a content by ID
pub async fn get_content(
    State(state): State<AppState>,
    principal: Principal,
    Path(content_id): Path<Uuid>,
) -> Result<Json<ContentResponse>> {
    let with_space = state.lifecycle.get(&principal, content_id).await?;

    Ok(Json(ContentResponse::from_content(
        with_space.content,
        with_space.space,
    )))
}

/// List contents for the caller's school
pub async fn list_contents(
    State(state): State<AppState>,
    principal: Principal,
    Query(params): Query<ListContentsParams>,
) -> Result<Json<ContentListResponse>> {
    let creator = params.mine.then_some(principal.user_id);
    let limit = params.limit.clamp(1, 100);

    let (contents, total) = state
        .lifecycle
        .list(&principal, creator, params.status, params.offset, limit)
        .await?;

    Ok(Json(ContentListResponse {
        items: contents
            .into_iter()
            .map(|c| ContentResponse::from_content(c, None))
            .collect(),
        total,
        offset: params.offset,
        limit,
    }))
}

/// Edit a draft content
pub async fn update_content(
    State(state): State<AppState>,
    principal: Principal,
    Path(content_id): Path<Uuid>,
    Json(request): Json<UpdateContentRequest>,
) -> Result<Json<ContentResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let content = state
        .lifecycle
        .update_draft(&principal, content_id, request.name, request.body)
        .await?;

    Ok(Json(ContentResponse::from_content(content, None)))
}

/// Soft-delete a content
pub async fn delete_content(
    State(state): State<AppState>,
    principal: Principal,
    Path(content_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.lifecycle.delete(&principal, content_id).await?;

    tracing::info!(
        content_id = %content_id,
        school_id = %principal.school_id,
        "Content deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Submit a draft for audit
pub async fn submit_content(
    State(state): State<AppState>,
    principal: Principal,
    Path(content_id): Path<Uuid>,
    Json(request): Json<SubmitContentRequest>,
) -> Result<(StatusCode, Json<SubmitContentResponse>)> {
    let audit = state
        .lifecycle
        .submit(&principal, content_id, request.course_id, request.visibility)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitContentResponse {
            audit_id: audit.id,
            content_id: audit.content_id,
            status: "pending".to_string(),
        }),
    ))
}

/// Change the visibility of a course-placed content
pub async fn change_visibility(
    State(state): State<AppState>,
    principal: Principal,
    Path(content_id): Path<Uuid>,
    Json(request): Json<ChangeVisibilityRequest>,
) -> Result<Json<SpaceResponse>> {
    let space = state
        .lifecycle
        .change_visibility(&principal, content_id, request.visibility)
        .await?;

    Ok(Json(space.into()))
}
