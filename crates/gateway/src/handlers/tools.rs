//! AI tool handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use classforge_common::{
    auth::Principal,
    db::models::ContentSource,
    errors::Result,
};

/// Request to run an AI tool
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub params: serde_json::Value,

    /// When set, the generated text is saved as a draft content with
    /// this name
    #[serde(default)]
    pub save_as: Option<String>,
}

#[derive(Serialize)]
pub struct ToolResponse {
    pub code: String,
    pub name: String,
    pub params: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_remaining: Option<u64>,
}

#[derive(Serialize)]
pub struct ToolListResponse {
    pub items: Vec<ToolResponse>,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub usage_record_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<Uuid>,
}

/// List the tools available to the caller's school, with remaining quota
pub async fn list_tools(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ToolListResponse>> {
    let tools = state.tools.available_tools(&principal).await?;

    Ok(Json(ToolListResponse {
        items: tools
            .into_iter()
            .map(|(tool, remaining)| ToolResponse {
                code: tool.code,
                name: tool.name,
                params: tool.params,
                daily_remaining: remaining.daily,
                monthly_remaining: remaining.monthly,
            })
            .collect(),
    }))
}

/// Run an AI tool, optionally saving the output as a draft content
pub async fn generate(
    State(state): State<AppState>,
    principal: Principal,
    Path(tool_code): Path<String>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>> {
    let output = state
        .tools
        .generate(&principal, &tool_code, request.params)
        .await?;

    let content_id = match request.save_as {
        Some(name) => {
            let content = state
                .lifecycle
                .create(&principal, name, output.text.clone(), ContentSource::AiGenerate)
                .await?;
            Some(content.id)
        }
        None => None,
    };

    Ok(Json(GenerateResponse {
        text: output.text,
        usage_record_id: output.usage_record_id,
        content_id,
    }))
}
