//! AI tool execution
//!
//! Validates caller params against the tool's declared schema, renders
//! the prompt templates, enforces quota, invokes the provider, and logs
//! a usage row for every attempt.

use crate::ai::{ChatProvider, ChatRequest};
use crate::auth::Principal;
use crate::config::AiConfig;
use crate::db::models::*;
use crate::db::{Store, ToolRepo};
use crate::errors::{AppError, Result};
use crate::limits::{RemainingQuota, UsageLimiter};
use crate::metrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Declared parameter kinds for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamKind {
    String {
        #[serde(default)]
        max_len: Option<usize>,
    },
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Enum { options: Vec<String> },
}

/// One declared parameter of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,

    #[serde(default)]
    pub required: bool,

    #[serde(flatten)]
    pub kind: ParamKind,
}

/// Validate caller params against the declared schema
pub fn validate_params(specs: &[ParamSpec], params: &serde_json::Map<String, Value>) -> Result<()> {
    for spec in specs {
        let value = match params.get(&spec.name) {
            Some(value) => value,
            None => {
                if spec.required {
                    return Err(AppError::MissingField {
                        field: spec.name.clone(),
                    });
                }
                continue;
            }
        };

        match &spec.kind {
            ParamKind::String { max_len } => {
                let s = value.as_str().ok_or_else(|| AppError::Validation {
                    message: format!("Parameter {} must be a string", spec.name),
                    field: Some(spec.name.clone()),
                })?;

                if let Some(max_len) = max_len {
                    if s.chars().count() > *max_len {
                        return Err(AppError::Validation {
                            message: format!(
                                "Parameter {} exceeds maximum length {}",
                                spec.name, max_len
                            ),
                            field: Some(spec.name.clone()),
                        });
                    }
                }
            }
            ParamKind::Number { min, max } => {
                let n = value.as_f64().ok_or_else(|| AppError::Validation {
                    message: format!("Parameter {} must be a number", spec.name),
                    field: Some(spec.name.clone()),
                })?;

                if min.is_some_and(|min| n < min) || max.is_some_and(|max| n > max) {
                    return Err(AppError::Validation {
                        message: format!("Parameter {} is out of range", spec.name),
                        field: Some(spec.name.clone()),
                    });
                }
            }
            ParamKind::Enum { options } => {
                let s = value.as_str().ok_or_else(|| AppError::Validation {
                    message: format!("Parameter {} must be a string", spec.name),
                    field: Some(spec.name.clone()),
                })?;

                if !options.iter().any(|o| o == s) {
                    return Err(AppError::Validation {
                        message: format!(
                            "Parameter {} must be one of: {}",
                            spec.name,
                            options.join(", ")
                        ),
                        field: Some(spec.name.clone()),
                    });
                }
            }
        }
    }

    Ok(())
}

/// Substitute `{name}` placeholders with the corresponding param values
pub fn render_template(template: &str, params: &serde_json::Map<String, Value>) -> String {
    let mut rendered = template.to_string();

    for (name, value) in params {
        let placeholder = format!("{{{}}}", name);
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&placeholder, &replacement);
    }

    rendered
}

/// Result of a successful generation
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub tool_id: Uuid,
    pub text: String,
    pub usage_record_id: Uuid,
}

/// Orchestrates AI tool invocations
#[derive(Clone)]
pub struct ToolRunner {
    store: Arc<dyn Store>,
    provider: Arc<dyn ChatProvider>,
    limiter: UsageLimiter,
    default_model: String,
    default_max_tokens: u32,
}

impl ToolRunner {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn ChatProvider>, config: &AiConfig) -> Self {
        Self {
            limiter: UsageLimiter::new(store.clone()),
            store,
            provider,
            default_model: config.model.clone(),
            default_max_tokens: config.max_tokens,
        }
    }

    /// Enabled tools the school is granted, with remaining quota
    pub async fn available_tools(
        &self,
        principal: &Principal,
    ) -> Result<Vec<(AiTool, RemainingQuota)>> {
        let mut available = Vec::new();

        for tool in self.store.list_enabled_tools().await? {
            match self.limiter.remaining(&tool, principal.school_id).await {
                Ok(remaining) => available.push((tool, remaining)),
                Err(AppError::ToolNotAuthorized { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(available)
    }

    /// Run a tool for the principal.
    ///
    /// Every attempt that reaches the provider is logged: a success row
    /// carrying the response, or a failed row carrying the error.
    pub async fn generate(
        &self,
        principal: &Principal,
        tool_code: &str,
        params: Value,
    ) -> Result<GenerationOutput> {
        let tool = self
            .store
            .find_tool_by_code(tool_code)
            .await?
            .ok_or_else(|| AppError::ToolNotFound {
                code: tool_code.to_string(),
            })?;

        let params = match params {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            _ => {
                return Err(AppError::Validation {
                    message: "Params must be a JSON object".to_string(),
                    field: Some("params".to_string()),
                })
            }
        };

        let specs: Vec<ParamSpec> =
            serde_json::from_value(tool.params.clone()).map_err(|e| AppError::Configuration {
                message: format!("Tool {} has an invalid param schema: {}", tool.code, e),
            })?;

        validate_params(&specs, &params)?;

        // Authorization and quota in one pass; a disabled tool surfaces
        // the same way as a missing grant.
        self.limiter.check(&tool, principal.school_id).await?;

        let system_prompt = render_template(&tool.system_prompt, &params);
        let user_prompt = render_template(&tool.user_prompt, &params);
        let prompt_chars = (system_prompt.chars().count() + user_prompt.chars().count()) as i32;

        let request = ChatRequest {
            model: tool.model.clone().unwrap_or_else(|| self.default_model.clone()),
            system_prompt,
            user_prompt,
            max_tokens: if tool.max_tokens > 0 {
                tool.max_tokens as u32
            } else {
                self.default_max_tokens
            },
            temperature: tool.temperature(),
        };

        let start = Instant::now();
        let outcome = self.provider.complete(&request).await;
        metrics::record_provider_duration(self.provider.name(), start.elapsed().as_secs_f64());

        match outcome {
            Ok(text) => {
                let usage = self
                    .limiter
                    .record(
                        tool.id,
                        principal.school_id,
                        principal.user_id,
                        UsageStatus::Success,
                        prompt_chars,
                        Some(text.clone()),
                        None,
                    )
                    .await?;

                metrics::record_generation("success");

                tracing::info!(
                    tool_code = %tool.code,
                    school_id = %principal.school_id,
                    user_id = %principal.user_id,
                    "AI generation succeeded"
                );

                Ok(GenerationOutput {
                    tool_id: tool.id,
                    text,
                    usage_record_id: usage.id,
                })
            }
            Err(e) => {
                self.limiter
                    .record(
                        tool.id,
                        principal.school_id,
                        principal.user_id,
                        UsageStatus::Failed,
                        prompt_chars,
                        None,
                        Some(e.to_string()),
                    )
                    .await?;

                metrics::record_generation("failed");

                tracing::error!(
                    tool_code = %tool.code,
                    school_id = %principal.school_id,
                    error = %e,
                    "AI generation failed"
                );

                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockChatProvider;
    use crate::auth::Role;
    use crate::db::{MemoryStore, UsageRepo};
    use chrono::Utc;

    fn specs() -> Vec<ParamSpec> {
        serde_json::from_value(serde_json::json!([
            {"name": "topic", "kind": "string", "required": true, "max_len": 50},
            {"name": "grade", "kind": "number", "required": true, "min": 1, "max": 12},
            {"name": "difficulty", "kind": "enum", "options": ["easy", "medium", "hard"]}
        ]))
        .unwrap()
    }

    fn params(json: Value) -> serde_json::Map<String, Value> {
        json.as_object().unwrap().clone()
    }

    #[test]
    fn validate_accepts_good_params() {
        let p = params(serde_json::json!({
            "topic": "fractions", "grade": 5, "difficulty": "easy"
        }));
        validate_params(&specs(), &p).unwrap();
    }

    #[test]
    fn validate_rejects_missing_required() {
        let p = params(serde_json::json!({"grade": 5}));
        let err = validate_params(&specs(), &p).unwrap_err();
        assert!(matches!(err, AppError::MissingField { .. }));
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let p = params(serde_json::json!({"topic": "fractions", "grade": 13}));
        let err = validate_params(&specs(), &p).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn validate_rejects_unknown_enum_value() {
        let p = params(serde_json::json!({
            "topic": "fractions", "grade": 5, "difficulty": "impossible"
        }));
        let err = validate_params(&specs(), &p).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn optional_params_may_be_absent() {
        let p = params(serde_json::json!({"topic": "fractions", "grade": 5}));
        validate_params(&specs(), &p).unwrap();
    }

    #[test]
    fn render_substitutes_placeholders() {
        let p = params(serde_json::json!({"topic": "fractions", "grade": 5}));
        let rendered = render_template("Explain {topic} to grade {grade}.", &p);
        assert_eq!(rendered, "Explain fractions to grade 5.");
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        let p = params(serde_json::json!({"topic": "fractions"}));
        let rendered = render_template("{topic} for {audience}", &p);
        assert_eq!(rendered, "fractions for {audience}");
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        principal: Principal,
        tool_code: String,
    }

    async fn fixture(daily_limit: i32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let school_id = Uuid::new_v4();
        let tool_id = Uuid::new_v4();

        store
            .insert_tool(AiTool {
                id: tool_id,
                code: "lesson_plan".to_string(),
                name: "Lesson plan generator".to_string(),
                system_prompt: "You are a teaching assistant.".to_string(),
                user_prompt: "Write a lesson plan about {topic}.".to_string(),
                params: serde_json::json!([
                    {"name": "topic", "kind": "string", "required": true}
                ]),
                model: None,
                max_tokens: 512,
                temperature_tenths: 7,
                is_enabled: true,
                created_at: Utc::now().into(),
                updated_at: Utc::now().into(),
            })
            .await
            .unwrap();

        store
            .insert_grant(SchoolToolGrant {
                id: Uuid::new_v4(),
                school_id,
                tool_id,
                daily_limit,
                monthly_limit: 0,
                is_enabled: true,
                created_at: Utc::now().into(),
                updated_at: Utc::now().into(),
            })
            .await
            .unwrap();

        Fixture {
            store,
            principal: Principal {
                user_id: Uuid::new_v4(),
                school_id,
                role: Role::Teacher,
                request_id: "test".to_string(),
            },
            tool_code: "lesson_plan".to_string(),
        }
    }

    fn runner(store: Arc<MemoryStore>, provider: Arc<dyn ChatProvider>) -> ToolRunner {
        ToolRunner::new(store, provider, &AiConfig {
            provider: "mock".to_string(),
            api_key: None,
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            max_tokens: 512,
        })
    }

    #[tokio::test]
    async fn generate_records_success_usage() {
        let fx = fixture(0).await;
        let runner = runner(fx.store.clone(), Arc::new(MockChatProvider::replying("X")));

        let output = runner
            .generate(
                &fx.principal,
                &fx.tool_code,
                serde_json::json!({"topic": "fractions"}),
            )
            .await
            .unwrap();

        assert_eq!(output.text, "X");

        let (records, total) = fx
            .store
            .list_usage(fx.principal.school_id, 0, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].id, output.usage_record_id);
        assert_eq!(records[0].status, UsageStatus::Success);
        assert_eq!(records[0].response_body.as_deref(), Some("X"));
        assert_eq!(records[0].user_id, fx.principal.user_id);
    }

    #[tokio::test]
    async fn generate_records_failed_usage_and_surfaces_error() {
        let fx = fixture(0).await;
        let runner = runner(
            fx.store.clone(),
            Arc::new(MockChatProvider::failing("model overloaded")),
        );

        let err = runner
            .generate(
                &fx.principal,
                &fx.tool_code,
                serde_json::json!({"topic": "fractions"}),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Provider { .. }));

        // The failed attempt still lands in the usage log
        let (records, total) = fx
            .store
            .list_usage(fx.principal.school_id, 0, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].status, UsageStatus::Failed);
        assert_eq!(records[0].response_body, None);
        assert!(records[0]
            .error
            .as_deref()
            .unwrap()
            .contains("model overloaded"));
    }

    #[tokio::test]
    async fn generate_enforces_daily_quota() {
        let fx = fixture(1).await;
        let runner = runner(fx.store.clone(), Arc::new(MockChatProvider::replying("X")));

        runner
            .generate(
                &fx.principal,
                &fx.tool_code,
                serde_json::json!({"topic": "fractions"}),
            )
            .await
            .unwrap();

        let err = runner
            .generate(
                &fx.principal,
                &fx.tool_code,
                serde_json::json!({"topic": "decimals"}),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn generate_rejects_unknown_tool() {
        let fx = fixture(0).await;
        let runner = runner(fx.store.clone(), Arc::new(MockChatProvider::replying("X")));

        let err = runner
            .generate(&fx.principal, "nonexistent", serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn generate_rejects_bad_params_before_quota() {
        let fx = fixture(0).await;
        let runner = runner(fx.store.clone(), Arc::new(MockChatProvider::replying("X")));

        let err = runner
            .generate(&fx.principal, &fx.tool_code, serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MissingField { .. }));
    }

    #[tokio::test]
    async fn available_tools_skips_ungranted() {
        let fx = fixture(5).await;

        // A second enabled tool without any grant for the school
        fx.store
            .insert_tool(AiTool {
                id: Uuid::new_v4(),
                code: "quiz_builder".to_string(),
                name: "Quiz builder".to_string(),
                system_prompt: String::new(),
                user_prompt: "{prompt}".to_string(),
                params: serde_json::json!([]),
                model: None,
                max_tokens: 256,
                temperature_tenths: 5,
                is_enabled: true,
                created_at: Utc::now().into(),
                updated_at: Utc::now().into(),
            })
            .await
            .unwrap();

        let runner = runner(fx.store.clone(), Arc::new(MockChatProvider::replying("X")));
        let tools = runner.available_tools(&fx.principal).await.unwrap();

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].0.code, "lesson_plan");
        assert_eq!(tools[0].1.daily, Some(5));
    }
}
