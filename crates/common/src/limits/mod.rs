//! AI usage limiting
//!
//! Per-(school, tool) quotas with UTC calendar day/month windows,
//! counted from the append-only usage log. A cap of 0 means unlimited.

use crate::db::models::*;
use crate::db::{Store, ToolRepo, UsageRepo};
use crate::errors::{AppError, QuotaWindow, Result};
use crate::metrics;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Remaining allowance per window; None means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingQuota {
    pub daily: Option<u64>,
    pub monthly: Option<u64>,
}

/// Quota enforcement over the usage log
#[derive(Clone)]
pub struct UsageLimiter {
    store: Arc<dyn Store>,
}

/// Start of the UTC day containing `now`
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .expect("midnight is always a valid UTC timestamp")
}

/// Start of the UTC calendar month containing `now`
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .expect("the first of the month is always a valid UTC timestamp")
}

impl UsageLimiter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Check whether the school may invoke the tool right now.
    ///
    /// A missing or disabled grant (or a disabled tool) is an
    /// authorization failure, not a quota failure.
    pub async fn check(&self, tool: &AiTool, school_id: Uuid) -> Result<()> {
        if !tool.is_enabled {
            return Err(AppError::ToolNotAuthorized {
                tool_code: tool.code.clone(),
            });
        }

        let grant = self
            .store
            .find_grant(school_id, tool.id)
            .await?
            .filter(|g| g.is_enabled)
            .ok_or_else(|| AppError::ToolNotAuthorized {
                tool_code: tool.code.clone(),
            })?;

        let now = Utc::now();

        if grant.daily_limit > 0 {
            let used = self
                .store
                .count_usage_since(tool.id, school_id, day_start(now))
                .await?;

            if used >= grant.daily_limit as u64 {
                metrics::record_quota_rejection("daily");
                return Err(AppError::QuotaExceeded {
                    window: QuotaWindow::Daily,
                    limit: grant.daily_limit,
                });
            }
        }

        if grant.monthly_limit > 0 {
            let used = self
                .store
                .count_usage_since(tool.id, school_id, month_start(now))
                .await?;

            if used >= grant.monthly_limit as u64 {
                metrics::record_quota_rejection("monthly");
                return Err(AppError::QuotaExceeded {
                    window: QuotaWindow::Monthly,
                    limit: grant.monthly_limit,
                });
            }
        }

        Ok(())
    }

    /// Remaining allowance for surfacing in tool listings
    pub async fn remaining(&self, tool: &AiTool, school_id: Uuid) -> Result<RemainingQuota> {
        let grant = self
            .store
            .find_grant(school_id, tool.id)
            .await?
            .filter(|g| g.is_enabled)
            .ok_or_else(|| AppError::ToolNotAuthorized {
                tool_code: tool.code.clone(),
            })?;

        let now = Utc::now();

        let daily = if grant.daily_limit > 0 {
            let used = self
                .store
                .count_usage_since(tool.id, school_id, day_start(now))
                .await?;
            Some((grant.daily_limit as u64).saturating_sub(used))
        } else {
            None
        };

        let monthly = if grant.monthly_limit > 0 {
            let used = self
                .store
                .count_usage_since(tool.id, school_id, month_start(now))
                .await?;
            Some((grant.monthly_limit as u64).saturating_sub(used))
        } else {
            None
        };

        Ok(RemainingQuota { daily, monthly })
    }

    /// Append a usage row. Used both for limiting and reporting.
    pub async fn record(
        &self,
        tool_id: Uuid,
        school_id: Uuid,
        user_id: Uuid,
        status: UsageStatus,
        prompt_chars: i32,
        response_body: Option<String>,
        error: Option<String>,
    ) -> Result<AiUsageRecord> {
        self.store
            .insert_usage(AiUsageRecord {
                id: Uuid::new_v4(),
                tool_id,
                school_id,
                user_id,
                status,
                prompt_chars,
                response_body,
                error,
                created_at: Utc::now().into(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::TimeZone;

    fn tool(id: Uuid) -> AiTool {
        AiTool {
            id,
            code: "lesson_plan".to_string(),
            name: "Lesson plan generator".to_string(),
            system_prompt: "You are a teaching assistant.".to_string(),
            user_prompt: "Write a lesson plan about {topic}.".to_string(),
            params: serde_json::json!([]),
            model: None,
            max_tokens: 1024,
            temperature_tenths: 7,
            is_enabled: true,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn grant(school_id: Uuid, tool_id: Uuid, daily: i32, monthly: i32) -> SchoolToolGrant {
        SchoolToolGrant {
            id: Uuid::new_v4(),
            school_id,
            tool_id,
            daily_limit: daily,
            monthly_limit: monthly,
            is_enabled: true,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    async fn seed_usage(store: &MemoryStore, tool_id: Uuid, school_id: Uuid, count: usize) {
        for _ in 0..count {
            store
                .insert_usage(AiUsageRecord {
                    id: Uuid::new_v4(),
                    tool_id,
                    school_id,
                    user_id: Uuid::new_v4(),
                    status: UsageStatus::Success,
                    prompt_chars: 100,
                    response_body: Some("ok".to_string()),
                    error: None,
                    created_at: Utc::now().into(),
                })
                .await
                .unwrap();
        }
    }

    #[test]
    fn window_starts() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 15, 30, 45).unwrap();
        assert_eq!(
            day_start(now),
            Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap()
        );
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn missing_grant_is_not_authorized() {
        let store = Arc::new(MemoryStore::new());
        let limiter = UsageLimiter::new(store.clone());
        let tool = tool(Uuid::new_v4());

        let err = limiter.check(&tool, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::ToolNotAuthorized { .. }));
    }

    #[tokio::test]
    async fn disabled_grant_is_not_authorized() {
        let store = Arc::new(MemoryStore::new());
        let school_id = Uuid::new_v4();
        let tool = tool(Uuid::new_v4());

        let mut g = grant(school_id, tool.id, 5, 0);
        g.is_enabled = false;
        store.insert_grant(g).await.unwrap();

        let limiter = UsageLimiter::new(store);
        let err = limiter.check(&tool, school_id).await.unwrap_err();
        assert!(matches!(err, AppError::ToolNotAuthorized { .. }));
    }

    #[tokio::test]
    async fn daily_limit_blocks_at_cap() {
        let store = Arc::new(MemoryStore::new());
        let school_id = Uuid::new_v4();
        let tool = tool(Uuid::new_v4());

        store.insert_grant(grant(school_id, tool.id, 5, 0)).await.unwrap();
        seed_usage(&store, tool.id, school_id, 5).await;

        let limiter = UsageLimiter::new(store);
        let err = limiter.check(&tool, school_id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::QuotaExceeded {
                window: QuotaWindow::Daily,
                limit: 5
            }
        ));
    }

    #[tokio::test]
    async fn zero_limit_means_unlimited() {
        let store = Arc::new(MemoryStore::new());
        let school_id = Uuid::new_v4();
        let tool = tool(Uuid::new_v4());

        store.insert_grant(grant(school_id, tool.id, 0, 0)).await.unwrap();
        seed_usage(&store, tool.id, school_id, 1000).await;

        let limiter = UsageLimiter::new(store);
        limiter.check(&tool, school_id).await.unwrap();
    }

    #[tokio::test]
    async fn monthly_limit_blocks_at_cap() {
        let store = Arc::new(MemoryStore::new());
        let school_id = Uuid::new_v4();
        let tool = tool(Uuid::new_v4());

        store.insert_grant(grant(school_id, tool.id, 0, 3)).await.unwrap();
        seed_usage(&store, tool.id, school_id, 3).await;

        let limiter = UsageLimiter::new(store);
        let err = limiter.check(&tool, school_id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::QuotaExceeded {
                window: QuotaWindow::Monthly,
                limit: 3
            }
        ));
    }

    #[tokio::test]
    async fn under_cap_is_allowed() {
        let store = Arc::new(MemoryStore::new());
        let school_id = Uuid::new_v4();
        let tool = tool(Uuid::new_v4());

        store.insert_grant(grant(school_id, tool.id, 5, 100)).await.unwrap();
        seed_usage(&store, tool.id, school_id, 4).await;

        let limiter = UsageLimiter::new(store);
        limiter.check(&tool, school_id).await.unwrap();
    }

    #[tokio::test]
    async fn remaining_reports_per_window() {
        let store = Arc::new(MemoryStore::new());
        let school_id = Uuid::new_v4();
        let tool = tool(Uuid::new_v4());

        store.insert_grant(grant(school_id, tool.id, 5, 0)).await.unwrap();
        seed_usage(&store, tool.id, school_id, 2).await;

        let limiter = UsageLimiter::new(store);
        let remaining = limiter.remaining(&tool, school_id).await.unwrap();
        assert_eq!(remaining.daily, Some(3));
        assert_eq!(remaining.monthly, None);
    }

    #[tokio::test]
    async fn usage_from_other_school_does_not_count() {
        let store = Arc::new(MemoryStore::new());
        let school_id = Uuid::new_v4();
        let tool = tool(Uuid::new_v4());

        store.insert_grant(grant(school_id, tool.id, 1, 0)).await.unwrap();
        seed_usage(&store, tool.id, Uuid::new_v4(), 10).await;

        let limiter = UsageLimiter::new(store);
        limiter.check(&tool, school_id).await.unwrap();
    }
}
