//! Token accounting - One `ai_token_usage` row per AI call, plus reporting.

use crate::{
    config::AiSettings,
    core::{Page, normalize_paging, page_offset},
    entities::{AiTokenUsage, ai_token_usage},
    errors::Result,
};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use sea_orm::{Condition, PaginatorTrait, QueryOrder, QuerySelect, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Value of `request_type` for chat completions.
pub const REQUEST_TYPE_COMPLETION: &str = "completion";

/// Dollar cost of a call from the configured price table.
///
/// Models missing from the table are priced with `default_pricing`.
#[must_use]
pub fn estimate_cost(
    settings: &AiSettings,
    model: &str,
    prompt_tokens: i64,
    completion_tokens: i64,
) -> f64 {
    let pricing = settings
        .pricing
        .get(model)
        .copied()
        .unwrap_or(settings.default_pricing);
    #[allow(clippy::cast_precision_loss)]
    let (prompt, completion) = (prompt_tokens as f64, completion_tokens as f64);
    prompt / 1000.0 * pricing.input_per_1k + completion / 1000.0 * pricing.output_per_1k
}

/// One call to record.
#[derive(Debug, Clone, Default)]
pub struct UsageRecord {
    /// Staff member who triggered the call
    pub user_id: Option<String>,
    /// Session the call belongs to
    pub session_id: String,
    /// Feature name (`chat`, `analysis`, `translation`, ...)
    pub feature_type: String,
    /// Model used
    pub model_used: String,
    /// Prompt tokens
    pub prompt_tokens: i64,
    /// Completion tokens
    pub completion_tokens: i64,
    /// API path
    pub endpoint_used: Option<String>,
    /// Whether the call succeeded
    pub success: bool,
    /// Error text for failed calls
    pub error_message: Option<String>,
    /// Wall-clock duration
    pub processing_time_ms: Option<i64>,
}

/// Writes one usage row, computing total tokens and estimated cost.
///
/// # Errors
/// Returns an error if the database insert fails.
pub async fn log_token_usage(
    db: &DatabaseConnection,
    settings: &AiSettings,
    record: UsageRecord,
) -> Result<ai_token_usage::Model> {
    let cost = estimate_cost(
        settings,
        &record.model_used,
        record.prompt_tokens,
        record.completion_tokens,
    );

    let row = ai_token_usage::ActiveModel {
        user_id: Set(record.user_id),
        session_id: Set(record.session_id),
        feature_type: Set(record.feature_type),
        model_used: Set(record.model_used),
        prompt_tokens: Set(record.prompt_tokens),
        completion_tokens: Set(record.completion_tokens),
        total_tokens: Set(record.prompt_tokens + record.completion_tokens),
        estimated_cost_usd: Set(cost),
        request_type: Set(REQUEST_TYPE_COMPLETION.to_string()),
        endpoint_used: Set(record.endpoint_used),
        success: Set(record.success),
        error_message: Set(record.error_message),
        processing_time_ms: Set(record.processing_time_ms),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!(
        "Logged {} tokens (${:.6}) for {}",
        row.total_tokens, row.estimated_cost_usd, row.feature_type
    );
    Ok(row)
}

/// Reporting window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsagePeriod {
    /// Since midnight UTC
    Today,
    /// Last 7 days
    Week,
    /// Since the first of the month
    Month,
    /// Everything
    #[default]
    All,
}

impl UsagePeriod {
    /// Start of the window, `None` for [`UsagePeriod::All`].
    #[must_use]
    pub fn start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        match self {
            Self::Today => Some(today.and_time(NaiveTime::MIN).and_utc()),
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => today
                .with_day(1)
                .map(|first| first.and_time(NaiveTime::MIN).and_utc()),
            Self::All => None,
        }
    }
}

/// Filters for [`get_token_usage_stats`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageFilters {
    /// Reporting window
    #[serde(default)]
    pub period: UsagePeriod,
    /// Only this feature
    pub feature_type: Option<String>,
    /// Only this model
    pub model_used: Option<String>,
    /// Only successful (or failed) calls
    pub success: Option<bool>,
    /// Only this user
    pub user_id: Option<String>,
    /// Calls at or after this instant
    pub start_date: Option<DateTime<Utc>>,
    /// Calls at or before this instant
    pub end_date: Option<DateTime<Utc>>,
}

/// Per-feature totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUsage {
    /// Calls
    pub requests: i64,
    /// Tokens
    pub total_tokens: i64,
    /// Dollars
    pub total_cost_usd: f64,
}

/// Aggregate usage over a filtered set of calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Calls
    pub total_requests: i64,
    /// Successful calls
    pub successful_requests: i64,
    /// Failed calls
    pub failed_requests: i64,
    /// Prompt tokens
    pub prompt_tokens: i64,
    /// Completion tokens
    pub completion_tokens: i64,
    /// All tokens
    pub total_tokens: i64,
    /// Estimated dollars
    pub total_cost_usd: f64,
    /// Rounded mean of tokens per call
    pub average_tokens_per_request: i64,
    /// Most frequent model, `None` when there are no calls
    pub most_used_model: Option<String>,
    /// Most frequent feature, `None` when there are no calls
    pub most_used_feature: Option<String>,
    /// Totals per feature
    pub by_feature: BTreeMap<String, FeatureUsage>,
}

/// Most frequent key; ties go to the alphabetically first.
fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(&str, usize)>, (key, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((key, count)),
        })
        .map(|(key, _)| key.to_string())
}

/// Aggregates usage rows matching `filters`.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_token_usage_stats(
    db: &DatabaseConnection,
    filters: &UsageFilters,
    now: DateTime<Utc>,
) -> Result<UsageStats> {
    let mut condition = Condition::all();
    if let Some(start) = filters.period.start(now) {
        condition = condition.add(ai_token_usage::Column::CreatedAt.gte(start));
    }
    if let Some(feature) = &filters.feature_type {
        condition = condition.add(ai_token_usage::Column::FeatureType.eq(feature.as_str()));
    }
    if let Some(model) = &filters.model_used {
        condition = condition.add(ai_token_usage::Column::ModelUsed.eq(model.as_str()));
    }
    if let Some(success) = filters.success {
        condition = condition.add(ai_token_usage::Column::Success.eq(success));
    }
    if let Some(user_id) = &filters.user_id {
        condition = condition.add(ai_token_usage::Column::UserId.eq(user_id.as_str()));
    }
    if let Some(start) = filters.start_date {
        condition = condition.add(ai_token_usage::Column::CreatedAt.gte(start));
    }
    if let Some(end) = filters.end_date {
        condition = condition.add(ai_token_usage::Column::CreatedAt.lte(end));
    }

    let rows = AiTokenUsage::find().filter(condition).all(db).await?;
    if rows.is_empty() {
        return Ok(UsageStats::default());
    }

    let mut stats = UsageStats {
        total_requests: i64::try_from(rows.len()).unwrap_or(i64::MAX),
        most_used_model: most_frequent(rows.iter().map(|r| r.model_used.as_str())),
        most_used_feature: most_frequent(rows.iter().map(|r| r.feature_type.as_str())),
        ..Default::default()
    };

    for row in &rows {
        if row.success {
            stats.successful_requests += 1;
        }
        stats.prompt_tokens += row.prompt_tokens;
        stats.completion_tokens += row.completion_tokens;
        stats.total_tokens += row.total_tokens;
        stats.total_cost_usd += row.estimated_cost_usd;

        let feature = stats.by_feature.entry(row.feature_type.clone()).or_default();
        feature.requests += 1;
        feature.total_tokens += row.total_tokens;
        feature.total_cost_usd += row.estimated_cost_usd;
    }
    stats.failed_requests = stats.total_requests - stats.successful_requests;
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    {
        stats.average_tokens_per_request =
            (stats.total_tokens as f64 / stats.total_requests as f64).round() as i64;
    }

    Ok(stats)
}

/// Usage rows, newest first, one page at a time.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_token_usage_history(
    db: &DatabaseConnection,
    page: u64,
    limit: u64,
) -> Result<Page<ai_token_usage::Model>> {
    let (page, limit) = normalize_paging(page, limit);
    let query = AiTokenUsage::find();
    let total = query.clone().count(db).await?;
    let rows = query
        .order_by_desc(ai_token_usage::Column::CreatedAt)
        .order_by_desc(ai_token_usage::Column::Id)
        .offset(page_offset(page, limit))
        .limit(limit)
        .all(db)
        .await?;
    Ok(Page::new(rows, page, limit, total))
}

/// Bucket size for [`get_token_usage_trends`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendGranularity {
    /// One bucket per day (`YYYY-MM-DD`)
    #[default]
    Daily,
    /// One bucket per week, keyed by its Sunday
    Weekly,
    /// One bucket per month (`YYYY-MM`)
    Monthly,
}

/// Usage within one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTrendPoint {
    /// Bucket key
    pub date: String,
    /// Tokens
    pub total_tokens: i64,
    /// Dollars
    pub total_cost_usd: f64,
    /// Calls
    pub requests: i64,
}

fn bucket_key(created_at: DateTime<Utc>, granularity: TrendGranularity) -> String {
    let date = created_at.date_naive();
    match granularity {
        TrendGranularity::Daily => date.format("%Y-%m-%d").to_string(),
        TrendGranularity::Weekly => {
            let offset = i64::from(date.weekday().num_days_from_sunday());
            (date - Duration::days(offset)).format("%Y-%m-%d").to_string()
        }
        TrendGranularity::Monthly => date.format("%Y-%m").to_string(),
    }
}

/// Longest window [`get_token_usage_trends`] looks back over.
pub const MAX_TREND_DAYS: i64 = 3650;

/// Usage over the last `days` days, bucketed and sorted by date.
///
/// `days` is clamped to `1..=MAX_TREND_DAYS`.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_token_usage_trends(
    db: &DatabaseConnection,
    granularity: TrendGranularity,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<UsageTrendPoint>> {
    let since = now - Duration::days(days.clamp(1, MAX_TREND_DAYS));
    let rows = AiTokenUsage::find()
        .filter(ai_token_usage::Column::CreatedAt.gte(since))
        .filter(ai_token_usage::Column::CreatedAt.lte(now))
        .order_by_asc(ai_token_usage::Column::CreatedAt)
        .all(db)
        .await?;

    let mut buckets: HashMap<String, UsageTrendPoint> = HashMap::new();
    for row in rows {
        let key = bucket_key(row.created_at, granularity);
        let point = buckets
            .entry(key.clone())
            .or_insert_with(|| UsageTrendPoint {
                date: key,
                total_tokens: 0,
                total_cost_usd: 0.0,
                requests: 0,
            });
        point.total_tokens += row.total_tokens;
        point.total_cost_usd += row.estimated_cost_usd;
        point.requests += 1;
    }

    let mut points: Vec<UsageTrendPoint> = buckets.into_values().collect();
    points.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(points)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::TimeZone;

    fn record(feature: &str, model: &str, prompt: i64, completion: i64, success: bool) -> UsageRecord {
        UsageRecord {
            session_id: "session-1".to_string(),
            feature_type: feature.to_string(),
            model_used: model.to_string(),
            prompt_tokens: prompt,
            completion_tokens: completion,
            endpoint_used: Some("/messages".to_string()),
            success,
            error_message: (!success).then(|| "boom".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_estimate_cost_uses_table_and_default() {
        let settings = AiSettings::default();
        let haiku = estimate_cost(&settings, "claude-3-haiku-20240307", 1000, 1000);
        assert!((haiku - 0.0015).abs() < 1e-12);

        let unknown = estimate_cost(&settings, "some-new-model", 2000, 0);
        assert!((unknown - 0.006).abs() < 1e-12);

        assert_eq!(estimate_cost(&settings, "claude-3-haiku-20240307", 0, 0), 0.0);
    }

    #[test]
    fn test_period_start() {
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 15, 30, 0).unwrap();
        assert_eq!(
            UsagePeriod::Today.start(now),
            Some(Utc.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap())
        );
        assert_eq!(
            UsagePeriod::Week.start(now),
            Some(Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap())
        );
        assert_eq!(
            UsagePeriod::Month.start(now),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(UsagePeriod::All.start(now), None);
    }

    #[test]
    fn test_bucket_keys() {
        // 2024-05-17 is a Friday
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 9, 0, 0).unwrap();
        assert_eq!(bucket_key(at, TrendGranularity::Daily), "2024-05-17");
        assert_eq!(bucket_key(at, TrendGranularity::Weekly), "2024-05-12");
        assert_eq!(bucket_key(at, TrendGranularity::Monthly), "2024-05");
    }

    #[tokio::test]
    async fn test_log_token_usage_computes_totals() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = AiSettings::default();

        let row = log_token_usage(
            &db,
            &settings,
            record("chat", "claude-3-haiku-20240307", 1000, 1000, true),
        )
        .await?;

        assert_eq!(row.total_tokens, 2000);
        assert!((row.estimated_cost_usd - 0.0015).abs() < 1e-12);
        assert_eq!(row.request_type, "completion");

        Ok(())
    }

    #[tokio::test]
    async fn test_usage_stats_and_filters() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = AiSettings::default();
        let sonnet = "claude-3-5-sonnet-20241022";
        let haiku = "claude-3-haiku-20240307";

        log_token_usage(&db, &settings, record("chat", sonnet, 100, 50, true)).await?;
        log_token_usage(&db, &settings, record("chat", sonnet, 200, 100, true)).await?;
        log_token_usage(&db, &settings, record("translation", haiku, 10, 0, true)).await?;
        log_token_usage(&db, &settings, record("chat", haiku, 0, 0, false)).await?;

        let all = get_token_usage_stats(&db, &UsageFilters::default(), Utc::now()).await?;
        assert_eq!(all.total_requests, 4);
        assert_eq!(all.successful_requests, 3);
        assert_eq!(all.failed_requests, 1);
        assert_eq!(all.total_tokens, 460);
        assert_eq!(all.average_tokens_per_request, 115);
        assert_eq!(all.most_used_feature.as_deref(), Some("chat"));
        // Two calls each; ties go to the alphabetically first
        assert_eq!(all.most_used_model.as_deref(), Some(sonnet));
        assert_eq!(all.by_feature["chat"].requests, 3);

        let failed = get_token_usage_stats(
            &db,
            &UsageFilters {
                success: Some(false),
                ..Default::default()
            },
            Utc::now(),
        )
        .await?;
        assert_eq!(failed.total_requests, 1);
        assert_eq!(failed.total_tokens, 0);

        let translation = get_token_usage_stats(
            &db,
            &UsageFilters {
                period: UsagePeriod::Today,
                feature_type: Some("translation".to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
        .await?;
        assert_eq!(translation.total_requests, 1);
        assert_eq!(translation.most_used_model.as_deref(), Some(haiku));

        let empty = get_token_usage_stats(
            &db,
            &UsageFilters {
                model_used: Some("unknown".to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
        .await?;
        assert_eq!(empty, UsageStats::default());

        Ok(())
    }

    #[tokio::test]
    async fn test_usage_history_and_trends() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = AiSettings::default();
        for i in 0..3 {
            log_token_usage(&db, &settings, record("chat", "claude-3-haiku-20240307", i, 1, true))
                .await?;
        }

        let history = get_token_usage_history(&db, 1, 2).await?;
        assert_eq!(history.total, 3);
        assert_eq!(history.total_pages, 2);
        assert_eq!(history.items.len(), 2);
        assert!(history.items[0].id > history.items[1].id);

        let trends = get_token_usage_trends(&db, TrendGranularity::Daily, 30, Utc::now()).await?;
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].requests, 3);
        assert_eq!(trends[0].total_tokens, 6);

        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_range_history_and_trend_arguments() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = AiSettings::default();
        log_token_usage(&db, &settings, record("chat", "claude-3-haiku-20240307", 5, 5, true))
            .await?;

        let far_page = get_token_usage_history(&db, u64::MAX, 20).await?;
        assert!(far_page.items.is_empty());
        assert_eq!(far_page.total, 1);

        let all_time =
            get_token_usage_trends(&db, TrendGranularity::Monthly, i64::MAX, Utc::now()).await?;
        assert_eq!(all_time.len(), 1);
        let negative =
            get_token_usage_trends(&db, TrendGranularity::Daily, i64::MIN, Utc::now()).await?;
        assert_eq!(negative.len(), 1);

        Ok(())
    }
}
