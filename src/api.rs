use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::calendar::Calendar;
use crate::ingest::normalize::parse_event_date;
use crate::ingest::types::Credibility;
use crate::period::Period;
use crate::search::{SearchOptions, SortBy, SortOrder, DEFAULT_SUGGESTION_LIMIT};
use crate::store::{DateRange, SearchFilters};

#[derive(Clone)]
pub struct AppState {
    pub calendar: Arc<Calendar>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/events", get(events))
        .route("/search", get(search))
        .route("/search/suggestions", get(suggestions))
        .route("/search/history", get(history).delete(clear_history))
        .route("/search/facets", get(facets))
        .route("/search/analytics", get(analytics))
        .route("/debug/cache", get(debug_cache))
        .route("/debug/cache/periods", get(debug_cache_periods))
        .route("/debug/dead-letters", get(debug_dead_letters))
        .route("/admin/cache/clear-expired", post(admin_clear_expired))
        .route("/admin/cache/clear", post(admin_clear))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// 400 with a JSON `{ "error": ... }` body.
struct BadRequest(String);

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0 }))).into_response()
    }
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct EventsQuery {
    period: Option<String>,
    date: Option<String>,
}

async fn events(
    State(state): State<AppState>,
    Query(q): Query<EventsQuery>,
) -> Result<Response, BadRequest> {
    let period = match (non_blank(&q.period), non_blank(&q.date)) {
        (Some(p), _) => Period::parse(p).ok_or_else(|| BadRequest(format!("invalid period `{p}`")))?,
        (None, Some(d)) => Period::parse(d).ok_or_else(|| BadRequest(format!("invalid date `{d}`")))?,
        (None, None) => Period::current(),
    };
    let page = state.calendar.get_events_for_period(period).await;
    Ok(Json(page).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    blockchain: Option<String>,
    credibility: Option<String>,
    from: Option<String>,
    to: Option<String>,
    /// Comma-separated.
    tags: Option<String>,
    sort: Option<SortBy>,
    order: Option<SortOrder>,
    limit: Option<usize>,
}

/// A bare `yyyy-MM-dd` upper bound covers that whole day.
fn parse_bound(raw: &str, upper: bool) -> Option<DateTime<Utc>> {
    let ts = parse_event_date(&raw.into())?;
    if upper && raw.trim().len() == 10 {
        Some(ts + Duration::days(1) - Duration::milliseconds(1))
    } else {
        Some(ts)
    }
}

impl SearchQuery {
    fn filters(&self) -> Result<SearchFilters, BadRequest> {
        let credibility = match non_blank(&self.credibility) {
            Some(c) => Some(
                Credibility::parse(c).ok_or_else(|| BadRequest(format!("invalid credibility `{c}`")))?,
            ),
            None => None,
        };
        let bound = |v: &Option<String>, upper: bool| -> Result<Option<DateTime<Utc>>, BadRequest> {
            match non_blank(v) {
                Some(s) => parse_bound(s, upper)
                    .map(Some)
                    .ok_or_else(|| BadRequest(format!("invalid date `{s}`"))),
                None => Ok(None),
            }
        };
        let from = bound(&self.from, false)?;
        let to = bound(&self.to, true)?;
        let date_range = (from.is_some() || to.is_some()).then(|| DateRange {
            start: from.unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: to.unwrap_or(DateTime::<Utc>::MAX_UTC),
        });
        Ok(SearchFilters {
            query: None,
            blockchain: non_blank(&self.blockchain).map(str::to_string),
            credibility,
            date_range,
            tags: self
                .tags
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Response, BadRequest> {
    let filters = q.filters()?;
    let options = SearchOptions {
        sort_by: q.sort,
        order: q.order.unwrap_or_default(),
        limit: q.limit,
    };
    let result = state
        .calendar
        .search(q.q.as_deref().unwrap_or_default(), filters, options);
    Ok(Json(result).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct SuggestQuery {
    q: Option<String>,
    limit: Option<usize>,
}

async fn suggestions(State(state): State<AppState>, Query(q): Query<SuggestQuery>) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT).clamp(1, 50);
    Json(state.calendar.suggestions(q.q.as_deref().unwrap_or_default(), limit)).into_response()
}

async fn history(State(state): State<AppState>) -> Response {
    Json(state.calendar.search_history()).into_response()
}

async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.calendar.clear_search_history();
    StatusCode::NO_CONTENT
}

async fn facets(State(state): State<AppState>) -> Response {
    Json(state.calendar.facets()).into_response()
}

async fn analytics(State(state): State<AppState>) -> Response {
    Json(state.calendar.search_analytics()).into_response()
}

async fn debug_cache(State(state): State<AppState>) -> Response {
    Json(state.calendar.cache_stats()).into_response()
}

async fn debug_cache_periods(State(state): State<AppState>) -> Response {
    Json(state.calendar.cached_periods()).into_response()
}

async fn debug_dead_letters(State(state): State<AppState>) -> Response {
    Json(state.calendar.dead_letters()).into_response()
}

async fn admin_clear_expired(State(state): State<AppState>) -> Response {
    let removed = state.calendar.clear_expired();
    tracing::info!(target: "api", removed, "clear-expired requested");
    Json(json!({ "removed": removed })).into_response()
}

async fn admin_clear(State(state): State<AppState>) -> Response {
    state.calendar.clear_all();
    tracing::info!(target: "api", "cache clear requested");
    Json(json!({ "cleared": true })).into_response()
}
