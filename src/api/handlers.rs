use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Deserializer};

use super::{ApiError, AppState, Claims};
use crate::service::{
    ArticleUpdateRequest, ArticlesPage, FeedRenameRequest, FeedSummary,
};
use crate::storage::{Article, ArticleSummary, Feed};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddFeedRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub search_string: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_bookmark: bool,
    pub feed_id: Option<i64>,
}

/// `1`, `t`, `T`, `TRUE`, `true` and `True` are true; anything else is false.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(matches!(
        raw.as_str(),
        "1" | "t" | "T" | "TRUE" | "true" | "True"
    ))
}

pub async fn list_feeds(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<FeedSummary>>, ApiError> {
    Ok(Json(state.aggregator.list_feeds(claims.user_id).await?))
}

/// Failures to subscribe are logged, not returned; the caller always gets
/// the current feed list back.
pub async fn add_feed(
    State(state): State<AppState>,
    claims: Claims,
    req: Result<Json<AddFeedRequest>, JsonRejection>,
) -> Result<Json<Vec<FeedSummary>>, ApiError> {
    let Json(req) = req?;
    let url = req.url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("url is required".to_string()));
    }

    if let Err(e) = state.subscriptions.add_feed(url, claims.user_id).await {
        tracing::warn!(
            user_id = claims.user_id,
            url = %url,
            stage = ?e.stage(),
            error = %e,
            "Add feed failed"
        );
    }

    list_feeds(State(state), claims).await
}

pub async fn delete_feed(
    State(state): State<AppState>,
    claims: Claims,
    feed_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<FeedSummary>>, ApiError> {
    let Path(feed_id) = feed_id?;
    state.subscriptions.delete_feed(feed_id, claims.user_id).await?;
    list_feeds(State(state), claims).await
}

pub async fn update_feed(
    State(state): State<AppState>,
    claims: Claims,
    feed_id: Result<Path<i64>, PathRejection>,
    req: Result<Json<FeedRenameRequest>, JsonRejection>,
) -> Result<Json<Feed>, ApiError> {
    let Path(feed_id) = feed_id?;
    let Json(req) = req?;
    let feed = state
        .subscriptions
        .update_feed(feed_id, claims.user_id, &req)
        .await?;
    Ok(Json(feed))
}

pub async fn search(
    State(state): State<AppState>,
    claims: Claims,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<ArticleSummary>>, ApiError> {
    let Query(params) = params?;
    let results = state
        .queries
        .search(
            &params.search_string,
            params.is_bookmark,
            params.feed_id,
            claims.user_id,
        )
        .await?;
    Ok(Json(results))
}

/// Import errors are logged and the feed list is returned regardless.
pub async fn import_opml(
    State(state): State<AppState>,
    claims: Claims,
    body: Bytes,
) -> Result<Json<Vec<FeedSummary>>, ApiError> {
    if let Err(e) = state.subscriptions.import_opml(&body, claims.user_id).await {
        tracing::warn!(user_id = claims.user_id, error = %e, "OPML import failed");
    }
    list_feeds(State(state), claims).await
}

pub async fn export_opml(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.subscriptions.export_opml(claims.user_id).await?;
    Ok(([(header::CONTENT_TYPE, "application/xml")], bytes))
}

pub async fn get_articles(
    State(state): State<AppState>,
    claims: Claims,
    feed_id: Result<Path<i64>, PathRejection>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<ArticlesPage>, ApiError> {
    let Path(feed_id) = feed_id?;
    let Query(params) = params?;
    let page = state
        .queries
        .get_articles(feed_id, claims.user_id, params.page)
        .await?;
    Ok(Json(page))
}

pub async fn get_bookmarks(
    State(state): State<AppState>,
    claims: Claims,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<ArticlesPage>, ApiError> {
    let Query(params) = params?;
    let page = state
        .queries
        .get_bookmarks(params.page, claims.user_id)
        .await?;
    Ok(Json(page))
}

pub async fn get_article(
    State(state): State<AppState>,
    claims: Claims,
    path: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<Json<Article>, ApiError> {
    let Path((feed_id, id)) = path?;
    let article = state
        .articles
        .get_article(id, feed_id, claims.user_id)
        .await?;
    Ok(Json(article))
}

/// The feed segment of the path is not consulted; ownership is checked
/// through the article's own feed.
pub async fn update_article(
    State(state): State<AppState>,
    claims: Claims,
    path: Result<Path<(i64, i64)>, PathRejection>,
    req: Result<Json<ArticleUpdateRequest>, JsonRejection>,
) -> Result<Json<Article>, ApiError> {
    let Path((_feed_id, id)) = path?;
    let Json(req) = req?;
    let article = state
        .articles
        .update_article(claims.user_id, id, req)
        .await?;
    Ok(Json(article))
}
