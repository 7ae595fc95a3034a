//! REST surface under `/rss`.
//!
//! Handlers trust a [`Claims`] value placed in the request extensions by an
//! upstream authentication layer. [`build_router`] installs
//! [`trusted_user_header`] for deployments behind an authenticating proxy.

mod error;
mod handlers;

use axum::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, put};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::config::Config;
use crate::feed::FeedFetcher;
use crate::service::{
    ArticleQueryEngine, ArticleStateManager, FeedAggregator, ReadCascade, Subscriptions,
};
use crate::storage::Database;

/// Header carrying the authenticated user id, set by the fronting proxy
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claims {
    pub user_id: i64,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Claims {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .copied()
            .ok_or(ApiError::Unauthorized)
    }
}

/// Services shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: FeedAggregator,
    pub queries: ArticleQueryEngine,
    pub articles: ArticleStateManager,
    pub subscriptions: Subscriptions,
}

impl AppState {
    pub fn new(db: Database, config: &Config, fetcher: FeedFetcher, cascade: ReadCascade) -> Self {
        Self {
            aggregator: FeedAggregator::new(db.clone(), config),
            queries: ArticleQueryEngine::new(db.clone(), config),
            articles: ArticleStateManager::new(db.clone(), cascade),
            subscriptions: Subscriptions::new(db, fetcher),
        }
    }
}

/// Turn `X-User-Id` into [`Claims`]; requests without a valid id get 401.
pub async fn trusted_user_header(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(Claims { user_id });
    Ok(next.run(req).await)
}

/// Routes only. The caller must provide [`Claims`] through its own layer.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/rss", get(handlers::list_feeds).post(handlers::add_feed))
        .route("/rss/search", get(handlers::search))
        .route(
            "/rss/opml",
            get(handlers::export_opml).post(handlers::import_opml),
        )
        .route("/rss/articles/bookmarks", get(handlers::get_bookmarks))
        .route(
            "/rss/:feed_id",
            put(handlers::update_feed).delete(handlers::delete_feed),
        )
        .route("/rss/:feed_id/articles", get(handlers::get_articles))
        .route(
            "/rss/:feed_id/articles/:id",
            get(handlers::get_article).put(handlers::update_article),
        )
        .with_state(state)
}

/// Routes behind header authentication, with request tracing.
pub fn build_router(state: AppState) -> Router {
    routes(state)
        .layer(middleware::from_fn(trusted_user_header))
        .layer(TraceLayer::new_for_http())
}
