//! HTTP surface over the accounts store, the Reddit client and the batch
//! orchestrator.

pub mod accounts;
pub mod auth;
pub mod batches;
pub mod pending;
pub mod response;

pub use response::{ApiError, ApiResponse, ApiResult};

use axum::routing::{get, post};
use axum::Router;
use batch_service::BatchOrchestrator;
use database::Database;
use oauth2::CsrfToken;
use pending::{PendingStore, PENDING_AUTHORIZATION_TTL};
use reddit_client::{AuthorizationFlow, RedditClient};
use redpost_core::{AccountId, AppConfig, BatchConfig};
use serde::Serialize;
use std::sync::Arc;

/// An authorization started from `/api/accounts/{id}/authorize` and not yet
/// completed by the callback.
pub(crate) struct PendingAuthorization {
    pub account_id: AccountId,
    pub state: CsrfToken,
    pub flow: AuthorizationFlow,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub reddit: RedditClient,
    pub orchestrator: BatchOrchestrator,
    pub batch: BatchConfig,
    pub redirect_uri: String,
    pending: Arc<PendingStore<PendingAuthorization>>,
}

impl AppState {
    pub fn new(
        db: Database,
        reddit: RedditClient,
        orchestrator: BatchOrchestrator,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            reddit,
            orchestrator,
            batch: config.batch.clone(),
            redirect_uri: config.reddit.redirect_uri.clone(),
            pending: Arc::new(PendingStore::new(PENDING_AUTHORIZATION_TTL)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route(
            "/api/accounts/{id}",
            get(accounts::get_account)
                .put(accounts::update_account)
                .delete(accounts::delete_account),
        )
        .route("/api/accounts/{id}/authorize", get(auth::start_authorization))
        .route("/auth/callback", get(auth::authorization_callback))
        .route("/api/posts/parse", post(batches::parse_posts))
        .route("/api/batches", post(batches::start_batch))
        .route("/api/batches/{run_id}", get(batches::batch_progress))
        .route("/api/batches/{run_id}/cancel", post(batches::cancel_batch))
        .route("/api/flairs", get(batches::list_flairs))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> ApiResponse<HealthStatus> {
    ApiResponse(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
