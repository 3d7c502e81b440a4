use std::sync::{Arc, Mutex};

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use notesync_core::db::{Database, SqliteRecordStore};
use notesync_core::{ItemPayload, SyncManager, SyncOptions, SyncResponse, SyncSettings};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

/// Header set by the upstream auth gateway once it has verified the caller.
const PRINCIPAL_HEADER: &str = "x-principal-id";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    settings: Arc<SyncSettings>,
    db: Arc<Mutex<Database>>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> notesync_core::Result<Self> {
        let db = Database::open(&config.database_path)?;
        Ok(Self {
            settings: Arc::new(config.sync_settings()),
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }

    /// Run blocking store work off the async workers while holding the
    /// database lock.
    async fn with_database<T, F>(&self, work: F) -> Result<T, AppError>
    where
        F: FnOnce(&Database) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let db = db
                .lock()
                .map_err(|_| AppError::Unavailable("database lock poisoned".to_string()))?;
            work(&db)
        })
        .await
        .map_err(|err| AppError::Internal(format!("database task failed: {err}")))?
    }
}

/// Verified caller identity, inserted by [`require_principal`].
#[derive(Debug, Clone)]
pub struct Principal(pub String);

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/items/sync", post(sync_items))
        .route("/items/destroy", post(destroy_items))
        .route_layer(middleware::from_fn(require_principal));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn require_principal(mut request: Request, next: Next) -> Result<Response, AppError> {
    let principal = extract_principal(request.headers())?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn extract_principal(headers: &HeaderMap) -> Result<Principal, AppError> {
    let value = headers
        .get(PRINCIPAL_HEADER)
        .ok_or_else(|| AppError::unauthorized("Missing X-Principal-Id header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("X-Principal-Id header is not valid UTF-8"))?
        .trim();

    if value.is_empty() {
        return Err(AppError::unauthorized("X-Principal-Id header is empty"));
    }
    Ok(Principal(value.to_string()))
}

#[derive(Debug, Default, Deserialize)]
struct SyncRequest {
    /// Absent and `null` both mean nothing to push
    items: Option<Vec<ItemPayload>>,
    sync_token: Option<String>,
    cursor_token: Option<String>,
    limit: Option<usize>,
}

async fn sync_items(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    let options = SyncOptions {
        sync_token: request.sync_token,
        cursor_token: request.cursor_token,
        limit: request.limit,
        fallback_on_invalid_token: false,
    };

    let items = request.items.unwrap_or_default();
    let settings = Arc::clone(&state.settings);

    let response = state
        .with_database(move |db| {
            let store = SqliteRecordStore::new(db.connection());
            let manager =
                SyncManager::new(&store, principal.0)?.with_settings((*settings).clone());
            Ok(manager.sync(&items, &options)?)
        })
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct DestroyRequest {
    uuids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DestroyResponse {
    deleted: usize,
}

async fn destroy_items(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<DestroyRequest>,
) -> Result<Json<DestroyResponse>, AppError> {
    let deleted = state
        .with_database(move |db| {
            let store = SqliteRecordStore::new(db.connection());
            let manager = SyncManager::new(&store, principal.0)?;
            Ok(manager.destroy_items(&request.uuids)?)
        })
        .await?;
    Ok(Json(DestroyResponse { deleted }))
}
