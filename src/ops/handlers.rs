use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::dto::{CleanupResponse, DatabaseInfo, DiagnosticsResponse, TablesInfo};
use crate::{app::preflight, error::AppError, state::AppState};

const RECENT_USERS: i64 = 3;

pub fn diagnostics_routes() -> Router<AppState> {
    Router::new().route("/test", get(diagnostics).options(preflight))
}

pub fn maintenance_routes() -> Router<AppState> {
    Router::new().route("/cleanup", post(cleanup).options(preflight))
}

/// `GET /test`: read-only database introspection.
#[instrument(skip(state))]
pub async fn diagnostics(
    State(state): State<AppState>,
) -> Result<Json<DiagnosticsResponse>, AppError> {
    let report = state.users.report(RECENT_USERS).await?;
    info!(
        users_exists = report.users_exists,
        users_count = report.users_count,
        "diagnostics"
    );
    Ok(Json(DiagnosticsResponse {
        success: true,
        message: "database connection ok",
        database: DatabaseInfo {
            version: report.version,
            connected: true,
            timestamp: OffsetDateTime::now_utc(),
        },
        tables: TablesInfo {
            users_exists: report.users_exists,
            users_count: report.users_count,
            recent_users: report.recent_users,
        },
    }))
}

/// `POST /cleanup`: drops accounts still holding legacy plaintext credentials.
#[instrument(skip(state))]
pub async fn cleanup(State(state): State<AppState>) -> Result<Json<CleanupResponse>, AppError> {
    let deleted_users = state.users.delete_legacy_credentials().await?;
    info!(deleted_users, "legacy credentials cleaned up");
    Ok(Json(CleanupResponse {
        success: true,
        message: "database cleaned",
        deleted_users,
    }))
}
