use serde::Serialize;
use time::OffsetDateTime;

use crate::users::repo_types::RecentUser;

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub success: bool,
    pub message: &'static str,
    pub database: DatabaseInfo,
    pub tables: TablesInfo,
}

#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    pub version: String,
    pub connected: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct TablesInfo {
    pub users_exists: bool,
    pub users_count: i64,
    pub recent_users: Vec<RecentUser>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: &'static str,
    pub deleted_users: u64,
}
