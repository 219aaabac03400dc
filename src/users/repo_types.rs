use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// User account row.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    #[sqlx(rename = "nombre")]
    pub full_name: String,
    pub email: String,
    #[sqlx(rename = "telefono")]
    pub phone: String,
    #[sqlx(rename = "fecha_nacimiento")]
    pub birth_date: Date,
    pub password_hash: String, // argon2 PHC string; legacy rows may hold plaintext
    #[sqlx(rename = "activo")]
    pub active: bool,
    #[sqlx(rename = "intentos_login")]
    pub failed_logins: i32,
    #[sqlx(rename = "bloqueado_hasta")]
    pub locked_until: Option<OffsetDateTime>,
    #[sqlx(rename = "ultimo_acceso")]
    pub last_access_at: Option<OffsetDateTime>,
    #[sqlx(rename = "fecha_registro")]
    pub registered_at: OffsetDateTime,
    #[sqlx(rename = "acepta_newsletter")]
    pub newsletter_opt_in: bool,
}

impl User {
    pub fn is_locked_at(&self, now: OffsetDateTime) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Values for a new account; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Date,
    pub password_hash: String,
    pub newsletter_opt_in: bool,
}

/// Non-sensitive projection used by the diagnostics report.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecentUser {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    #[sqlx(rename = "nombre")]
    pub full_name: String,
    pub email: String,
    #[serde(rename = "fecha_registro", with = "time::serde::rfc3339")]
    #[sqlx(rename = "fecha_registro")]
    pub registered_at: OffsetDateTime,
    #[serde(rename = "activo")]
    #[sqlx(rename = "activo")]
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseReport {
    pub version: String,
    pub users_exists: bool,
    pub users_count: i64,
    pub recent_users: Vec<RecentUser>,
}

/// Legacy rows stored the password value as sent by the browser. Those values
/// start with an uppercase ASCII letter or are shorter than six characters.
pub fn is_legacy_credential(stored: &str) -> bool {
    stored.starts_with(|c: char| c.is_ascii_uppercase()) || stored.chars().count() < 6
}
