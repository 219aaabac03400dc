use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::validation::{
    FIELD_BIRTH_DATE, FIELD_EMAIL, FIELD_NAME, FIELD_PASSWORD, FIELD_PHONE,
};
use crate::error::FieldError;
use crate::users::User;

/// Body of `POST /auth`. Which fields are required depends on `action`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthRequest {
    pub action: Option<String>,
    #[serde(rename = "nombre")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "fecha_nacimiento")]
    pub birth_date: Option<String>,
    #[serde(rename = "password_hash", alias = "password")]
    pub password: Option<String>,
    #[serde(rename = "acepta_newsletter")]
    pub newsletter_opt_in: Option<bool>,
}

/// Body of `POST /auth/validate`: any subset of the registration form.
#[derive(Debug, Default, Deserialize)]
pub struct FieldCheckRequest {
    #[serde(rename = "nombre")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "fecha_nacimiento")]
    pub birth_date: Option<String>,
    #[serde(rename = "password_hash", alias = "password")]
    pub password: Option<String>,
}

impl FieldCheckRequest {
    /// Present, non-blank fields paired with their wire names.
    pub fn present_fields(&self) -> Vec<(&'static str, &str)> {
        [
            (FIELD_NAME, &self.full_name),
            (FIELD_EMAIL, &self.email),
            (FIELD_PHONE, &self.phone),
            (FIELD_BIRTH_DATE, &self.birth_date),
            (FIELD_PASSWORD, &self.password),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| (field, v))
        })
        .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct FieldCheckResponse {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

/// Response returned after login or registration.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: PublicUser,
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub full_name: String,
    pub email: String,
    #[serde(
        rename = "fecha_registro",
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub registered_at: Option<OffsetDateTime>,
}

impl PublicUser {
    pub fn summary(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            registered_at: None,
        }
    }

    pub fn with_registration(user: &User) -> Self {
        Self {
            registered_at: Some(user.registered_at),
            ..Self::summary(user)
        }
    }
}

/// Profile returned by `GET /me`.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub full_name: String,
    pub email: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "fecha_nacimiento")]
    pub birth_date: String,
    #[serde(rename = "acepta_newsletter")]
    pub newsletter_opt_in: bool,
    #[serde(rename = "fecha_registro", with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
    #[serde(rename = "ultimo_acceso", with = "time::serde::rfc3339::option")]
    pub last_access_at: Option<OffsetDateTime>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            phone: user.phone,
            birth_date: user.birth_date.to_string(),
            newsletter_opt_in: user.newsletter_opt_in,
            registered_at: user.registered_at,
            last_access_at: user.last_access_at,
        }
    }
}
