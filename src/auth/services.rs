use axum::extract::FromRef;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use tracing::{info, warn};

use crate::auth::dto::AuthRequest;
use crate::auth::password::{hash_password, is_phc_hash, password_matches, plaintext_matches};
use crate::auth::validation::{
    self, FIELD_BIRTH_DATE, FIELD_EMAIL, FIELD_NAME, FIELD_PASSWORD, FIELD_PHONE,
};
use crate::config::{LockoutConfig, LOCKOUT_MINUTES_RANGE};
use crate::error::{AppError, FieldError};
use crate::state::AppState;
use crate::users::repo_types::{is_legacy_credential, NewUser};
use crate::users::{User, UserStore};

/// When (if ever) repeated login failures set the lockout timestamp.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub threshold: Option<i32>,
    pub duration: Duration,
}

impl LockoutPolicy {
    pub fn disabled() -> Self {
        Self {
            threshold: None,
            duration: Duration::ZERO,
        }
    }

    pub fn from_config(cfg: &LockoutConfig) -> Self {
        Self {
            threshold: cfg.threshold.filter(|t| *t > 0),
            duration: Duration::minutes(
                cfg.minutes
                    .clamp(*LOCKOUT_MINUTES_RANGE.start(), *LOCKOUT_MINUTES_RANGE.end()),
            ),
        }
    }

    /// Lockout deadline once the failure counter reaches `failures`.
    /// Saturates at the latest representable instant.
    pub fn lock_after(&self, failures: i32, now: OffsetDateTime) -> Option<OffsetDateTime> {
        match self.threshold {
            Some(t) if failures >= t => Some(
                now.checked_add(self.duration)
                    .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc()),
            ),
            _ => None,
        }
    }
}

impl FromRef<AppState> for LockoutPolicy {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.lockout)
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register(users: &dyn UserStore, req: AuthRequest) -> Result<User, AppError> {
    let (Some(full_name), Some(email), Some(phone), Some(birth_date), Some(password)) = (
        present(req.full_name.as_deref()),
        present(req.email.as_deref()),
        present(req.phone.as_deref()),
        present(req.birth_date.as_deref()),
        present(req.password.as_deref()),
    ) else {
        warn!("register with missing fields");
        return Err(AppError::MissingFields);
    };

    let full_name = full_name.trim();
    let email = normalize_email(email);
    let phone = phone.trim();

    if users.email_exists(&email).await? {
        warn!(email = %email, "email already registered");
        return Err(AppError::EmailTaken);
    }

    let errors = validation::check_fields([
        (FIELD_NAME, full_name),
        (FIELD_EMAIL, email.as_str()),
        (FIELD_PHONE, phone),
        (FIELD_BIRTH_DATE, birth_date),
        (FIELD_PASSWORD, password),
    ]);
    if !errors.is_empty() {
        warn!(count = errors.len(), "register failed validation");
        return Err(AppError::Validation(errors));
    }
    let birth_date = validation::parse_birth_date(birth_date).ok_or_else(|| {
        AppError::Validation(vec![FieldError {
            field: FIELD_BIRTH_DATE,
            message: "invalid birth date",
        }])
    })?;

    let password_hash = hash_password(password)?;
    let created = users
        .create(NewUser {
            full_name: full_name.to_string(),
            email: email.clone(),
            phone: phone.to_string(),
            birth_date,
            password_hash,
            newsletter_opt_in: req.newsletter_opt_in.unwrap_or(false),
        })
        .await?;

    match created {
        Some(user) => {
            info!(user_id = %user.id, "user registered");
            Ok(user)
        }
        None => {
            warn!(email = %email, "email registered concurrently");
            Err(AppError::EmailTaken)
        }
    }
}

/// Checks run in order: credentials present, account exists, not locked,
/// password matches, account active. Plaintext rows that survive cleanup are
/// compared exactly once and then rehashed.
pub async fn login(
    users: &dyn UserStore,
    policy: &LockoutPolicy,
    req: AuthRequest,
) -> Result<User, AppError> {
    let (Some(email), Some(password)) = (
        present(req.email.as_deref()),
        present(req.password.as_deref()),
    ) else {
        warn!("login with missing fields");
        return Err(AppError::MissingFields);
    };
    let email = normalize_email(email);

    let Some(user) = users.find_by_email(&email).await? else {
        users.record_failed_login(&email, policy).await?;
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if user.is_locked_at(OffsetDateTime::now_utc()) {
        warn!(user_id = %user.id, "login while locked");
        return Err(AppError::Locked);
    }

    let stored = user.password_hash.as_str();
    let (matched, upgrade) = if is_legacy_credential(stored) {
        warn!(user_id = %user.id, "account still holds a legacy credential");
        (false, false)
    } else if is_phc_hash(stored) {
        (password_matches(password, stored), false)
    } else {
        (plaintext_matches(password, stored), true)
    };
    if !matched {
        users.record_failed_login(&email, policy).await?;
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if !user.active {
        warn!(user_id = %user.id, "login on inactive account");
        return Err(AppError::Inactive);
    }

    if upgrade {
        users
            .upgrade_credential(user.id, &hash_password(password)?)
            .await?;
        info!(user_id = %user.id, "plaintext credential rehashed");
    }
    users.record_successful_login(user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(user)
}
