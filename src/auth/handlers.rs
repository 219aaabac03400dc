use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    app::preflight,
    auth::{
        dto::{
            AuthRequest, AuthResponse, FieldCheckRequest, FieldCheckResponse, ProfileResponse,
            PublicUser,
        },
        extractors::SessionUser,
        services::{self, LockoutPolicy},
        session::SessionKeys,
        validation,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", post(auth).options(preflight))
        .route("/auth/validate", post(validate_fields).options(preflight))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).options(preflight))
}

/// `POST /auth`: dispatches on the `action` field.
#[instrument(skip(state, payload))]
pub async fn auth(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload.map_err(|e| {
        warn!(error = %e, "rejected auth body");
        AppError::MalformedBody
    })?;

    match req.action.as_deref() {
        Some("register") => register(&state, req).await.map(IntoResponse::into_response),
        Some("login") => login(&state, req).await.map(IntoResponse::into_response),
        other => {
            warn!(action = ?other, "invalid auth action");
            Err(AppError::InvalidAction)
        }
    }
}

async fn register(
    state: &AppState,
    req: AuthRequest,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = services::register(state.users.as_ref(), req).await?;
    let session = SessionKeys::from_ref(state).issue(user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "user registered",
            user: PublicUser::with_registration(&user),
            token: session.token,
            expires_at: session.expires_at,
        }),
    ))
}

async fn login(state: &AppState, req: AuthRequest) -> Result<Json<AuthResponse>, AppError> {
    let policy = LockoutPolicy::from_ref(state);
    let user = services::login(state.users.as_ref(), &policy, req).await?;
    let session = SessionKeys::from_ref(state).issue(user.id)?;

    Ok(Json(AuthResponse {
        success: true,
        message: "login successful",
        user: PublicUser::summary(&user),
        token: session.token,
        expires_at: session.expires_at,
    }))
}

/// `POST /auth/validate`: field feedback for forms being filled in.
#[instrument(skip(payload))]
pub async fn validate_fields(
    payload: Result<Json<FieldCheckRequest>, JsonRejection>,
) -> Result<Json<FieldCheckResponse>, AppError> {
    let Json(req) = payload.map_err(|e| {
        warn!(error = %e, "rejected validate body");
        AppError::MalformedBody
    })?;
    let errors = validation::check_fields(req.present_fields());
    Ok(Json(FieldCheckResponse {
        valid: errors.is_empty(),
        errors,
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        error!(user_id = %user_id, "session for missing user");
        AppError::Unauthorized("user not found")
    })?;
    info!(user_id = %user.id, "profile read");
    Ok(Json(ProfileResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::memory::MemoryUserStore;
    use serde_json::Value;
    use std::sync::Arc;

    fn register_body(email: &str) -> AuthRequest {
        AuthRequest {
            action: Some("register".into()),
            full_name: Some("Luis Pérez".into()),
            email: Some(email.into()),
            phone: Some("5512345678".into()),
            birth_date: Some("1985-11-30".into()),
            password: Some("Secur3pass".into()),
            newsletter_opt_in: None,
        }
    }

    fn login_body(email: &str, password: &str) -> AuthRequest {
        AuthRequest {
            action: Some("login".into()),
            email: Some(email.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    fn expect_err<T>(res: Result<T, AppError>) -> AppError {
        match res {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        }
    }

    async fn body_json(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn register_returns_201_with_summary_and_token() {
        let store = Arc::new(MemoryUserStore::new());
        let state = AppState::fake(store.clone());
        let res = auth(State(state.clone()), Ok(Json(register_body("luis@example.com"))))
            .await
            .expect("register");
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["nombre"], "Luis Pérez");
        assert_eq!(body["user"]["email"], "luis@example.com");
        assert!(body["user"]["fecha_registro"].is_string());
        assert!(body["user"].get("password_hash").is_none());

        let token = body["token"].as_str().expect("token");
        let claims = SessionKeys::from_ref(&state).verify(token).expect("verify");
        assert_eq!(claims.sub.to_string(), body["user"]["id"].as_str().unwrap());
        assert!(!store.get("luis@example.com").unwrap().newsletter_opt_in);
    }

    #[tokio::test]
    async fn login_returns_200_without_registration_time() {
        let store = Arc::new(MemoryUserStore::new());
        let state = AppState::fake(store);
        auth(State(state.clone()), Ok(Json(register_body("luis@example.com"))))
            .await
            .expect("register");

        let res = auth(
            State(state),
            Ok(Json(login_body("luis@example.com", "Secur3pass"))),
        )
        .await
        .expect("login");
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["user"]["email"], "luis@example.com");
        assert!(body["user"].get("fecha_registro").is_none());
        assert!(body["token"].is_string());
        assert!(body["expires_at"].is_string());
    }

    #[tokio::test]
    async fn unknown_action_is_bad_request() {
        let state = AppState::fake(Arc::new(MemoryUserStore::new()));
        let req = AuthRequest {
            action: Some("delete".into()),
            ..Default::default()
        };
        let err = expect_err(auth(State(state.clone()), Ok(Json(req))).await);
        assert!(matches!(err, AppError::InvalidAction));

        let err = expect_err(auth(State(state), Ok(Json(AuthRequest::default()))).await);
        assert!(matches!(err, AppError::InvalidAction));
    }

    #[tokio::test]
    async fn lockout_threshold_from_config_applies() {
        let store = Arc::new(MemoryUserStore::new());
        let state = AppState::fake_with(store.clone(), Some(3));
        auth(State(state.clone()), Ok(Json(register_body("luis@example.com"))))
            .await
            .expect("register");
        for _ in 0..3 {
            let err = expect_err(
                auth(
                    State(state.clone()),
                    Ok(Json(login_body("luis@example.com", "Wr0ngpass"))),
                )
                .await,
            );
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
        let err = expect_err(
            auth(
                State(state),
                Ok(Json(login_body("luis@example.com", "Secur3pass"))),
            )
            .await,
        );
        assert_eq!(err.status(), StatusCode::LOCKED);
        assert_eq!(store.get("luis@example.com").unwrap().failed_logins, 3);
    }

    #[tokio::test]
    async fn validate_reports_only_present_fields() {
        let req = FieldCheckRequest {
            email: Some("not-an-email".into()),
            phone: Some("5512345678".into()),
            ..Default::default()
        };
        let Json(res) = validate_fields(Ok(Json(req))).await.expect("validate");
        assert!(!res.valid);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].field, "email");

        let Json(res) = validate_fields(Ok(Json(FieldCheckRequest::default())))
            .await
            .expect("validate");
        assert!(res.valid);
        assert!(res.errors.is_empty());
    }

    #[tokio::test]
    async fn me_returns_profile_for_session() {
        let store = Arc::new(MemoryUserStore::new());
        let state = AppState::fake(store.clone());
        auth(State(state.clone()), Ok(Json(register_body("luis@example.com"))))
            .await
            .expect("register");
        let id = store.get("luis@example.com").unwrap().id;

        let Json(profile) = get_me(State(state), SessionUser(id)).await.expect("me");
        assert_eq!(profile.email, "luis@example.com");
        assert_eq!(profile.phone, "5512345678");
        assert_eq!(profile.birth_date, "1985-11-30");
    }

    #[tokio::test]
    async fn me_for_deleted_user_is_unauthorized() {
        let state = AppState::fake(Arc::new(MemoryUserStore::new()));
        let err = expect_err(get_me(State(state), SessionUser(uuid::Uuid::new_v4())).await);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
