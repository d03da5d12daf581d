use std::future::Future;
use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
        password,
        repo_types::User,
    },
    error::ApiError,
    state::AppState,
};

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 32;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Awaits a store call under the configured budget; an elapsed timer is
/// reported as an upstream timeout instead of hanging the request.
async fn store_call<T, F>(budget: Duration, fut: F) -> Result<T, ApiError>
where
    F: Future<Output = sqlx::Result<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(res) => res.map_err(ApiError::from),
        Err(_) => Err(ApiError::UpstreamTimeout("database")),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let length = payload.password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&length) {
        warn!(length, "password length out of bounds");
        return Err(ApiError::Validation(format!(
            "Password must be {}-{} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }

    if !state.domains.is_valid_domain(&payload.email).await? {
        warn!(email = %payload.email, "email domain has no MX records");
        return Err(ApiError::InvalidEmailDomain);
    }

    let budget = state.config.db_timeout;
    if store_call(budget, User::exists_by_email(&state.db, &payload.email)).await? {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::EmailAlreadyRegistered);
    }

    let hash = password::hash_password(&payload.password)?;

    // Two concurrent registrations can both pass the pre-check; the unique
    // constraint decides, and its violation maps to the same 409.
    let user = store_call(budget, User::create(&state.db, &payload.email, &hash)).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(RegisterResponse {
        status: "registered",
        user_id: user.id,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let creds = store_call(
        state.config.db_timeout,
        User::find_credentials_by_email(&state.db, &payload.email),
    )
    .await?;

    // Unknown email and wrong password must be indistinguishable.
    let Some(creds) = creds else {
        warn!(email = %payload.email, "login unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if !password::verify_password(&payload.password, &creds.password_hash) {
        warn!(email = %payload.email, user_id = %creds.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    info!(user_id = %creds.id, email = %payload.email, "user logged in");
    Ok(Json(LoginResponse {
        status: "login success",
        user_id: creds.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::StaticVerifier;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn email_regex_accepts_plausible_addresses() {
        assert!(is_valid_email("a@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("user@no-dot-tld"));
    }

    #[test]
    fn response_bodies_match_the_wire_contract() {
        let user_id = Uuid::new_v4();
        let registered = serde_json::to_value(RegisterResponse {
            status: "registered",
            user_id,
        })
        .unwrap();
        assert_eq!(registered["status"], "registered");
        assert_eq!(registered["user_id"], user_id.to_string());

        let logged_in = serde_json::to_value(LoginResponse {
            status: "login success",
            user_id,
        })
        .unwrap();
        assert_eq!(logged_in["status"], "login success");
        assert_eq!(logged_in["user_id"], user_id.to_string());
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() {
        let state = AppState::fake();
        let payload = RegisterRequest {
            email: "not-an-email".into(),
            password: "password1".into(),
        };
        let err = register(State(state), Json(payload))
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn register_rejects_out_of_bounds_password() {
        for bad in ["short".to_string(), "x".repeat(33)] {
            let state = AppState::fake();
            let payload = RegisterRequest {
                email: "a@example.com".into(),
                password: bad,
            };
            let err = register(State(state), Json(payload))
                .await
                .err()
                .expect("should reject");
            assert!(matches!(err, ApiError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn register_accepts_boundary_password_lengths_past_validation() {
        // With the domain verifier denying, an 8- or 32-char password gets
        // past input validation and fails on the domain check instead.
        for ok in ["x".repeat(8), "x".repeat(32)] {
            let mut state = AppState::fake();
            state.domains = Arc::new(StaticVerifier(false));
            let payload = RegisterRequest {
                email: "a@example.com".into(),
                password: ok,
            };
            let err = register(State(state), Json(payload))
                .await
                .err()
                .expect("domain check should reject");
            assert!(matches!(err, ApiError::InvalidEmailDomain));
        }
    }

    #[tokio::test]
    async fn register_rejects_domain_without_mx() {
        let mut state = AppState::fake();
        state.domains = Arc::new(StaticVerifier(false));
        let payload = RegisterRequest {
            email: "user@nonexistent-domain-xyz.invalid".into(),
            password: "password1".into(),
        };
        let err = register(State(state), Json(payload))
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::InvalidEmailDomain));
    }

    #[tokio::test]
    async fn login_rejects_invalid_email() {
        let state = AppState::fake();
        let payload = LoginRequest {
            email: "   ".into(),
            password: "password1".into(),
        };
        let err = login(State(state), Json(payload))
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
