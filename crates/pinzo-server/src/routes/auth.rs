//! Sign-in redirect flow.
//!
//! The identity provider does the actual sign-in and sends the user back to
//! `/auth/callback` with a session token, which becomes the session cookie.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::auth::{clear_session_cookie, session_cookie};
use crate::config::SESSION_MAX_AGE_SECS;
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-in", get(sign_in))
        .route("/auth/callback", get(callback))
        .route("/auth/sign-out", post(sign_out))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(default)]
    token: Option<String>,
}

async fn sign_in(State(state): State<AppState>) -> Result<Response> {
    let separator = if state.config.auth_provider_url.contains('?') {
        '&'
    } else {
        '?'
    };
    let location = format!(
        "{}{}redirect_to={}",
        state.config.auth_provider_url,
        separator,
        urlencoding::encode(&state.config.callback_url())
    );

    redirect(StatusCode::SEE_OTHER, &location, None)
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let Some(token) = params.token.filter(|t| !t.is_empty()) else {
        tracing::warn!("sign-in callback without token");
        return redirect(StatusCode::SEE_OTHER, &state.config.entry_path, None);
    };

    match state.auth.current_user(&token) {
        Ok(identity) => {
            tracing::info!(owner = %identity.owner_id, "signed in");
            let cookie = session_cookie(
                &state.config.session_cookie,
                &token,
                SESSION_MAX_AGE_SECS,
                state.config.secure_cookies,
            );
            redirect(
                StatusCode::SEE_OTHER,
                &state.config.protected_prefix,
                Some(cookie),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "sign-in callback rejected");
            redirect(StatusCode::SEE_OTHER, &state.config.entry_path, None)
        }
    }
}

async fn sign_out(State(state): State<AppState>) -> Result<Response> {
    let cookie = clear_session_cookie(&state.config.session_cookie, state.config.secure_cookies);
    redirect(StatusCode::SEE_OTHER, &state.config.entry_path, Some(cookie))
}

fn redirect(status: StatusCode, location: &str, cookie: Option<String>) -> Result<Response> {
    let location = HeaderValue::from_str(location)
        .map_err(|e| AppError::Internal(format!("invalid redirect target: {}", e)))?;

    let mut response = (status, [(header::LOCATION, location)]).into_response();
    if let Some(cookie) = cookie {
        let cookie = HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::BadRequest(format!("invalid session token: {}", e)))?;
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}
