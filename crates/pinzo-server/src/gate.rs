//! Session gate: per-request transport check, authentication and redirects.
//!
//! The gate keeps no state between requests. [`SessionGate::decide`] is a pure
//! function of the request head; [`session_gate`] only turns its decision
//! into a redirect or forwards the request with the resolved [`Identity`].

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{extract_credential, AuthError, Identity, SharedAuthService};
use crate::config::ServerConfig;
use crate::state::AppState;

/// Header set by the TLS-terminating proxy in front of the server.
pub const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Arrived over plain transport; `301` to this `https://` URL.
    RedirectSecure(String),
    /// Plain transport without a `Host` header, so there is nowhere to send it.
    MissingHost,
    /// Unauthenticated request for a protected path; `307` to this URL.
    RedirectToEntry(String),
    /// Authenticated request for the entry path; `307` to this URL.
    RedirectToProtected(String),
    /// Forward, with the identity if the request is authenticated.
    Pass(Option<Identity>),
}

/// Request classifier.
pub struct SessionGate {
    auth: SharedAuthService,
    cookie_name: String,
    protected_prefix: String,
    entry_path: String,
}

impl SessionGate {
    pub fn new(auth: SharedAuthService, config: &ServerConfig) -> Self {
        Self {
            auth,
            cookie_name: config.session_cookie.clone(),
            protected_prefix: config.protected_prefix.trim_end_matches('/').to_string(),
            entry_path: config.entry_path.clone(),
        }
    }

    /// Resolve the identity behind the request credential, if any.
    ///
    /// Every failure leaves the request unauthenticated.
    pub fn classify(&self, headers: &HeaderMap) -> Option<Identity> {
        let credential = extract_credential(headers, &self.cookie_name)?;
        match self.auth.current_user(&credential) {
            Ok(identity) => Some(identity),
            Err(AuthError::Expired) => {
                tracing::debug!("session credential expired");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "session credential rejected");
                None
            }
        }
    }

    /// Whether `path` is inside the protected area.
    pub fn is_protected(&self, path: &str) -> bool {
        match path.strip_prefix(self.protected_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Decide what to do with a request.
    ///
    /// Transport is checked before any credential is looked at.
    pub fn decide(&self, headers: &HeaderMap, uri: &Uri) -> GateDecision {
        if arrived_insecure(headers) {
            return match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
                Some(host) => GateDecision::RedirectSecure(format!(
                    "https://{}{}",
                    host,
                    path_and_query(uri)
                )),
                None => GateDecision::MissingHost,
            };
        }

        let identity = self.classify(headers);
        let path = uri.path();

        match identity {
            None if self.is_protected(path) => {
                GateDecision::RedirectToEntry(with_query(&self.entry_path, uri))
            }
            Some(_) if path == self.entry_path => {
                GateDecision::RedirectToProtected(with_query(&self.protected_prefix, uri))
            }
            identity => GateDecision::Pass(identity),
        }
    }
}

fn arrived_insecure(headers: &HeaderMap) -> bool {
    headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("http"))
}

fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

fn with_query(path: &str, uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}

/// Gate middleware, installed on every route.
pub async fn session_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.gate.decide(request.headers(), request.uri()) {
        GateDecision::RedirectSecure(location) => {
            tracing::debug!(%location, "redirecting to secure transport");
            redirect(StatusCode::MOVED_PERMANENTLY, &location)
        }
        GateDecision::MissingHost => {
            (StatusCode::BAD_REQUEST, "missing Host header").into_response()
        }
        GateDecision::RedirectToEntry(location) => {
            tracing::debug!(path = request.uri().path(), "unauthenticated, redirecting to entry");
            redirect(StatusCode::TEMPORARY_REDIRECT, &location)
        }
        GateDecision::RedirectToProtected(location) => {
            redirect(StatusCode::TEMPORARY_REDIRECT, &location)
        }
        GateDecision::Pass(identity) => {
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
    }
}

fn redirect(status: StatusCode, location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}
