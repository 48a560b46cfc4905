//! Server configuration.

use clap::Parser;

use crate::relay::DEFAULT_SUBSCRIBER_BUFFER;

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Default session cookie name.
pub const DEFAULT_SESSION_COOKIE: &str = "pinzo_session";

/// Lifetime of the session cookie set after sign-in, in seconds.
pub const SESSION_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Parser)]
#[command(name = "pinzo-server")]
#[command(about = "Pinzo bookmark server with live change relay")]
#[command(version)]
pub struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Public base URL of this server, used to build the sign-in callback
    #[arg(long, default_value = "http://localhost:8080")]
    pub public_url: String,

    /// Identity provider sign-in URL
    #[arg(long, default_value = "http://localhost:9999/authorize")]
    pub auth_provider_url: String,

    /// Path prefix that requires a session
    #[arg(long, default_value = "/dashboard")]
    pub protected_prefix: String,

    /// Sign-in screen path
    #[arg(long, default_value = "/")]
    pub entry_path: String,

    /// Session cookie name
    #[arg(long, default_value = DEFAULT_SESSION_COOKIE)]
    pub session_cookie: String,

    /// Don't mark the session cookie Secure (local development over http)
    #[arg(long, default_value_t = false)]
    pub insecure_cookies: bool,

    /// Per-subscription change buffer, in events
    #[arg(long, default_value_t = DEFAULT_SUBSCRIBER_BUFFER)]
    pub subscriber_buffer: usize,

    /// Required JWT issuer
    #[arg(long)]
    pub jwt_issuer: Option<String>,

    /// Required JWT audience
    #[arg(long)]
    pub jwt_audience: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Runtime server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub public_url: String,
    pub auth_provider_url: String,
    pub protected_prefix: String,
    pub entry_path: String,
    pub session_cookie: String,
    pub secure_cookies: bool,
    pub subscriber_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN.to_string(),
            public_url: "http://localhost:8080".to_string(),
            auth_provider_url: "http://localhost:9999/authorize".to_string(),
            protected_prefix: "/dashboard".to_string(),
            entry_path: "/".to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            secure_cookies: true,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            listen_addr: args.listen,
            public_url: args.public_url.trim_end_matches('/').to_string(),
            auth_provider_url: args.auth_provider_url,
            protected_prefix: args.protected_prefix,
            entry_path: args.entry_path,
            session_cookie: args.session_cookie,
            secure_cookies: !args.insecure_cookies,
            subscriber_buffer: args.subscriber_buffer,
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            ..Default::default()
        }
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_provider_url(mut self, url: impl Into<String>) -> Self {
        self.auth_provider_url = url.into();
        self
    }

    pub fn with_protected_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.protected_prefix = prefix.into();
        self
    }

    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub fn with_subscriber_buffer(mut self, buffer: usize) -> Self {
        self.subscriber_buffer = buffer;
        self
    }

    /// URL the identity provider sends the user back to.
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.public_url)
    }
}
