//! Authentication for Pinzo.
//!
//! The auth collaborator is reached through the [`AuthService`] trait:
//! given the opaque session credential carried by a request, it returns the
//! signed-in [`Identity`] or an error. Sign-in itself happens at an external
//! identity provider, which hands back a signed token on `/auth/callback`.
//!
//! # Supported Authentication Methods
//!
//! - **JWT**: JSON Web Tokens verified with an HMAC secret or an RSA/EC
//!   public key
//!
//! # Environment Variable Formats
//!
//! ```text
//! PINZO_JWT_SECRET="your-secret-key"
//! PINZO_JWT_RSA_PUBLIC_KEY="-----BEGIN PUBLIC KEY-----..."
//! PINZO_JWT_EC_PUBLIC_KEY="-----BEGIN PUBLIC KEY-----..."
//! ```

mod credential;
mod identity;
mod jwt_authenticator;

pub use credential::{clear_session_cookie, extract_credential, session_cookie};
pub use identity::{AuthError, AuthService, Identity, SharedAuthService};
pub use jwt_authenticator::{JwtAuthenticator, JwtClaims, JwtConfig};
