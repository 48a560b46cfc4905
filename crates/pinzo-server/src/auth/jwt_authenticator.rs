//! JWT (JSON Web Token) based authentication.
//!
//! Session credentials are JWTs minted by the identity provider after
//! sign-in. This module only verifies them.
//!
//! # Configuration
//!
//! Set `PINZO_JWT_SECRET` with the HMAC secret key, or use
//! `PINZO_JWT_RSA_PUBLIC_KEY` / `PINZO_JWT_EC_PUBLIC_KEY` for public key
//! verification.
//!
//! # JWT Claims
//!
//! The JWT must contain:
//! - `sub`: Subject (user identifier, becomes the record owner id)
//! - `exp`: Expiration timestamp (Unix timestamp)
//!
//! Optional claims:
//! - `iat`, `iss`, `aud`
//! - `email`, `name`, `avatar_url`: profile data shown on the dashboard
//!
//! # Example JWT Payload
//!
//! ```json
//! {
//!   "sub": "user-123",
//!   "email": "ada@example.com",
//!   "exp": 1735689600,
//!   "iss": "https://auth.example.com"
//! }
//! ```

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::identity::{AuthError, AuthService, Identity};

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user identifier).
    pub sub: String,

    /// Expiration time (Unix timestamp).
    pub exp: u64,

    /// Issued at time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<JwtClaims> for Identity {
    fn from(claims: JwtClaims) -> Self {
        Identity {
            owner_id: claims.sub.into(),
            email: claims.email,
            name: claims.name,
            avatar_url: claims.avatar_url,
            expires_at: claims.exp,
        }
    }
}

/// JWT authenticator configuration.
#[derive(Clone)]
pub struct JwtConfig {
    /// Algorithm to use for verification.
    pub algorithm: Algorithm,

    /// Required issuer (if any).
    pub required_issuer: Option<String>,

    /// Required audience (if any).
    pub required_audience: Option<String>,

    /// Leeway in seconds for expiration check.
    pub leeway_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            required_issuer: None,
            required_audience: None,
            leeway_secs: 60,
        }
    }
}

/// JWT authenticator that validates session tokens and extracts identities.
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    config: JwtConfig,
}

impl JwtAuthenticator {
    /// Create a new JWT authenticator with HMAC secret.
    pub fn with_secret(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            config: JwtConfig::default(),
        }
    }

    /// Create a new JWT authenticator with HMAC secret string.
    pub fn with_secret_str(secret: &str) -> Self {
        Self::with_secret(secret.as_bytes())
    }

    /// Create a new JWT authenticator with RSA public key (PEM format).
    pub fn with_rsa_pem(public_key_pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| AuthError::Config(format!("invalid RSA public key: {}", e)))?;

        Ok(Self {
            decoding_key: key,
            config: JwtConfig {
                algorithm: Algorithm::RS256,
                ..Default::default()
            },
        })
    }

    /// Create a new JWT authenticator with EC public key (PEM format).
    pub fn with_ec_pem(public_key_pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_ec_pem(public_key_pem)
            .map_err(|e| AuthError::Config(format!("invalid EC public key: {}", e)))?;

        Ok(Self {
            decoding_key: key,
            config: JwtConfig {
                algorithm: Algorithm::ES256,
                ..Default::default()
            },
        })
    }

    /// Load from environment variables.
    ///
    /// Checks in order:
    /// 1. `PINZO_JWT_SECRET` - HMAC secret
    /// 2. `PINZO_JWT_RSA_PUBLIC_KEY` - RSA public key (PEM)
    /// 3. `PINZO_JWT_EC_PUBLIC_KEY` - EC public key (PEM)
    pub fn from_env() -> Result<Self, AuthError> {
        if let Ok(secret) = std::env::var("PINZO_JWT_SECRET") {
            return Ok(Self::with_secret_str(&secret));
        }

        if let Ok(rsa_key) = std::env::var("PINZO_JWT_RSA_PUBLIC_KEY") {
            return Self::with_rsa_pem(rsa_key.as_bytes());
        }

        if let Ok(ec_key) = std::env::var("PINZO_JWT_EC_PUBLIC_KEY") {
            return Self::with_ec_pem(ec_key.as_bytes());
        }

        Err(AuthError::Config(
            "no JWT secret or public key configured (set PINZO_JWT_SECRET)".to_string(),
        ))
    }

    /// Set the required issuer for validation.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.required_issuer = Some(issuer.into());
        self
    }

    /// Set the required audience for validation.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.config.required_audience = Some(audience.into());
        self
    }

    /// Set the leeway for expiration check.
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.config.leeway_secs = secs;
        self
    }

    /// Verify a JWT token and extract claims.
    pub fn verify_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.leeway = self.config.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        if let Some(ref iss) = self.config.required_issuer {
            validation.set_issuer(&[iss]);
        }

        match self.config.required_audience {
            Some(ref aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::Expired,
                    _ => AuthError::Invalid(format!("JWT verification failed: {}", e)),
                }
            })?;

        Ok(token_data.claims)
    }
}

impl AuthService for JwtAuthenticator {
    fn current_user(&self, credential: &str) -> Result<Identity, AuthError> {
        let token = credential.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let token = token
            .strip_prefix("Bearer ")
            .or_else(|| token.strip_prefix("bearer "))
            .unwrap_or(token);

        let claims = self.verify_token(token)?;
        if claims.sub.is_empty() {
            return Err(AuthError::Invalid("empty subject".to_string()));
        }
        Ok(claims.into())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub(crate) fn create_test_token(secret: &str, claims: &JwtClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    pub(crate) fn test_claims(sub: &str) -> JwtClaims {
        JwtClaims {
            sub: sub.to_string(),
            exp: (std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_secs())
                + 3600, // 1 hour from now
            iat: None,
            iss: None,
            aud: None,
            email: Some(format!("{}@example.com", sub)),
            name: None,
            avatar_url: None,
        }
    }

    #[test]
    fn test_verify_valid_token() {
        let secret = "test-secret-key-for-testing";
        let auth = JwtAuthenticator::with_secret_str(secret);

        let token = create_test_token(secret, &test_claims("test-user"));

        let identity = auth.current_user(&token).unwrap();
        assert_eq!(identity.owner_id.as_str(), "test-user");
        assert_eq!(identity.email.as_deref(), Some("test-user@example.com"));
    }

    #[test]
    fn test_bearer_prefix() {
        let secret = "test-secret-key-for-testing";
        let auth = JwtAuthenticator::with_secret_str(secret);

        let token = create_test_token(secret, &test_claims("test-user"));

        assert!(auth.current_user(&format!("Bearer {}", token)).is_ok());
    }

    #[test]
    fn test_invalid_token() {
        let auth = JwtAuthenticator::with_secret_str("correct-secret");

        // Token signed with different secret
        let bad_token = create_test_token("wrong-secret", &test_claims("test-user"));

        assert!(matches!(
            auth.current_user(&bad_token),
            Err(AuthError::Invalid(_))
        ));
        assert!(matches!(
            auth.current_user("not-a-jwt"),
            Err(AuthError::Invalid(_))
        ));
        assert!(matches!(
            auth.current_user("  "),
            Err(AuthError::MissingCredential)
        ));
    }

    #[test]
    fn test_expired_token() {
        let secret = "test-secret";
        let auth = JwtAuthenticator::with_secret_str(secret);

        let mut claims = test_claims("test-user");
        claims.exp = 1; // Long expired

        let token = create_test_token(secret, &claims);

        assert!(matches!(auth.current_user(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_issuer_validation() {
        let secret = "test-secret";
        let auth = JwtAuthenticator::with_secret_str(secret).with_issuer("trusted-issuer");

        // Token with correct issuer
        let mut claims = test_claims("test-user");
        claims.iss = Some("trusted-issuer".to_string());
        let good_token = create_test_token(secret, &claims);

        assert!(auth.current_user(&good_token).is_ok());

        // Token with wrong issuer
        claims.iss = Some("untrusted-issuer".to_string());
        let bad_token = create_test_token(secret, &claims);

        assert!(auth.current_user(&bad_token).is_err());
    }

    #[test]
    fn test_audience_validation() {
        let secret = "test-secret";
        let auth = JwtAuthenticator::with_secret_str(secret).with_audience("pinzo");

        let mut claims = test_claims("test-user");
        claims.aud = Some("pinzo".to_string());
        assert!(auth.current_user(&create_test_token(secret, &claims)).is_ok());

        claims.aud = Some("someone-else".to_string());
        assert!(auth.current_user(&create_test_token(secret, &claims)).is_err());
    }
}
