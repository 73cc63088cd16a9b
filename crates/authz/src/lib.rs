//! Bearer token handling for the school service.
//!
//! Tokens are HS256 JWTs carrying the subject and a single [`Role`]. The
//! [`TokenAuthority`] both mints tokens (for the operator CLI) and verifies
//! the `Authorization` header of incoming requests.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

const BEARER_PREFIX: &str = "Bearer ";

/// Roles known to the school service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Librarian,
    Teacher,
    Student,
}

impl Role {
    /// Roles allowed to change the catalog and run the issue/return workflow.
    pub const LIBRARY_STAFF: &'static [Role] = &[Role::Admin, Role::Librarian];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Librarian => "librarian",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "librarian" => Ok(Role::Librarian),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(AuthError::UnknownRole(other.to_string())),
        }
    }
}

/// Claims carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Guard: fail with [`AuthError::Forbidden`] unless the caller holds one
    /// of `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AuthError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                role: self.role,
            })
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token signing secret is not configured")]
    MissingSecret,

    #[error("missing bearer token")]
    MissingToken,

    #[error("authorization header is not a bearer token")]
    Malformed,

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("role '{}' is not allowed to perform this action", role.as_str())]
    Forbidden { role: Role },

    #[error("unknown role '{0}'")]
    UnknownRole(String),
}

/// Signs and verifies bearer tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority").finish_non_exhaustive()
    }
}

impl TokenAuthority {
    pub fn new(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Mint a token for `sub` valid for `ttl` from now.
    pub fn issue(&self, sub: &str, role: Role, ttl: Duration) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: sub.to_string(),
            role,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify the raw value of an `Authorization` header.
    ///
    /// An absent header, an empty value and `Bearer ` with nothing after it
    /// are all rejected as a missing token.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let value = header.map(str::trim).unwrap_or_default();
        if value.is_empty() || value == BEARER_PREFIX.trim_end() {
            return Err(AuthError::MissingToken);
        }

        let token = value
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthError::Malformed)?
            .trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        self.verify(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        tracing::trace!(sub = %data.claims.sub, role = data.claims.role.as_str(), "token verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(b"unit-test-secret").unwrap()
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(TokenAuthority::new(b""), Err(AuthError::MissingSecret)));
    }

    #[test]
    fn issued_token_verifies_through_header() {
        let authority = authority();
        let token = authority
            .issue("librarian-1", Role::Librarian, Duration::hours(1))
            .unwrap();

        let claims = authority
            .verify_header(Some(&format!("Bearer {token}")))
            .unwrap();

        assert_eq!(claims.sub, "librarian-1");
        assert_eq!(claims.role, Role::Librarian);
    }

    #[test]
    fn empty_bearer_header_is_missing_token() {
        let authority = authority();
        assert!(matches!(authority.verify_header(None), Err(AuthError::MissingToken)));
        assert!(matches!(authority.verify_header(Some("")), Err(AuthError::MissingToken)));
        assert!(matches!(
            authority.verify_header(Some("Bearer ")),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn non_bearer_scheme_is_malformed() {
        assert!(matches!(
            authority().verify_header(Some("Basic dXNlcjpwYXNz")),
            Err(AuthError::Malformed)
        ));
    }

    #[test]
    fn token_from_other_secret_is_invalid() {
        let other = TokenAuthority::new(b"someone-else").unwrap();
        let token = other.issue("x", Role::Admin, Duration::hours(1)).unwrap();

        assert!(matches!(authority().verify(&token), Err(AuthError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_invalid() {
        let authority = authority();
        let token = authority
            .issue("x", Role::Admin, Duration::seconds(-60))
            .unwrap();

        assert!(matches!(authority.verify(&token), Err(AuthError::Invalid(_))));
    }

    #[test]
    fn role_guard() {
        let claims = Claims {
            sub: "s".into(),
            role: Role::Student,
            iat: 0,
            exp: 0,
        };
        assert!(claims.require_role(Role::LIBRARY_STAFF).is_err());
        assert!(claims.require_role(&[Role::Student]).is_ok());
        assert_eq!("librarian".parse::<Role>().unwrap(), Role::Librarian);
    }
}
