//! Platform authentication helpers.
//!
//! Issues and verifies signed access tokens, hashes account passwords, and
//! provides [`TokenResolver`], the [`platform_authz::ResolvePrincipal`]
//! implementation used by the server.

mod password;
mod resolver;
mod token;

use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

pub use password::{MIN_PASSWORD_LEN, hash_password, verify_password};
pub use resolver::{DEFAULT_LOOKUP_TIMEOUT, PrincipalLookup, PrincipalRecord, TokenResolver};
pub use token::{TokenClaims, TokenCodec, VerifyToken};

/// Request header carrying the access token.
pub const CREDENTIAL_HEADER: &str = "x-jwt";

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    InvalidToken,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<jsonwebtoken::errors::Error> for AuthnError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthnError::Expired,
            _ => AuthnError::InvalidToken,
        }
    }
}
