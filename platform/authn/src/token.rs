use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AuthnError;

/// Claims carried by an access token. The role is deliberately absent: it is
/// looked up on every request so role changes apply without reissuing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// Signature verification collaborator used by the resolver.
pub trait VerifyToken: Send + Sync {
    fn verify(&self, token: &str) -> Result<TokenClaims, AuthnError>;
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AuthnError> {
        let now = Utc::now();
        let exp = now.checked_add_signed(self.ttl).unwrap_or(now);
        let claims = TokenClaims {
            sub: user_id,
            exp: exp.timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AuthnError::Signing(err.to_string()))
    }
}

impl VerifyToken for TokenCodec {
    fn verify(&self, token: &str) -> Result<TokenClaims, AuthnError> {
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(AuthnError::from)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish_non_exhaustive()
    }
}
