use std::time::Duration;

use async_trait::async_trait;
use platform_authz::{Principal, ResolvePrincipal, Role};
use uuid::Uuid;

use crate::VerifyToken;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Stored account data needed to build a [`Principal`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<PrincipalRecord> for Principal {
    fn from(record: PrincipalRecord) -> Self {
        Principal::new(record.id, record.role)
    }
}

/// Account store consulted once a token verified.
#[async_trait]
pub trait PrincipalLookup: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<PrincipalRecord>>;
}

/// Resolves `x-jwt` style bearer tokens against an account store.
pub struct TokenResolver<V, L> {
    verifier: V,
    lookup: L,
    timeout: Duration,
}

impl<V, L> TokenResolver<V, L> {
    pub fn new(verifier: V, lookup: L) -> Self {
        Self {
            verifier,
            lookup,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl<V, L> ResolvePrincipal for TokenResolver<V, L>
where
    V: VerifyToken,
    L: PrincipalLookup,
{
    async fn resolve(&self, credential: Option<&str>) -> Option<Principal> {
        let token = credential.map(str::trim).filter(|token| !token.is_empty())?;
        let claims = self.verifier.verify(token).ok()?;
        match tokio::time::timeout(self.timeout, self.lookup.find_by_id(claims.sub)).await {
            Ok(Ok(Some(record))) => Some(record.into()),
            Ok(Ok(None)) | Ok(Err(_)) | Err(_) => None,
        }
    }
}
