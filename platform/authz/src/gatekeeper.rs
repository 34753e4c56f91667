use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{Principal, RoleRegistry, Verdict, decide};

/// Turns a presented credential into a principal.
///
/// Implementations must fold every failure (bad token, unknown user,
/// unreachable store, timeout) into `None`.
#[async_trait]
pub trait ResolvePrincipal: Send + Sync {
    async fn resolve(&self, credential: Option<&str>) -> Option<Principal>;
}

/// Registry plus resolver, shared across request tasks.
#[derive(Clone)]
pub struct Gatekeeper {
    registry: Arc<RoleRegistry>,
    resolver: Arc<dyn ResolvePrincipal>,
}

impl Gatekeeper {
    pub fn new(registry: RoleRegistry, resolver: impl ResolvePrincipal + 'static) -> Self {
        Self {
            registry: Arc::new(registry),
            resolver: Arc::new(resolver),
        }
    }

    pub async fn resolve(&self, credential: Option<&str>) -> Option<Principal> {
        self.resolver.resolve(credential).await
    }

    /// Decide for a principal that was already resolved for this request.
    pub fn check(&self, operation: &str, principal: Option<&Principal>) -> Verdict {
        let verdict = decide(self.registry.lookup(operation), principal);
        if !verdict.is_allowed() {
            debug!(operation, "operation denied");
        }
        verdict
    }

    /// Resolve `credential` and decide in one step.
    pub async fn authorize(&self, operation: &str, credential: Option<&str>) -> Verdict {
        // public operations never touch the resolver
        if self.registry.lookup(operation).is_none() {
            return Verdict::Allow;
        }
        let principal = self.resolve(credential).await;
        self.check(operation, principal.as_ref())
    }
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("operations", &self.registry.len())
            .finish_non_exhaustive()
    }
}
