use uuid::Uuid;

use crate::{AllowedRoles, Role};

/// Identity resolved for a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn is_allowed(self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Decide whether `principal` may run an operation declared with `allowed`.
///
/// `allowed == None` means the operation never declared roles and is
/// public. Any declaration, `Any` included, requires a principal.
pub fn decide(allowed: Option<&AllowedRoles>, principal: Option<&Principal>) -> Verdict {
    let Some(allowed) = allowed else {
        return Verdict::Allow;
    };
    let Some(principal) = principal else {
        return Verdict::Deny;
    };
    if allowed.allows_any() || allowed.contains(principal.role) {
        Verdict::Allow
    } else {
        Verdict::Deny
    }
}
