use std::collections::HashMap;

use crate::AllowedRoles;

/// Operation → declared roles, filled once while the service is composed.
///
/// Registration needs `&mut self`; once the registry is moved into a
/// [`crate::Gatekeeper`] it is only ever read. Operations that were never
/// registered are public.
#[derive(Clone, Debug, Default)]
pub struct RoleRegistry {
    entries: HashMap<String, AllowedRoles>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the roles for `operation`. Re-registering replaces the entry.
    pub fn register(&mut self, operation: impl Into<String>, roles: AllowedRoles) -> &mut Self {
        self.entries.insert(operation.into(), roles);
        self
    }

    pub fn lookup(&self, operation: &str) -> Option<&AllowedRoles> {
        self.entries.get(operation)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered operations sorted by name.
    pub fn entries(&self) -> Vec<(&str, &AllowedRoles)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(operation, roles)| (operation.as_str(), roles))
            .collect();
        entries.sort_by_key(|(operation, _)| *operation);
        entries
    }
}

impl<S: Into<String>> FromIterator<(S, AllowedRoles)> for RoleRegistry {
    fn from_iter<I: IntoIterator<Item = (S, AllowedRoles)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (operation, roles) in iter {
            registry.register(operation, roles);
        }
        registry
    }
}
