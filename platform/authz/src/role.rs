use std::{collections::BTreeSet, fmt, str::FromStr};

use crate::AuthzError;

/// Class of principal. The set is closed and fixed at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Client,
    Owner,
    Delivery,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Client, Role::Owner, Role::Delivery];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::Owner => "Owner",
            Role::Delivery => "Delivery",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| AuthzError::UnknownRole(value.to_string()))
    }
}

/// One entry of an [`AllowedRoles`] set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grant {
    /// Satisfied by any authenticated principal.
    Any,
    Role(Role),
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::Any => f.write_str("Any"),
            Grant::Role(role) => role.fmt(f),
        }
    }
}

/// Roles declared for one operation.
///
/// Backed by an ordered set, so the declaration order of grants never
/// influences equality or decisions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowedRoles(BTreeSet<Grant>);

impl AllowedRoles {
    /// Any authenticated principal.
    pub fn any() -> Self {
        Self(BTreeSet::from([Grant::Any]))
    }

    pub fn only(roles: impl IntoIterator<Item = Role>) -> Self {
        roles.into_iter().map(Grant::Role).collect()
    }

    pub fn allows_any(&self) -> bool {
        self.0.contains(&Grant::Any)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&Grant::Role(role))
    }
}

impl FromIterator<Grant> for AllowedRoles {
    fn from_iter<I: IntoIterator<Item = Grant>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for AllowedRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for grant in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            grant.fmt(f)?;
        }
        Ok(())
    }
}
