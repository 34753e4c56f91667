//! Authorization primitives for the delivery API.
//!
//! Operations declare the roles allowed to call them in a [`RoleRegistry`]
//! at startup. Per request a [`ResolvePrincipal`] turns the caller's
//! credential into an optional [`Principal`], and [`decide`] grants or denies.
//! Operations without a declaration are public.

mod decision;
mod gatekeeper;
mod registry;
mod role;

use thiserror::Error;

pub use decision::{Principal, Verdict, decide};
pub use gatekeeper::{Gatekeeper, ResolvePrincipal};
pub use registry::RoleRegistry;
pub use role::{AllowedRoles, Grant, Role};

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("unknown role {0:?}")]
    UnknownRole(String),
}
