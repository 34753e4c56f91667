//! Operation identifiers (GraphQL field names) and their declared roles.
//!
//! Operations missing from [`role_registry`] are public.

use platform_authz::{AllowedRoles, Principal, Role, RoleRegistry, decide};
use uuid::Uuid;

pub const RESTAURANTS: &str = "restaurants";
pub const RESTAURANT: &str = "restaurant";
pub const ME: &str = "me";
pub const MY_RESTAURANTS: &str = "myRestaurants";
pub const ORDERS: &str = "orders";
pub const ORDER: &str = "order";
pub const CREATE_ACCOUNT: &str = "createAccount";
pub const LOGIN: &str = "login";
pub const EDIT_PROFILE: &str = "editProfile";
pub const CREATE_RESTAURANT: &str = "createRestaurant";
pub const CREATE_ORDER: &str = "createOrder";
pub const UPDATE_ORDER: &str = "updateOrder";
pub const TAKE_ORDER: &str = "takeOrder";

pub const ALL: [&str; 13] = [
    RESTAURANTS,
    RESTAURANT,
    ME,
    MY_RESTAURANTS,
    ORDERS,
    ORDER,
    CREATE_ACCOUNT,
    LOGIN,
    EDIT_PROFILE,
    CREATE_RESTAURANT,
    CREATE_ORDER,
    UPDATE_ORDER,
    TAKE_ORDER,
];

pub fn role_registry() -> RoleRegistry {
    let mut registry = RoleRegistry::new();
    registry
        .register(ME, AllowedRoles::any())
        .register(EDIT_PROFILE, AllowedRoles::any())
        .register(ORDERS, AllowedRoles::any())
        .register(ORDER, AllowedRoles::any())
        .register(MY_RESTAURANTS, AllowedRoles::only([Role::Owner]))
        .register(CREATE_RESTAURANT, AllowedRoles::only([Role::Owner]))
        .register(CREATE_ORDER, AllowedRoles::only([Role::Client]))
        .register(
            UPDATE_ORDER,
            AllowedRoles::only([Role::Owner, Role::Delivery]),
        )
        .register(TAKE_ORDER, AllowedRoles::only([Role::Delivery]));
    registry
}

/// `(operation, declared roles or "public")`, in [`ALL`] order.
pub fn describe(registry: &RoleRegistry) -> Vec<(&'static str, String)> {
    ALL.iter()
        .map(|op| {
            let roles = registry
                .lookup(op)
                .map_or_else(|| "public".to_string(), ToString::to_string);
            (*op, roles)
        })
        .collect()
}

/// Operations a principal holding `role` may call, public ones included.
pub fn callable_by(registry: &RoleRegistry, role: Role) -> Vec<&'static str> {
    let principal = Principal::new(Uuid::nil(), role);
    ALL.iter()
        .copied()
        .filter(|op| decide(registry.lookup(op), Some(&principal)).is_allowed())
        .collect()
}
