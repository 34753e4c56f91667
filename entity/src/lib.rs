//! sea-orm entities for accounts, restaurants and orders.

pub mod orders;
pub mod restaurants;
pub mod users;
