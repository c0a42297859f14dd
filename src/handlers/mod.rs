//! HTTP handlers, one module per area. Handlers take `AuthUser` for identity and
//! re-check capabilities even when a route guard already filtered by role.

pub mod clients;
pub mod dashboard;
pub mod pages;
pub mod posts;
pub mod session;
pub mod tasks;
pub mod users;
pub mod withdrawals;
