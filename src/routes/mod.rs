/// Router Module Index
///
/// Routes are grouped by who may reach them. Each group gets its guard as a
/// `route_layer` in `create_router`, so a route's access level is decided by the
/// module it is registered in.

/// Anonymous routes: health, sign-in and the published post listing.
pub mod public;

/// The `/app` front controller. Handlers redirect instead of rejecting.
pub mod pages;

/// Any signed-in user.
pub mod authenticated;

/// Administrators and data-entry operators.
pub mod deo;

/// Administrators only, nested under `/admin`.
pub mod admin;
