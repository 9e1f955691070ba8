/// Router Module Index
///
/// Routes are split by access level. `create_router` nests all three under `/api` and
/// wraps the authenticated and admin routers in the `AuthUser` middleware.

/// Anonymous access: health, sign-up/login and the public job and shift boards.
pub mod public;

/// Any authenticated account. Role and ownership checks happen in the handlers.
pub mod authenticated;

/// Administrative endpoints, nested under `/admin`.
pub mod admin;
