//! Data Transfer Objects and database row types.
//!
//! Every payload derives `ToSchema` for the OpenAPI document and `TS` for the generated
//! TypeScript bindings; row types also derive `sqlx::FromRow`.

pub mod application;
pub mod attendance;
pub mod clock;
pub mod job;
pub mod location;
pub mod shift;
pub mod user;
pub mod wallet;

pub use application::*;
pub use attendance::*;
pub use job::*;
pub use location::*;
pub use shift::*;
pub use user::*;
pub use wallet::*;
