pub mod admin;
pub mod auth;
pub mod events;

pub use admin::*;
pub use auth::*;
pub use events::*;
