//! Data models shared across the credential store, session manager and API handlers.

pub mod user;
