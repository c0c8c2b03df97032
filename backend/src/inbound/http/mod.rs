//! HTTP inbound adapter exposing REST endpoints.

pub mod classifier;
pub mod demo_users;
pub mod envelope;
pub mod error;
pub mod health;
pub mod root;
pub mod state;
pub mod validated;
pub mod validation;

pub use error::ApiResult;
