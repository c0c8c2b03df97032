//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **health**: TCP reachability probe and process memory figures backing
//!   the health collaborator port
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod health;
