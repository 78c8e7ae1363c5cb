//! API module for all HTTP handlers
//!
//! JSON endpoints used by the embedded trigger form

pub mod handlers;
pub mod repos;
pub mod trigger;

// Re-export handlers
pub use handlers::root;
pub use repos::{get_repo, list_repos};
pub use trigger::trigger_pipeline;
