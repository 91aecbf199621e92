// Core moderation module - message filtering, warnings and auto-delete.
// Models and ports first, then the services built on them.

pub mod auto_delete;
pub mod bio_resolver;
pub mod error_boundary;
pub mod link_detector;
pub mod moderation_models;
pub mod moderation_ports;
pub mod moderation_service;
pub mod policy;
pub mod ttl_cache;
pub mod violation_detector;
pub mod warning_service;

#[cfg(test)]
pub mod test_support;

pub use error_boundary::run_guarded;
pub use moderation_models::*;
pub use moderation_ports::*;
pub use moderation_service::*;
