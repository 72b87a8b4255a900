//! HTTP handlers for the advice service.

pub mod health;
pub mod predict;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use predict::predict;
