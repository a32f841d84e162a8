//! HTTP API handlers for meterscan-api

pub mod health;
pub mod measures;
pub mod middleware;

pub use health::health_routes;
pub use measures::measure_routes;
pub use middleware::{rate_limit, security_headers};
