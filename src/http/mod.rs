//! HTTP surface: router, health and identity checks

pub mod middleware;
pub mod routes;

pub use routes::build_router;
