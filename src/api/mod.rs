//! HTTP surface: inbound trigger routes, request guards and the outbound client

pub mod http;
pub mod middleware;
pub mod routes;

pub use http::{HttpReply, HttpSecurityConfig, SecureHttpClient};
pub use middleware::{GuardSettings, GuardState};
pub use routes::{AppState, create_router};
