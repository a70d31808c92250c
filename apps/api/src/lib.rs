//! # Tienda API
//!
//! The HTTP surface of the commerce engine.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          tienda-api                                 │
//! │                                                                     │
//! │  caja / mostrador ──► axum router ──► Coordinator ──► SQLite        │
//! │                          │                                          │
//! │                   bearer middleware                                 │
//! │                   (AuthProvider → Identity)                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers parse, authenticate and translate errors; all business rules
//! live in `tienda-core` and `tienda-db`.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

pub use auth::{AuthProvider, Identity, Role, StaticAuthProvider};
pub use config::ApiConfig;
pub use error::ApiError;
pub use routes::{build_router, AppState};
