//! Movie Catalog Backend Library
//!
//! Exposes the router, stores and services for the server binary,
//! the importer and the integration tests.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod movies;

pub use app::{build_router, AppState};
pub use config::Config;
