//! Authentication Module
//! Mission: Credentials, session tokens, reset tokens and route guards

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod reset_token;
pub mod user_store;

pub use jwt::JwtHandler;
pub use middleware::{protect, restrict, CurrentUser};
pub use user_store::UserStore;
