//! HTTP handlers, grouped by resource.

pub mod movies;
pub mod users;

pub use movies::movie_routes;
pub use users::user_routes;
