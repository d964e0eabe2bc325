//! Movie Catalog Module
//! Mission: Store, validate and query the movie collection

pub mod models;
pub mod query;
pub mod store;

pub use models::{Movie, MovieInput, MoviePatch, NewMovie};
pub use query::{MovieQuery, QueryError};
pub use store::MovieStore;
