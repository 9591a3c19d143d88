pub mod cache;
pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use routes::{router, AppState};
