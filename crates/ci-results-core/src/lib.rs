pub mod aggregate;
pub mod classify;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod model;
pub mod source;
pub mod storage;
