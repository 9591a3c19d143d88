pub mod cache;
pub mod schema;
pub mod store;

pub use cache::{CacheConfig, StoreCaches};
pub use store::{JobRow, Store, StoreOps, WriteTxn};
