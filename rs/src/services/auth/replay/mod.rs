pub mod cached;
pub mod store;

pub use cached::CacheReplayStore;
pub use store::{ReplayError, ReplayStore};
