mod collection_cache;
mod reconcile;
pub mod refresh;

pub use collection_cache::CollectionCache;
