pub mod file_cache;
pub mod value_cache;

pub use file_cache::FileCache;
pub use value_cache::ValueCache;
