pub mod codec;
pub mod error;
pub mod pattern;
pub mod types;

pub use error::{CacheError, Result};
pub use pattern::GlobMask;
pub use types::{CONTENTS_FIELD, FieldValue, FileMap, FileRecord};
