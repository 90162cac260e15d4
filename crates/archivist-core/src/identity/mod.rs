pub mod entity_id;
pub mod filename;
pub mod retry;

pub use entity_id::{allocate_entity_id, EntityId, EntityTable, ShortIdLookup, SHORT_ID_LEN};
pub use filename::derive_filename;
pub use retry::{retry_bounded, RetryError};

pub const DEFAULT_MAX_ID_ATTEMPTS: u32 = 100;
