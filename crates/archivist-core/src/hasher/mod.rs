pub mod content;

pub use content::{
    hash_content, hash_file, ContentIdentity, HASH_CHUNK_SIZE, SHORT_HASH_LEN,
};
