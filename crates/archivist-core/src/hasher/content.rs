use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer for streaming digests.
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Length of the short form used in filenames.
pub const SHORT_HASH_LEN: usize = 8;

/// Content-addressed identity of a file: BLAKE3 digest of its bytes.
///
/// Only ever produced by hashing; `short_hash` is always the first
/// eight characters of `full_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentIdentity {
    full_hash: String,
}

impl ContentIdentity {
    fn from_digest(digest: blake3::Hash) -> Self {
        Self {
            full_hash: digest.to_hex().to_string(),
        }
    }

    /// Rebuild an identity from a stored 64-char hex digest.
    pub fn from_stored(full_hash: &str) -> Option<Self> {
        let valid = full_hash.len() == 64
            && full_hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self {
            full_hash: full_hash.to_string(),
        })
    }

    pub fn full_hash(&self) -> &str {
        &self.full_hash
    }

    pub fn short_hash(&self) -> &str {
        &self.full_hash[..SHORT_HASH_LEN]
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_hash)
    }
}

/// Stream `reader` through BLAKE3 in fixed-size chunks.
pub fn hash_content<R: Read>(mut reader: R) -> io::Result<ContentIdentity> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(ContentIdentity::from_digest(hasher.finalize()))
}

pub fn hash_file(path: &Path) -> io::Result<ContentIdentity> {
    let file = File::open(path)?;
    hash_content(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `limit` bytes per read so chunk boundaries move around.
    struct Trickle<R> {
        inner: R,
        limit: usize,
    }

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.inner.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_same_bytes_same_identity() {
        let data = vec![0x5Au8; HASH_CHUNK_SIZE * 3 + 17];
        let a = hash_content(Cursor::new(&data)).unwrap();
        let b = hash_content(Trickle {
            inner: Cursor::new(&data),
            limit: 1000,
        })
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.full_hash(), blake3::hash(&data).to_hex().as_str());
    }

    #[test]
    fn test_short_hash_is_prefix() {
        let id = hash_content(Cursor::new(b"hello archive")).unwrap();
        assert_eq!(id.full_hash().len(), 64);
        assert_eq!(id.short_hash().len(), SHORT_HASH_LEN);
        assert!(id.full_hash().starts_with(id.short_hash()));
    }

    #[test]
    fn test_different_bytes_differ() {
        let a = hash_content(Cursor::new(b"one")).unwrap();
        let b = hash_content(Cursor::new(b"two")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_stored_validates() {
        let id = hash_content(Cursor::new(b"x")).unwrap();
        assert_eq!(ContentIdentity::from_stored(id.full_hash()), Some(id));
        assert!(ContentIdentity::from_stored("abc").is_none());
        assert!(ContentIdentity::from_stored(&"Z".repeat(64)).is_none());
    }
}
