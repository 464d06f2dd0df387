//! Compute checksums of data.
//!
//! Integrity checking in cfbench relies on comparing a checksum
//! computed locally with the etag the object store reports. Swift
//! computes its etags as the MD5 of the object content, so MD5 is the
//! only algorithm supported here. It is used for compatibility with
//! the store, not for any cryptographic property.

use md5::{Digest, Md5};
use std::fmt;

/// A checksum of some data, as a lower case hexadecimal MD5 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    hex: String,
}

impl Checksum {
    /// Compute the MD5 checksum for a block of data.
    pub fn md5(data: &[u8]) -> Self {
        let mut summer = Checksummer::new();
        summer.update(data);
        summer.finish()
    }

    /// Create a `Checksum` from an etag reported by an object store.
    ///
    /// Etags may arrive quoted (as HTTP entity tags are) and in either
    /// case. Both are normalized away so that comparison works on the
    /// digest alone.
    pub fn from_etag(etag: &str) -> Self {
        let hex = etag.trim().trim_matches('"').to_ascii_lowercase();
        Self { hex }
    }

    /// The digest as lower case hexadecimal.
    pub fn as_str(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

/// Does a checksum computed locally match the one the store reported?
pub fn verify(local: &Checksum, remote: &Checksum) -> bool {
    local == remote
}

/// Compute a checksum incrementally, as data arrives in pieces.
#[derive(Debug, Clone, Default)]
pub struct Checksummer {
    hasher: Md5,
    bytes: u64,
}

impl Checksummer {
    /// Start a new, empty checksum computation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add more data to the checksum.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes summed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Finish the computation.
    pub fn finish(self) -> Checksum {
        let hash = self.hasher.finalize();
        Checksum {
            hex: format!("{:x}", hash),
        }
    }
}
