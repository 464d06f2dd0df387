//! Access object stores.
//!
//! An object store holds named containers, each of which holds named
//! objects. The store may be remote and accessed over HTTP, or local
//! and accessed via the file system, or just kept in memory. This
//! module defines the operations every kind of store provides, and
//! picks an implementation based on the configuration.

use crate::checksummer::Checksum;
use crate::config::{Backend, BenchConfig, ConfigError};
use crate::identity::IdentityError;
use crate::localstore::LocalStore;
use crate::memstore::MemoryStore;
use crate::swift::SwiftStore;

use log::info;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::PathBuf;

/// Metadata about an object, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Name of the object within its container.
    pub name: String,
    /// Integrity token the store assigned on upload.
    pub etag: String,
    /// Size of the object content.
    pub bytes: u64,
}

impl ObjectMeta {
    /// The etag as a checksum that can be compared with a local one.
    pub fn checksum(&self) -> Checksum {
        Checksum::from_etag(&self.etag)
    }
}

/// Information about a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Name of the container.
    pub name: String,
    /// Number of objects the store says the container holds.
    pub object_count: u64,
    /// Total size of objects in the container.
    pub bytes_used: u64,
}

/// Content of an object, as a lazy sequence of chunks.
pub type ObjectChunks<'a> = Box<dyn Iterator<Item = Result<Vec<u8>, StorageError>> + Send + 'a>;

/// The operations of an object store.
///
/// All calls block until the store has answered.
pub trait ObjectStore: Send + Sync {
    /// Create a container. Creating a container that exists is not an error.
    fn create_container(&self, name: &str) -> Result<ContainerInfo, StorageError>;

    /// Delete an empty container.
    fn delete_container(&self, name: &str) -> Result<(), StorageError>;

    /// Get information about an existing container.
    fn get_container(&self, name: &str) -> Result<ContainerInfo, StorageError>;

    /// List the objects in a container, ordered by name.
    fn list_objects(&self, container: &str) -> Result<Vec<ObjectMeta>, StorageError>;

    /// Store an object.
    ///
    /// The store verifies `etag` against the data it received and
    /// refuses the object if they differ.
    fn store_object(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        etag: &Checksum,
    ) -> Result<ObjectMeta, StorageError>;

    /// Fetch the content of an object in chunks of at most `chunk_size` bytes.
    fn fetch_object(
        &self,
        container: &str,
        name: &str,
        chunk_size: usize,
    ) -> Result<ObjectChunks<'_>, StorageError>;

    /// Delete every object in a container.
    fn delete_all_objects(&self, container: &str) -> Result<(), StorageError>;

    /// Delete one object.
    fn delete_object(&self, container: &str, name: &str) -> Result<(), StorageError>;
}

/// Open the object store the configuration asks for.
pub fn open_store(config: &BenchConfig) -> Result<Box<dyn ObjectStore>, StorageError> {
    info!("opening {:?} object store", config.backend);
    let store: Box<dyn ObjectStore> = match config.backend {
        Backend::Memory => Box::new(MemoryStore::new()),
        Backend::Local => Box::new(LocalStore::new(&config.local_root)?),
        Backend::Swift => Box::new(SwiftStore::connect(config)?),
    };
    Ok(store)
}

/// Split anything readable into chunks of a fixed maximum size.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Create a new chunk reader.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Vec<u8>, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut chunk = vec![0; self.chunk_size];
        let mut filled = 0;
        while filled < chunk.len() {
            match self.reader.read(&mut chunk[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == IoErrorKind::Interrupted => (),
                Err(err) => {
                    self.done = true;
                    return Some(Err(StorageError::Read(err)));
                }
            }
        }

        if filled == 0 {
            None
        } else {
            chunk.truncate(filled);
            Some(Ok(chunk))
        }
    }
}

/// Broad classes of storage errors, for deciding how to handle them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The network or the service failed; trying again may work.
    Transport,
    /// A container or object does not exist.
    NotFound,
    /// The request conflicts with the state of the store.
    Conflict,
    /// The store received data that does not match its etag.
    ChecksumMismatch,
    /// Anything else.
    Other,
}

/// Possible errors from using an object store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Container does not exist.
    #[error("Container {0} does not exist")]
    ContainerNotFound(String),

    /// Object does not exist.
    #[error("Object {1} does not exist in container {0}")]
    ObjectNotFound(String, String),

    /// Container still has objects, so it can't be deleted.
    #[error("Container {0} is not empty")]
    ContainerNotEmpty(String),

    /// The store computed a different etag for an uploaded object.
    #[error("Store refused object {1} in container {0}: content does not match etag {2}")]
    EtagMismatch(String, String, String),

    /// The store accepted an object without telling its etag.
    #[error("Store gave no etag for object {1} in container {0}")]
    MissingEtag(String, String),

    /// The store answered with an unexpected HTTP status.
    #[error("{0} failed with HTTP status {1}")]
    Status(String, reqwest::StatusCode),

    /// An error from the HTTP library.
    #[error("error from reqwest library: {0}")]
    ReqwestError(reqwest::Error),

    /// Reading object content failed part way.
    #[error("failed to read object content: {0}")]
    Read(std::io::Error),

    /// The configuration does not allow opening the store.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Authenticating with the identity service failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Error parsing JSON.
    #[error("failed to parse JSON: {0}")]
    JsonParse(serde_json::Error),

    /// Error accessing a local store.
    #[error("failed to access {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
}

impl StorageError {
    /// What kind of error is this?
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContainerNotFound(_) | Self::ObjectNotFound(_, _) => ErrorKind::NotFound,
            Self::ContainerNotEmpty(_) => ErrorKind::Conflict,
            Self::EtagMismatch(_, _, _) => ErrorKind::ChecksumMismatch,
            Self::Status(_, status)
                if status.is_server_error()
                    || *status == reqwest::StatusCode::REQUEST_TIMEOUT
                    || *status == reqwest::StatusCode::TOO_MANY_REQUESTS =>
            {
                ErrorKind::Transport
            }
            Self::ReqwestError(_) | Self::Read(_) => ErrorKind::Transport,
            Self::Identity(err) if err.is_transient() => ErrorKind::Transport,
            _ => ErrorKind::Other,
        }
    }

    /// Might the same request succeed if tried again?
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}
