//! An object store in a local directory.
//!
//! Each container is a sub-directory of the store's root directory.
//! Each object is stored as two files: the content, and its metadata
//! as JSON. File names are the hexadecimal encoding of the container
//! and object names, so any name the store accepts is a safe file name.

use crate::checksummer::Checksum;
use crate::objectstore::{
    ChunkReader, ContainerInfo, ObjectChunks, ObjectMeta, ObjectStore, StorageError,
};

use log::debug;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DATA_SUFFIX: &str = "data";
const META_SUFFIX: &str = "meta";

/// An object store in the local file system.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at a directory, creating it if needed.
    pub fn new(root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root).map_err(|err| StorageError::Io(root.to_path_buf(), err))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn container_dir(&self, container: &str) -> PathBuf {
        self.root.join(encode(container))
    }

    // Construct names of the files for an object. The directory
    // containing them is returned first.
    fn filenames(&self, container: &str, name: &str) -> (PathBuf, PathBuf, PathBuf) {
        let dir = self.container_dir(container);
        let base = encode(name);
        let meta = dir.join(format!("{}.{}", base, META_SUFFIX));
        let data = dir.join(format!("{}.{}", base, DATA_SUFFIX));
        (dir, meta, data)
    }

    fn existing_container(&self, container: &str) -> Result<PathBuf, StorageError> {
        let dir = self.container_dir(container);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StorageError::ContainerNotFound(container.to_string()))
        }
    }
}

impl ObjectStore for LocalStore {
    fn create_container(&self, name: &str) -> Result<ContainerInfo, StorageError> {
        let dir = self.container_dir(name);
        if !dir.exists() {
            debug!("creating container directory {}", dir.display());
            std::fs::create_dir_all(&dir).map_err(|err| StorageError::Io(dir.clone(), err))?;
        }
        self.get_container(name)
    }

    fn delete_container(&self, name: &str) -> Result<(), StorageError> {
        let dir = self.existing_container(name)?;
        if !self.list_objects(name)?.is_empty() {
            return Err(StorageError::ContainerNotEmpty(name.to_string()));
        }
        std::fs::remove_dir_all(&dir).map_err(|err| StorageError::Io(dir, err))
    }

    fn get_container(&self, name: &str) -> Result<ContainerInfo, StorageError> {
        let objects = self.list_objects(name)?;
        Ok(ContainerInfo {
            name: name.to_string(),
            object_count: objects.len() as u64,
            bytes_used: objects.iter().map(|o| o.bytes).sum(),
        })
    }

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let dir = self.existing_container(container)?;
        let entries = std::fs::read_dir(&dir).map_err(|err| StorageError::Io(dir.clone(), err))?;

        let mut objects = vec![];
        for entry in entries {
            let path = entry
                .map_err(|err| StorageError::Io(dir.clone(), err))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(META_SUFFIX) {
                continue;
            }
            let json = match std::fs::read(&path) {
                Ok(json) => json,
                // Deleted since the directory was read.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StorageError::Io(path, err)),
            };
            let meta: ObjectMeta =
                serde_json::from_slice(&json).map_err(StorageError::JsonParse)?;
            objects.push(meta);
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    fn store_object(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        etag: &Checksum,
    ) -> Result<ObjectMeta, StorageError> {
        self.existing_container(container)?;

        let actual = Checksum::md5(&data);
        if &actual != etag {
            return Err(StorageError::EtagMismatch(
                container.to_string(),
                name.to_string(),
                etag.to_string(),
            ));
        }

        let (_, metaname, dataname) = self.filenames(container, name);
        let meta = ObjectMeta {
            name: name.to_string(),
            etag: actual.to_string(),
            bytes: data.len() as u64,
        };
        let json = serde_json::to_vec(&meta).map_err(StorageError::JsonParse)?;

        // Content goes first, so that a listed object can always be read.
        std::fs::write(&dataname, &data).map_err(|err| StorageError::Io(dataname, err))?;
        std::fs::write(&metaname, json).map_err(|err| StorageError::Io(metaname, err))?;
        Ok(meta)
    }

    fn fetch_object(
        &self,
        container: &str,
        name: &str,
        chunk_size: usize,
    ) -> Result<ObjectChunks<'_>, StorageError> {
        self.existing_container(container)?;
        let (_, _, dataname) = self.filenames(container, name);
        let file = match File::open(&dataname) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound(
                    container.to_string(),
                    name.to_string(),
                ))
            }
            Err(err) => return Err(StorageError::Io(dataname, err)),
        };
        Ok(Box::new(ChunkReader::new(file, chunk_size)))
    }

    fn delete_all_objects(&self, container: &str) -> Result<(), StorageError> {
        for object in self.list_objects(container)? {
            match self.delete_object(container, &object.name) {
                Ok(()) | Err(StorageError::ObjectNotFound(_, _)) => (),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn delete_object(&self, container: &str, name: &str) -> Result<(), StorageError> {
        self.existing_container(container)?;
        let (_, metaname, dataname) = self.filenames(container, name);
        match std::fs::remove_file(&metaname) {
            Ok(()) => (),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound(
                    container.to_string(),
                    name.to_string(),
                ))
            }
            Err(err) => return Err(StorageError::Io(metaname, err)),
        }
        std::fs::remove_file(&dataname).map_err(|err| StorageError::Io(dataname, err))
    }
}

fn encode(name: &str) -> String {
    hex::encode(name)
}

#[cfg(test)]
mod test {
    use super::{encode, LocalStore};
    use crate::checksummer::Checksum;
    use crate::objectstore::{ObjectStore, StorageError};
    use tempfile::tempdir;

    #[test]
    fn encodes_names_as_hex() {
        assert_eq!(encode("a/b"), "612f62");
        assert_eq!(encode("ñ"), "c3b1");
    }

    #[test]
    fn stores_lists_and_fetches() {
        let tmp = tempdir().unwrap();
        let store = LocalStore::new(tmp.path()).unwrap();
        store.create_container("bench").unwrap();

        let data = b"some content".to_vec();
        let sum = Checksum::md5(&data);
        let meta = store
            .store_object("bench", "ñame", data.clone(), &sum)
            .unwrap();
        assert_eq!(meta.checksum(), sum);

        let listed = store.list_objects("bench").unwrap();
        assert_eq!(listed, vec![meta]);

        let fetched: Vec<Vec<u8>> = store
            .fetch_object("bench", "ñame", 4)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(fetched.concat(), data);
    }

    #[test]
    fn survives_reopen() {
        let tmp = tempdir().unwrap();
        {
            let store = LocalStore::new(tmp.path()).unwrap();
            store.create_container("c").unwrap();
            store
                .store_object("c", "x", b"1".to_vec(), &Checksum::md5(b"1"))
                .unwrap();
        }
        let store = LocalStore::new(tmp.path()).unwrap();
        assert_eq!(store.get_container("c").unwrap().object_count, 1);
    }

    #[test]
    fn missing_container_is_not_found() {
        let tmp = tempdir().unwrap();
        let store = LocalStore::new(tmp.path()).unwrap();
        assert!(matches!(
            store.list_objects("nope"),
            Err(StorageError::ContainerNotFound(_))
        ));
        assert!(matches!(
            store.delete_container("nope"),
            Err(StorageError::ContainerNotFound(_))
        ));
    }

    #[test]
    fn deletes_everything() {
        let tmp = tempdir().unwrap();
        let store = LocalStore::new(tmp.path()).unwrap();
        store.create_container("c").unwrap();
        for name in ["a", "b", "c"] {
            store
                .store_object("c", name, name.as_bytes().to_vec(), &Checksum::md5(name.as_bytes()))
                .unwrap();
        }
        assert!(matches!(
            store.delete_container("c"),
            Err(StorageError::ContainerNotEmpty(_))
        ));
        store.delete_all_objects("c").unwrap();
        assert!(store.list_objects("c").unwrap().is_empty());
        store.delete_container("c").unwrap();
        assert!(!tmp.path().join(encode("c")).exists());
    }
}
