//! An object store kept in memory.
//!
//! Nothing is persisted: the store disappears with the process. It is
//! useful for dry runs of the benchmark, which then measure only the
//! cost of generating and checksumming data.

use crate::checksummer::Checksum;
use crate::objectstore::{
    ChunkReader, ContainerInfo, ObjectChunks, ObjectMeta, ObjectStore, StorageError,
};

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct StoredObject {
    meta: ObjectMeta,
    data: Arc<[u8]>,
}

type Container = BTreeMap<String, StoredObject>;

/// An object store in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: Mutex<HashMap<String, Container>>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all containers, sorted.
    pub fn container_names(&self) -> Vec<String> {
        let containers = self.containers.lock().unwrap();
        let mut names: Vec<String> = containers.keys().cloned().collect();
        names.sort();
        names
    }

    fn info(name: &str, container: &Container) -> ContainerInfo {
        ContainerInfo {
            name: name.to_string(),
            object_count: container.len() as u64,
            bytes_used: container.values().map(|o| o.meta.bytes).sum(),
        }
    }
}

impl ObjectStore for MemoryStore {
    fn create_container(&self, name: &str) -> Result<ContainerInfo, StorageError> {
        let mut containers = self.containers.lock().unwrap();
        let container = containers.entry(name.to_string()).or_default();
        Ok(Self::info(name, container))
    }

    fn delete_container(&self, name: &str) -> Result<(), StorageError> {
        let mut containers = self.containers.lock().unwrap();
        match containers.get(name) {
            None => Err(StorageError::ContainerNotFound(name.to_string())),
            Some(container) if !container.is_empty() => {
                Err(StorageError::ContainerNotEmpty(name.to_string()))
            }
            Some(_) => {
                containers.remove(name);
                Ok(())
            }
        }
    }

    fn get_container(&self, name: &str) -> Result<ContainerInfo, StorageError> {
        let containers = self.containers.lock().unwrap();
        containers
            .get(name)
            .map(|container| Self::info(name, container))
            .ok_or_else(|| StorageError::ContainerNotFound(name.to_string()))
    }

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let containers = self.containers.lock().unwrap();
        let objects = containers
            .get(container)
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))?;
        Ok(objects.values().map(|o| o.meta.clone()).collect())
    }

    fn store_object(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
        etag: &Checksum,
    ) -> Result<ObjectMeta, StorageError> {
        let actual = Checksum::md5(&data);
        if &actual != etag {
            return Err(StorageError::EtagMismatch(
                container.to_string(),
                name.to_string(),
                etag.to_string(),
            ));
        }

        let mut containers = self.containers.lock().unwrap();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))?;
        let meta = ObjectMeta {
            name: name.to_string(),
            etag: actual.to_string(),
            bytes: data.len() as u64,
        };
        objects.insert(
            name.to_string(),
            StoredObject {
                meta: meta.clone(),
                data: Arc::from(data),
            },
        );
        Ok(meta)
    }

    fn fetch_object(
        &self,
        container: &str,
        name: &str,
        chunk_size: usize,
    ) -> Result<ObjectChunks<'_>, StorageError> {
        let containers = self.containers.lock().unwrap();
        let objects = containers
            .get(container)
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))?;
        let object = objects.get(name).ok_or_else(|| {
            StorageError::ObjectNotFound(container.to_string(), name.to_string())
        })?;
        let data = Arc::clone(&object.data);
        Ok(Box::new(ChunkReader::new(Cursor::new(data), chunk_size)))
    }

    fn delete_all_objects(&self, container: &str) -> Result<(), StorageError> {
        let mut containers = self.containers.lock().unwrap();
        containers
            .get_mut(container)
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))?
            .clear();
        Ok(())
    }

    fn delete_object(&self, container: &str, name: &str) -> Result<(), StorageError> {
        let mut containers = self.containers.lock().unwrap();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))?;
        match objects.remove(name) {
            Some(_) => Ok(()),
            None => Err(StorageError::ObjectNotFound(
                container.to_string(),
                name.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::MemoryStore;
    use crate::checksummer::Checksum;
    use crate::objectstore::{ObjectStore, StorageError};

    fn store(store: &MemoryStore, name: &str, data: &[u8]) {
        store
            .store_object("c", name, data.to_vec(), &Checksum::md5(data))
            .unwrap();
    }

    #[test]
    fn create_container_twice_gives_one_container() {
        let mem = MemoryStore::new();
        mem.create_container("bench").unwrap();
        mem.create_container("bench").unwrap();
        assert_eq!(mem.container_names(), vec!["bench".to_string()]);
    }

    #[test]
    fn stores_and_fetches() {
        let mem = MemoryStore::new();
        mem.create_container("c").unwrap();
        store(&mem, "obj", b"hello, world");

        let chunks: Vec<Vec<u8>> = mem
            .fetch_object("c", "obj", 5)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(chunks.concat(), b"hello, world");
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn refuses_wrong_etag() {
        let mem = MemoryStore::new();
        mem.create_container("c").unwrap();
        let err = mem
            .store_object("c", "obj", b"data".to_vec(), &Checksum::md5(b"other"))
            .unwrap_err();
        assert!(matches!(err, StorageError::EtagMismatch(..)));
        assert!(mem.list_objects("c").unwrap().is_empty());
    }

    #[test]
    fn lists_in_name_order() {
        let mem = MemoryStore::new();
        mem.create_container("c").unwrap();
        store(&mem, "b", b"2");
        store(&mem, "a", b"1");
        let names: Vec<String> = mem
            .list_objects("c")
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn will_not_delete_non_empty_container() {
        let mem = MemoryStore::new();
        mem.create_container("c").unwrap();
        store(&mem, "a", b"1");
        assert!(matches!(
            mem.delete_container("c"),
            Err(StorageError::ContainerNotEmpty(_))
        ));
        mem.delete_all_objects("c").unwrap();
        mem.delete_container("c").unwrap();
        assert!(matches!(
            mem.get_container("c"),
            Err(StorageError::ContainerNotFound(_))
        ));
    }
}
