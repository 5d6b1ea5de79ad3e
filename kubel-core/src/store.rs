//! Local address store implementations.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{AddressId, NewAddress, PersistedAddress};
use crate::ports::{AddressStore, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Catalog {
    next_id: u64,
    addresses: Vec<PersistedAddress>,
}

impl Catalog {
    fn insert(&mut self, fields: NewAddress) -> PersistedAddress {
        self.next_id += 1;
        let address = PersistedAddress::from_new(AddressId(self.next_id.to_string()), fields);
        self.addresses.push(address.clone());
        address
    }

    fn remove(&mut self, id: &AddressId) -> Result<(), StoreError> {
        let before = self.addresses.len();
        self.addresses.retain(|address| &address.id != id);
        if self.addresses.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }
}

/// Address store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: Mutex<Catalog>,
}

impl MemoryStore {
    /// Store pre-populated with existing records.
    #[must_use]
    pub fn with_addresses(addresses: Vec<PersistedAddress>) -> Self {
        let next_id = addresses
            .iter()
            .filter_map(|address| address.id.0.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            catalog: Mutex::new(Catalog { next_id, addresses }),
        }
    }

    fn catalog(&self) -> Result<MutexGuard<'_, Catalog>, StoreError> {
        self.catalog
            .lock()
            .map_err(|_poisoned| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl AddressStore for MemoryStore {
    async fn list(&self) -> Result<Vec<PersistedAddress>, StoreError> {
        Ok(self.catalog()?.addresses.clone())
    }

    async fn create(&self, fields: NewAddress) -> Result<PersistedAddress, StoreError> {
        Ok(self.catalog()?.insert(fields))
    }

    async fn delete(&self, id: &AddressId) -> Result<(), StoreError> {
        self.catalog()?.remove(id)
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.catalog()?.addresses.clear();
        Ok(())
    }
}

/// Address store persisted as a JSON snapshot file.
///
/// Every call re-reads the file, so several processes see each other's
/// writes but must not write concurrently.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store backed by `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Catalog, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|err| StoreError::Serialization(err.to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Catalog::default()),
            Err(err) => Err(StoreError::Unavailable(format!(
                "cannot read {}: {err}",
                self.path.display()
            ))),
        }
    }

    fn save(&self, catalog: &Catalog) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(catalog)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        fs::write(&self.path, contents).map_err(|err| {
            StoreError::Unavailable(format!("cannot write {}: {err}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), addresses = catalog.addresses.len(), "saved snapshot");
        Ok(())
    }

    fn update<T>(&self, change: impl FnOnce(&mut Catalog) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_poisoned| StoreError::Unavailable("snapshot lock poisoned".into()))?;
        let mut catalog = self.load()?;
        let value = change(&mut catalog)?;
        self.save(&catalog)?;
        Ok(value)
    }
}

#[async_trait]
impl AddressStore for JsonFileStore {
    async fn list(&self) -> Result<Vec<PersistedAddress>, StoreError> {
        Ok(self.load()?.addresses)
    }

    async fn create(&self, fields: NewAddress) -> Result<PersistedAddress, StoreError> {
        self.update(|catalog| Ok(catalog.insert(fields)))
    }

    async fn delete(&self, id: &AddressId) -> Result<(), StoreError> {
        self.update(|catalog| catalog.remove(id))
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.update(|catalog| {
            catalog.addresses.clear();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(street: &str) -> NewAddress {
        NewAddress {
            street: street.to_owned(),
            number: "1".to_owned(),
            city: "Pleszew".to_owned(),
            ..NewAddress::default()
        }
    }

    #[tokio::test]
    async fn memory_store_assigns_ids_and_deletes() {
        let store = MemoryStore::default();
        let first = store.create(fields("Polna")).await.unwrap();
        let second = store.create(fields("Rynek")).await.unwrap();
        assert_ne!(first.id, second.id);

        store.delete(&first.id).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![second]);
        assert!(matches!(
            store.delete(&first.id).await,
            Err(StoreError::NotFound(_))
        ));

        store.delete_all().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seeded_memory_store_continues_numbering() {
        let seeded = PersistedAddress::from_new(AddressId("7".to_owned()), fields("Polna"));
        let store = MemoryStore::with_addresses(vec![seeded]);
        let created = store.create(fields("Rynek")).await.unwrap();
        assert_eq!(created.id, AddressId("8".to_owned()));
    }

    #[tokio::test]
    async fn snapshot_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addresses.json");

        let store = JsonFileStore::new(&path);
        assert!(store.list().await.unwrap().is_empty());
        store.create(fields("Polna")).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.path(), path.as_path());
        let addresses = reopened.list().await.unwrap();
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].street, "Polna");
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addresses.json");
        fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.list().await,
            Err(StoreError::Serialization(_))
        ));
    }
}
