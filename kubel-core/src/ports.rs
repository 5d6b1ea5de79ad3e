//! Traits describing the collaborators of the import engine and shared helper types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{
    AddressId, CanonicalEntry, InvalidRow, NewAddress, PersistedAddress, RawRow, SourceKind,
};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to the address store.
pub enum StoreError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The store could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// The requested address does not exist.
    #[error("Address not found: {0}")]
    NotFound(AddressId),
    /// Store payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
/// Persistence for the canonical address catalog.
///
/// The import engine only ever calls [`AddressStore::list`] and
/// [`AddressStore::create`].
pub trait AddressStore: Send + Sync {
    /// Every persisted address.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend cannot be read.
    async fn list(&self) -> Result<Vec<PersistedAddress>, StoreError>;

    /// Persist a new address.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend rejects the write.
    async fn create(&self, fields: NewAddress) -> Result<PersistedAddress, StoreError>;

    /// Remove one address.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or another
    /// [`StoreError`] when the backend fails.
    async fn delete(&self, id: &AddressId) -> Result<(), StoreError>;

    /// Remove every address.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn delete_all(&self) -> Result<(), StoreError>;
}

/// Output of reducing one registry file.
#[derive(Debug, Clone, Default)]
pub struct Reduction {
    /// Data rows consumed.
    pub rows_seen: usize,
    /// Merged entries in first-seen order.
    pub entries: Vec<CanonicalEntry>,
    /// Rows rejected for a missing street or city.
    pub invalid_rows: Vec<InvalidRow>,
}

/// Groups the rows of one registry schema into canonical entries.
pub trait RegistryReducer: Send + Sync {
    /// Registry schema handled by this reducer.
    fn kind(&self) -> SourceKind;

    /// Fold data rows (header already removed) into entries and rejections.
    fn reduce(&self, rows: &[RawRow]) -> Reduction;
}
