//! Queue of rejected rows and the operator workflow that resolves them.

use std::collections::BTreeMap;

use tracing::info;

use crate::model::{InvalidRow, InvalidRowId, NewAddress, PersistedAddress, QueuedRow};
use crate::ports::{AddressStore, StoreError};
use crate::waste::with_mixed_fallback;

#[derive(thiserror::Error, Debug)]
/// Errors returned when submitting a corrected row.
pub enum CorrectionError {
    /// Corrected fields are still incomplete.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The row is no longer queued.
    #[error("Invalid row {0} is not queued")]
    NotFound(InvalidRowId),
    /// The store rejected the create call.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Address fields typed in by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectedFields {
    /// Street name.
    pub street: String,
    /// House number.
    pub number: String,
    /// City or locality.
    pub city: String,
    /// Postal code; blank means none.
    pub postal_code: Option<String>,
    /// Replacement notes; `None` keeps the salvaged notes.
    pub notes: Option<String>,
}

impl CorrectedFields {
    /// Pre-fill the form from whatever the reducer salvaged.
    #[must_use]
    pub fn from_row(row: &InvalidRow) -> Self {
        Self {
            street: row.partial.street.clone(),
            number: row.partial.number.clone(),
            city: row.partial.city.clone(),
            postal_code: row.partial.postal_code.clone(),
            notes: None,
        }
    }

    fn validate(&self) -> Result<(), CorrectionError> {
        match (self.street.trim().is_empty(), self.city.trim().is_empty()) {
            (true, true) => Err(CorrectionError::Validation("street and city are required".into())),
            (true, false) => Err(CorrectionError::Validation("street is required".into())),
            (false, true) => Err(CorrectionError::Validation("city is required".into())),
            (false, false) => Ok(()),
        }
    }

    /// Overlay the corrected fields on the row's salvaged data.
    fn merge_into(self, row: &InvalidRow) -> NewAddress {
        NewAddress {
            street: self.street.trim().to_owned(),
            number: self.number.trim().to_owned(),
            city: self.city.trim().to_owned(),
            postal_code: self
                .postal_code
                .map(|code| code.trim().to_owned())
                .filter(|code| !code.is_empty()),
            notes: self.notes.unwrap_or_else(|| row.notes.clone()),
            waste_types: with_mixed_fallback(row.waste_types.clone()),
            declared_containers: row.declared_containers.clone(),
            source_kind: Some(row.source_kind),
            owner_labels: row.owner_label.iter().cloned().collect(),
        }
    }
}

/// Rows waiting for manual correction, keyed by queue id.
#[derive(Debug, Clone, Default)]
pub struct CorrectionQueue {
    rows: BTreeMap<InvalidRowId, InvalidRow>,
}

impl CorrectionQueue {
    /// Queue rows, numbering them from 1 in the given order.
    #[must_use]
    pub fn new(rows: Vec<InvalidRow>) -> Self {
        let rows = (1..)
            .zip(rows)
            .map(|(id, row)| (InvalidRowId(id), row))
            .collect();
        Self { rows }
    }

    /// Number of rows still queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether every row has been resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a queued row.
    #[must_use]
    pub fn get(&self, id: InvalidRowId) -> Option<&InvalidRow> {
        self.rows.get(&id)
    }

    /// Snapshot of the queue in id order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueuedRow> {
        self.rows
            .iter()
            .map(|(id, row)| QueuedRow {
                id: *id,
                row: row.clone(),
            })
            .collect()
    }

    /// Create the corrected address and drop the row from the queue.
    ///
    /// Issues exactly one store create and does not check for duplicates.
    /// The row stays queued when validation or the store call fails.
    ///
    /// # Errors
    ///
    /// Returns [`CorrectionError::Validation`] when street or city is blank,
    /// [`CorrectionError::NotFound`] for an unknown id, or
    /// [`CorrectionError::Store`] when the create call fails.
    pub async fn fix_row(
        &mut self,
        id: InvalidRowId,
        corrected: CorrectedFields,
        store: &dyn AddressStore,
    ) -> Result<PersistedAddress, CorrectionError> {
        let row = self.rows.get(&id).ok_or(CorrectionError::NotFound(id))?;
        corrected.validate()?;

        let created = store.create(corrected.merge_into(row)).await?;
        self.rows.remove(&id);
        info!(row = %id, address = %created.id, "created address from corrected row");
        Ok(created)
    }
}
