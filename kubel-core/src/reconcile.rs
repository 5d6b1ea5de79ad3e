//! Diffing of merged entries against the persisted address catalog.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::keys::{commercial_key, entry_key, location_key, residential_key};
use crate::model::{CanonicalEntry, PersistedAddress, SourceKind};

/// Marker line carrying owner labels in address notes.
pub const OWNER_MARKER: &str = "Owner:";

/// Entries to create, and how many were already present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Entries whose key is absent from the store.
    pub to_create: Vec<CanonicalEntry>,
    /// Entries whose key the store already holds.
    pub skipped_existing: usize,
}

/// Every entry key occupied by one persisted address.
///
/// Records carrying a [`SourceKind`] use their structured owner labels.
/// Older records are read from the notes: an `Owner:` line yields one
/// commercial key per comma-separated owner, no such line means residential.
#[must_use]
pub fn persisted_entry_keys(address: &PersistedAddress) -> Vec<String> {
    let location = location_key(
        &address.street,
        &address.number,
        &address.city,
        address.postal_code.as_deref(),
    );

    let owners: Option<Vec<String>> = match address.source_kind {
        Some(SourceKind::Commercial) if address.owner_labels.is_empty() => Some(vec![String::new()]),
        Some(SourceKind::Commercial) => Some(address.owner_labels.clone()),
        Some(SourceKind::Residential) => None,
        None => owners_from_notes(&address.notes),
    };

    match owners {
        Some(owners) => owners
            .iter()
            .map(|owner| commercial_key(&location, owner))
            .collect(),
        None => vec![residential_key(&location)],
    }
}

/// Owner labels listed on the first `Owner:` line of `notes`.
#[must_use]
pub fn owners_from_notes(notes: &str) -> Option<Vec<String>> {
    notes
        .lines()
        .find_map(|line| line.trim().strip_prefix(OWNER_MARKER))
        .map(|owners| owners.split(',').map(|owner| owner.trim().to_owned()).collect())
}

/// Split `entries` into those missing from `existing` and a skip count.
///
/// Performs no writes; the caller creates `to_create` in the store.
#[must_use]
pub fn reconcile(entries: Vec<CanonicalEntry>, existing: &[PersistedAddress]) -> Reconciliation {
    let mut known: HashSet<String> = existing.iter().flat_map(persisted_entry_keys).collect();
    debug!(
        persisted = existing.len(),
        keys = known.len(),
        "built existing entry key set"
    );

    let mut result = Reconciliation::default();
    for entry in entries {
        if known.insert(entry_key(&entry)) {
            result.to_create.push(entry);
        } else {
            result.skipped_existing += 1;
        }
    }

    info!(
        to_create = result.to_create.len(),
        skipped = result.skipped_existing,
        "reconciled entries against store"
    );
    result
}
