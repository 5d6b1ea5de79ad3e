//! Advisory detection of locations shared by several billable units.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::keys::{entry_key, entry_location_key};
use crate::model::{CanonicalEntry, DuplicateDetail, DuplicateReport, SourceKind};

/// Report every location key that spans more than one entry key or holds
/// repeated residential rows.
///
/// Reports come out in the order their location first appears in `entries`.
#[must_use]
pub fn detect_duplicates(entries: &[CanonicalEntry]) -> Vec<DuplicateReport> {
    let mut order: Vec<(String, Vec<&CanonicalEntry>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let location = entry_location_key(entry);
        if let Some(slot) = index.get(&location).and_then(|pos| order.get_mut(*pos)) {
            slot.1.push(entry);
        } else {
            index.insert(location.clone(), order.len());
            order.push((location, vec![entry]));
        }
    }

    order
        .into_iter()
        .filter(|(_, group)| is_duplicate(group))
        .filter_map(|(location_key, group)| {
            let first = group.first()?;
            let report = DuplicateReport {
                display_label: first.display_label(),
                total_occurrences: group.iter().map(|entry| entry.occurrence_count).sum(),
                source_kinds: group.iter().map(|entry| entry.source_kind).collect(),
                details: group
                    .iter()
                    .map(|entry| DuplicateDetail {
                        source_kind: entry.source_kind,
                        owners: entry.owner_labels.clone(),
                        occurrences: entry.occurrence_count,
                    })
                    .collect(),
                location_key,
            };
            debug!(
                location = %report.location_key,
                occurrences = report.total_occurrences,
                "location shared by several entries"
            );
            Some(report)
        })
        .collect()
}

fn is_duplicate(group: &[&CanonicalEntry]) -> bool {
    let distinct_entries = group
        .iter()
        .map(|entry| entry_key(entry))
        .collect::<BTreeSet<_>>()
        .len();
    let residential_rows: u32 = group
        .iter()
        .filter(|entry| entry.source_kind == SourceKind::Residential)
        .map(|entry| entry.occurrence_count)
        .sum();
    distinct_entries > 1 || residential_rows > 1
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::model::WasteTag;

    fn entry(street: &str, kind: SourceKind, owner: Option<&str>, count: u32) -> CanonicalEntry {
        CanonicalEntry {
            street: street.to_owned(),
            number: "5".to_owned(),
            city: "Pleszew".to_owned(),
            postal_code: Some("63-300".to_owned()),
            notes: String::new(),
            waste_types: BTreeSet::from([WasteTag::Mixed]),
            declared_containers: Vec::new(),
            source_kind: kind,
            occurrence_count: count,
            owner_label: owner.map(str::to_owned),
            owner_labels: owner.into_iter().map(str::to_owned).collect(),
            declaration: None,
        }
    }

    #[test]
    fn two_owners_at_one_location_are_reported() {
        let entries = vec![
            entry("Kościelna", SourceKind::Commercial, Some("ACME sp. z o.o."), 2),
            entry("Polna", SourceKind::Commercial, Some("Solo"), 1),
            entry("Kościelna", SourceKind::Commercial, Some("Acme Logistics"), 1),
        ];
        let reports = detect_duplicates(&entries);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.display_label, "Kościelna 5, 63-300 Pleszew");
        assert_eq!(report.total_occurrences, 3);
        assert_eq!(report.details.len(), 2);
        assert_eq!(report.source_kinds, BTreeSet::from([SourceKind::Commercial]));
    }

    #[test]
    fn repeated_residential_rows_are_reported() {
        let entries = vec![entry("Polna", SourceKind::Residential, None, 2)];
        assert_eq!(detect_duplicates(&entries).len(), 1);
    }

    #[test]
    fn merged_single_owner_is_not_reported() {
        let entries = vec![
            entry("Polna", SourceKind::Commercial, Some("Solo"), 4),
            entry("Rynek", SourceKind::Residential, None, 1),
        ];
        assert!(detect_duplicates(&entries).is_empty());
    }

    #[test]
    fn commercial_and_residential_at_one_location_are_reported() {
        let entries = vec![
            entry("Polna", SourceKind::Commercial, Some("Sklep"), 1),
            entry("Polna", SourceKind::Residential, None, 1),
        ];
        let reports = detect_duplicates(&entries);
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].source_kinds,
            BTreeSet::from([SourceKind::Commercial, SourceKind::Residential])
        );
    }
}
