//! Identity keys for "same place" and "same billable entry".

use crate::model::{CanonicalEntry, SourceKind};

/// Separator between location components. [`normalize`] never emits it.
const SEPARATOR: &str = "|";
const COMPANY_MARKER: &str = "::company::";
const RESIDENTIAL_MARKER: &str = "::residential";

/// Lowercase, drop commas and periods, collapse whitespace and trim.
#[must_use]
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|ch| !matches!(*ch, ',' | '.'))
        .map(|ch| if ch == '|' { ' ' } else { ch })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key shared by every entry at one physical address.
#[must_use]
pub fn location_key(street: &str, number: &str, city: &str, postal_code: Option<&str>) -> String {
    [street, number, city, postal_code.unwrap_or("")]
        .map(normalize)
        .join(SEPARATOR)
}

/// Key of one commercial subscription: the location refined by owner.
#[must_use]
pub fn commercial_key(location_key: &str, owner: &str) -> String {
    format!("{location_key}{COMPANY_MARKER}{}", normalize(owner))
}

/// Key of one residential subscription: the location alone.
#[must_use]
pub fn residential_key(location_key: &str) -> String {
    format!("{location_key}{RESIDENTIAL_MARKER}")
}

/// Location key of a canonical entry.
#[must_use]
pub fn entry_location_key(entry: &CanonicalEntry) -> String {
    location_key(
        &entry.street,
        &entry.number,
        &entry.city,
        entry.postal_code.as_deref(),
    )
}

/// Entry key of a canonical entry, the unit of merging and deduplication.
#[must_use]
pub fn entry_key(entry: &CanonicalEntry) -> String {
    let location = entry_location_key(entry);
    match entry.source_kind {
        SourceKind::Commercial => {
            commercial_key(&location, entry.owner_label.as_deref().unwrap_or(""))
        }
        SourceKind::Residential => residential_key(&location),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::model::WasteTag;

    fn entry(kind: SourceKind, owner: Option<&str>) -> CanonicalEntry {
        CanonicalEntry {
            street: "Kościelna".to_owned(),
            number: "5".to_owned(),
            city: "Pleszew".to_owned(),
            postal_code: Some("63-300".to_owned()),
            notes: String::new(),
            waste_types: BTreeSet::from([WasteTag::Mixed]),
            declared_containers: Vec::new(),
            source_kind: kind,
            occurrence_count: 1,
            owner_label: owner.map(str::to_owned),
            owner_labels: owner.into_iter().map(str::to_owned).collect(),
            declaration: None,
        }
    }

    #[test]
    fn normalization_is_stable() {
        assert_eq!(
            location_key("Main St", "12", "Springfield", Some("00-000")),
            location_key("  main st ", "12", "SPRINGFIELD", Some("00-000"))
        );
        assert_eq!(normalize("ACME  sp. z o.o."), "acme sp z oo");
        assert_eq!(normalize("a|b"), "a b");
    }

    #[test]
    fn components_cannot_bleed_into_each_other() {
        assert_ne!(
            location_key("Polna 1", "", "Pleszew", None),
            location_key("Polna", "1", "Pleszew", None)
        );
    }

    #[test]
    fn owner_spelling_folds_into_one_key() {
        let first = entry(SourceKind::Commercial, Some("ACME sp. z o.o."));
        let second = entry(SourceKind::Commercial, Some("acme SP. Z O.O."));
        assert_eq!(entry_key(&first), entry_key(&second));
    }

    #[test]
    fn entry_key_refines_location_key() {
        let company = entry(SourceKind::Commercial, Some("ACME"));
        let other = entry(SourceKind::Commercial, Some("Acme Logistics"));
        let home = entry(SourceKind::Residential, None);

        assert_ne!(entry_key(&company), entry_key(&other));
        assert_ne!(entry_key(&company), entry_key(&home));
        assert_eq!(entry_location_key(&company), entry_location_key(&home));
        assert!(entry_key(&home).starts_with(&entry_location_key(&home)));
        assert!(entry_key(&company).ends_with("::company::acme"));
    }
}
