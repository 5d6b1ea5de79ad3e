//! Reducer for the commercial address registry.
//!
//! Columns after the ordinal: owner, address, container name, declared count,
//! collection frequency. Rows are grouped per location and normalized owner.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use kubel_core::{
    address::parse_address,
    keys::{commercial_key, location_key},
    model::{
        CanonicalEntry, DeclaredContainer, InvalidRow, ParsedAddressFields, RawRow,
        RejectionReason, SourceKind, WasteTag,
    },
    plugin::SourcePlugin,
    ports::{Reduction, RegistryReducer},
    reconcile::OWNER_MARKER,
    waste::{classify, with_mixed_fallback},
};

const OWNER_COLUMN: usize = 1;
const ADDRESS_COLUMN: usize = 2;
const CONTAINER_COLUMN: usize = 3;
const COUNT_COLUMN: usize = 4;
const FREQUENCY_COLUMN: usize = 5;

/// First line of the notes of every commercial address.
pub const COMMERCIAL_MARKER: &str = "Commercial";

/// One commercial registry row with a complete address.
#[derive(Debug, Clone, PartialEq)]
struct CommercialRow {
    owner: String,
    address: ParsedAddressFields,
    container: Option<DeclaredContainer>,
    waste_types: BTreeSet<WasteTag>,
}

impl CommercialRow {
    /// Read the columns of `raw`, rejecting rows without street or city.
    ///
    /// Missing trailing columns are treated as empty.
    fn parse(raw: &RawRow) -> Result<Self, Box<InvalidRow>> {
        let column = move |index: usize| raw.field(index).map(str::trim).unwrap_or_default();

        let owner = column(OWNER_COLUMN).to_owned();
        let raw_address = column(ADDRESS_COLUMN);
        let address = parse_address(raw_address);

        let container = Some(column(CONTAINER_COLUMN))
            .filter(|name| !name.is_empty())
            .map(|name| DeclaredContainer {
                name: name.to_owned(),
                count: parse_count(column(COUNT_COLUMN)),
                frequency: Some(column(FREQUENCY_COLUMN))
                    .filter(|frequency| !frequency.is_empty())
                    .map(str::to_owned),
            });
        let waste_types = container
            .as_ref()
            .map(|container| classify(&container.name))
            .unwrap_or_default();

        if let Some(reason) = RejectionReason::for_fields(raw_address, &address) {
            let declared_containers: Vec<_> = container.into_iter().collect();
            return Err(Box::new(InvalidRow {
                source_kind: SourceKind::Commercial,
                line: raw.line,
                raw_text: raw.raw_text(),
                reason,
                notes: commercial_notes(std::slice::from_ref(&owner), &declared_containers),
                partial: address,
                owner_label: Some(owner).filter(|owner| !owner.is_empty()),
                declared_containers,
                waste_types,
            }));
        }

        Ok(Self {
            owner,
            address,
            container,
            waste_types,
        })
    }
}

/// Parse a declared count; a comma may stand in for the decimal point.
/// Unparseable, negative and non-finite counts are zero.
fn parse_count(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| if ch == ',' { '.' } else { ch })
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|count| count.is_finite() && *count >= 0.0)
        .unwrap_or(0.0)
}

/// Notes text: marker line, owner line, one `Declared:` line per container.
#[must_use]
pub fn commercial_notes(owners: &[String], containers: &[DeclaredContainer]) -> String {
    [
        COMMERCIAL_MARKER.to_owned(),
        format!("{OWNER_MARKER} {}", owners.join(", ")),
    ]
    .into_iter()
    .chain(containers.iter().map(|container| format!("Declared: {container}")))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Entry under construction for one entry key.
#[derive(Debug)]
struct EntryBuilder {
    address: ParsedAddressFields,
    owner_labels: Vec<String>,
    containers: Vec<DeclaredContainer>,
    waste_types: BTreeSet<WasteTag>,
    occurrences: u32,
}

impl EntryBuilder {
    fn seed(row: CommercialRow) -> Self {
        let mut builder = Self {
            address: row.address,
            owner_labels: vec![row.owner],
            containers: Vec::new(),
            waste_types: row.waste_types,
            occurrences: 1,
        };
        builder.add_container(row.container);
        builder
    }

    fn merge(&mut self, row: CommercialRow) {
        self.occurrences += 1;
        if !self.owner_labels.contains(&row.owner) {
            self.owner_labels.push(row.owner);
        }
        self.waste_types.extend(row.waste_types);
        self.add_container(row.container);
    }

    fn add_container(&mut self, container: Option<DeclaredContainer>) {
        let Some(container) = container else {
            return;
        };
        match self.containers.iter_mut().find(|known| {
            known.name == container.name && known.frequency == container.frequency
        }) {
            Some(known) => known.count += container.count,
            None => self.containers.push(container),
        }
    }

    fn build(self) -> CanonicalEntry {
        CanonicalEntry {
            notes: commercial_notes(&self.owner_labels, &self.containers),
            street: self.address.street,
            number: self.address.number,
            city: self.address.city,
            postal_code: self.address.postal_code,
            waste_types: with_mixed_fallback(self.waste_types),
            declared_containers: self.containers,
            source_kind: SourceKind::Commercial,
            occurrence_count: self.occurrences,
            owner_label: self
                .owner_labels
                .first()
                .filter(|owner| !owner.is_empty())
                .cloned(),
            owner_labels: self.owner_labels,
            declaration: None,
        }
    }
}

/// Fold state threaded through the rows of one file.
#[derive(Debug, Default)]
struct Accumulator {
    rows_seen: usize,
    index: HashMap<String, usize>,
    builders: Vec<EntryBuilder>,
    invalid_rows: Vec<InvalidRow>,
}

impl Accumulator {
    fn absorb(mut self, raw: &RawRow) -> Self {
        self.rows_seen += 1;

        let row = match CommercialRow::parse(raw) {
            Ok(row) => row,
            Err(rejected) => {
                warn!(line = raw.line, reason = %rejected.reason, "rejected commercial row");
                self.invalid_rows.push(*rejected);
                return self;
            }
        };

        let location = location_key(
            &row.address.street,
            &row.address.number,
            &row.address.city,
            row.address.postal_code.as_deref(),
        );
        let key = commercial_key(&location, &row.owner);

        if let Some(builder) = self.index.get(&key).and_then(|pos| self.builders.get_mut(*pos)) {
            debug!(line = raw.line, key = %key, "merging commercial row");
            builder.merge(row);
        } else {
            self.index.insert(key, self.builders.len());
            self.builders.push(EntryBuilder::seed(row));
        }
        self
    }

    fn finish(self) -> Reduction {
        Reduction {
            rows_seen: self.rows_seen,
            entries: self.builders.into_iter().map(EntryBuilder::build).collect(),
            invalid_rows: self.invalid_rows,
        }
    }
}

/// Reducer for the commercial registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommercialReducer;

impl RegistryReducer for CommercialReducer {
    fn kind(&self) -> SourceKind {
        SourceKind::Commercial
    }

    fn reduce(&self, rows: &[RawRow]) -> Reduction {
        rows.iter()
            .fold(Accumulator::default(), Accumulator::absorb)
            .finish()
    }
}

/// Build the plugin bundle for the commercial registry.
#[must_use]
pub fn plugin() -> SourcePlugin {
    SourcePlugin {
        name: String::from("commercial"),
        reducer: Arc::new(CommercialReducer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: u64, owner: &str, address: &str, container: &str, count: &str) -> RawRow {
        RawRow::new(line, [&*line.to_string(), owner, address, container, count, "co 2 tyg."])
    }

    #[test]
    fn single_row_becomes_one_entry() {
        let reduction = CommercialReducer.reduce(&[row(
            2,
            "Jan Kowalski",
            "63-300 Pleszew, Kościelna 5",
            "Papier",
            "2",
        )]);

        assert_eq!(reduction.rows_seen, 1);
        assert!(reduction.invalid_rows.is_empty());
        let [entry] = reduction.entries.as_slice() else {
            panic!("expected one entry, got {:?}", reduction.entries);
        };
        assert_eq!(entry.street, "Kościelna");
        assert_eq!(entry.number, "5");
        assert_eq!(entry.city, "Pleszew");
        assert_eq!(entry.postal_code.as_deref(), Some("63-300"));
        assert_eq!(entry.waste_types, BTreeSet::from([WasteTag::Paper]));
        assert_eq!(
            entry.declared_containers,
            vec![DeclaredContainer {
                name: "Papier".to_owned(),
                count: 2.0,
                frequency: Some("co 2 tyg.".to_owned()),
            }]
        );
        assert_eq!(entry.owner_label.as_deref(), Some("Jan Kowalski"));
        assert_eq!(entry.occurrence_count, 1);
        assert_eq!(
            entry.notes,
            "Commercial\nOwner: Jan Kowalski\nDeclared: Papier x2 (co 2 tyg.)"
        );
    }

    #[test]
    fn owner_spellings_fold_and_containers_sum() {
        let reduction = CommercialReducer.reduce(&[
            row(2, "ACME sp. z o.o.", "63-300 Pleszew, Rynek 1", "Papier", "1,5"),
            row(3, "acme SP. Z O.O.", "63-300 Pleszew, Rynek 1", "Papier", "2"),
            row(4, "ACME sp. z o.o.", "63-300 Pleszew, Rynek 1", "Szkło kolorowe", "1"),
        ]);

        let [entry] = reduction.entries.as_slice() else {
            panic!("expected one entry, got {:?}", reduction.entries);
        };
        assert_eq!(entry.occurrence_count, 3);
        assert_eq!(entry.owner_labels, vec!["ACME sp. z o.o.", "acme SP. Z O.O."]);
        assert_eq!(entry.declared_containers.len(), 2);
        assert!((entry.declared_containers[0].count - 3.5).abs() < f64::EPSILON);
        assert_eq!(
            entry.waste_types,
            BTreeSet::from([WasteTag::Paper, WasteTag::GlassColored])
        );
        assert!(entry.notes.contains("Owner: ACME sp. z o.o., acme SP. Z O.O."));
    }

    #[test]
    fn distinct_owners_stay_separate() {
        let reduction = CommercialReducer.reduce(&[
            row(2, "ACME sp. z o.o.", "63-300 Pleszew, Rynek 1", "Papier", "1"),
            row(3, "Acme Logistics", "63-300 Pleszew, Rynek 1", "Papier", "1"),
        ]);
        assert_eq!(reduction.entries.len(), 2);
    }

    #[test]
    fn unclassified_container_falls_back_to_mixed() {
        let reduction =
            CommercialReducer.reduce(&[row(2, "Sklep", "63-300 Pleszew, Polna 2", "Gabaryty", "x")]);
        let [entry] = reduction.entries.as_slice() else {
            panic!("expected one entry");
        };
        assert_eq!(entry.waste_types, BTreeSet::from([WasteTag::Mixed]));
        assert!(entry.declared_containers[0].count.abs() < f64::EPSILON);
    }

    #[test]
    fn rows_without_address_are_rejected_with_salvage() {
        let reduction = CommercialReducer.reduce(&[
            row(2, "Jan Kowalski", "", "Papier", "2"),
            row(3, "Jan Kowalski", "Kościelna 5", "Papier", "2"),
        ]);

        assert!(reduction.entries.is_empty());
        assert_eq!(reduction.invalid_rows.len(), 2);
        let missing = &reduction.invalid_rows[0];
        assert_eq!(missing.reason, RejectionReason::MissingAddress);
        assert_eq!(missing.owner_label.as_deref(), Some("Jan Kowalski"));
        assert_eq!(missing.declared_containers.len(), 1);
        assert_eq!(missing.waste_types, BTreeSet::from([WasteTag::Paper]));
        assert_eq!(reduction.invalid_rows[1].reason, RejectionReason::MissingCity);
        assert_eq!(reduction.invalid_rows[1].partial.street, "Kościelna");
    }

    #[test]
    fn short_row_is_a_missing_address() {
        let reduction = CommercialReducer.reduce(&[RawRow::new(2, ["1", "Jan Kowalski"])]);
        assert_eq!(reduction.rows_seen, 1);
        assert_eq!(reduction.invalid_rows.len(), 1);
        assert_eq!(reduction.invalid_rows[0].reason, RejectionReason::MissingAddress);
    }

    #[test]
    fn count_parsing_tolerates_comma_decimal() {
        assert!((parse_count("2,5") - 2.5).abs() < f64::EPSILON);
        assert!((parse_count(" 3 ") - 3.0).abs() < f64::EPSILON);
        assert!(parse_count("dwa").abs() < f64::EPSILON);
    }

    #[test]
    fn nonsense_counts_are_zero() {
        for raw in ["NaN", "inf", "-infinity", "-2", "1e400"] {
            let count = parse_count(raw);
            assert!(count.is_finite(), "{raw} gave {count}");
            assert!(count.abs() < f64::EPSILON, "{raw} gave {count}");
        }
    }

    #[test]
    fn nan_count_is_not_rendered() {
        let reduction = CommercialReducer.reduce(&[row(
            2,
            "Jan Kowalski",
            "63-300 Pleszew, Kościelna 5",
            "Papier",
            "NaN",
        )]);
        let [entry] = reduction.entries.as_slice() else {
            panic!("expected one entry");
        };
        assert!(entry.notes.ends_with("Declared: Papier x0 (co 2 tyg.)"), "{}", entry.notes);
    }

    #[test]
    fn blank_owner_has_no_label() {
        let reduction =
            CommercialReducer.reduce(&[row(2, "", "63-300 Pleszew, Kościelna 5", "Papier", "1")]);
        let [entry] = reduction.entries.as_slice() else {
            panic!("expected one entry");
        };
        assert_eq!(entry.owner_label, None);

        let rejected = CommercialReducer.reduce(&[row(2, "", "", "Papier", "1")]);
        assert_eq!(rejected.invalid_rows[0].owner_label, None);
    }
}
