//! Reducer for the residential address registry.
//!
//! Columns after the ordinal: address, declaration number, change-of-status
//! date, resident count, rate. One dwelling is one subscription, so rows are
//! grouped by location alone.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use kubel_core::{
    address::parse_address,
    keys::{location_key, residential_key},
    model::{
        CanonicalEntry, Declaration, InvalidRow, ParsedAddressFields, RawRow, RejectionReason,
        SourceKind, WasteTag,
    },
    plugin::SourcePlugin,
    ports::{Reduction, RegistryReducer},
};

const ADDRESS_COLUMN: usize = 1;
const DECLARATION_COLUMN: usize = 2;
const CHANGED_ON_COLUMN: usize = 3;
const RESIDENTS_COLUMN: usize = 4;
const RATE_COLUMN: usize = 5;

// Day-first forms come from spreadsheet exports, ISO from the billing system.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d.%m.%Y", "%d-%m-%Y", "%Y.%m.%d", "%d/%m/%Y"];

/// First line of the notes of every residential address.
pub const RESIDENTIAL_MARKER: &str = "Residential";

/// One residential registry row with a complete address.
#[derive(Debug, Clone, PartialEq)]
struct ResidentialRow {
    address: ParsedAddressFields,
    declaration: Declaration,
}

impl ResidentialRow {
    /// Read the columns of `raw`, rejecting rows without street or city.
    ///
    /// Missing trailing columns are treated as empty.
    fn parse(raw: &RawRow) -> Result<Self, Box<InvalidRow>> {
        let column = move |index: usize| raw.field(index).map(str::trim).unwrap_or_default();

        let raw_address = column(ADDRESS_COLUMN);
        let address = parse_address(raw_address);
        let changed_on_raw = column(CHANGED_ON_COLUMN);
        let declaration = Declaration {
            number: column(DECLARATION_COLUMN).to_owned(),
            changed_on: parse_date(changed_on_raw),
            changed_on_raw: changed_on_raw.to_owned(),
            residents: column(RESIDENTS_COLUMN).parse().ok(),
            rate: column(RATE_COLUMN).to_owned(),
        };

        if let Some(reason) = RejectionReason::for_fields(raw_address, &address) {
            return Err(Box::new(InvalidRow {
                source_kind: SourceKind::Residential,
                line: raw.line,
                raw_text: raw.raw_text(),
                reason,
                notes: residential_notes(&declaration),
                partial: address,
                owner_label: None,
                declared_containers: Vec::new(),
                waste_types: BTreeSet::from([WasteTag::Mixed]),
            }));
        }

        Ok(Self {
            address,
            declaration,
        })
    }
}

/// Parse a change-of-status date; a trailing time part is ignored.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Notes text: marker line followed by the non-empty declaration fields.
#[must_use]
pub fn residential_notes(declaration: &Declaration) -> String {
    let changed_on = declaration
        .changed_on
        .map_or_else(|| declaration.changed_on_raw.clone(), |date| date.to_string());
    let residents = declaration
        .residents
        .map(|count| count.to_string())
        .unwrap_or_default();

    let lines = [
        ("Declaration", declaration.number.as_str()),
        ("Status changed", changed_on.as_str()),
        ("Residents", residents.as_str()),
        ("Rate", declaration.rate.as_str()),
    ];
    let mut notes = RESIDENTIAL_MARKER.to_owned();
    for (label, value) in lines.into_iter().filter(|(_, value)| !value.is_empty()) {
        notes.push('\n');
        notes.push_str(label);
        notes.push_str(": ");
        notes.push_str(value);
    }
    notes
}

/// Entry under construction for one dwelling.
#[derive(Debug)]
struct EntryBuilder {
    address: ParsedAddressFields,
    declaration: Declaration,
    occurrences: u32,
}

impl EntryBuilder {
    fn seed(row: ResidentialRow) -> Self {
        Self {
            address: row.address,
            declaration: row.declaration,
            occurrences: 1,
        }
    }

    /// Count the row and keep its declaration when its date is at least as
    /// recent. Unparseable dates sort before every real date.
    fn merge(&mut self, row: ResidentialRow) {
        self.occurrences += 1;
        if row.declaration.changed_on >= self.declaration.changed_on {
            self.declaration = row.declaration;
        }
    }

    fn build(self) -> CanonicalEntry {
        CanonicalEntry {
            notes: residential_notes(&self.declaration),
            street: self.address.street,
            number: self.address.number,
            city: self.address.city,
            postal_code: self.address.postal_code,
            waste_types: BTreeSet::from([WasteTag::Mixed]),
            declared_containers: Vec::new(),
            source_kind: SourceKind::Residential,
            occurrence_count: self.occurrences,
            owner_label: None,
            owner_labels: Vec::new(),
            declaration: Some(self.declaration),
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

        let row = match ResidentialRow::parse(raw) {
            Ok(row) => row,
            Err(rejected) => {
                warn!(line = raw.line, reason = %rejected.reason, "rejected residential row");
                self.invalid_rows.push(*rejected);
                return self;
            }
        };

        let key = residential_key(&location_key(
            &row.address.street,
            &row.address.number,
            &row.address.city,
            row.address.postal_code.as_deref(),
        ));

        if let Some(builder) = self.index.get(&key).and_then(|pos| self.builders.get_mut(*pos)) {
            debug!(line = raw.line, key = %key, "merging residential row");
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

/// Reducer for the residential registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResidentialReducer;

impl RegistryReducer for ResidentialReducer {
    fn kind(&self) -> SourceKind {
        SourceKind::Residential
    }

    fn reduce(&self, rows: &[RawRow]) -> Reduction {
        rows.iter()
            .fold(Accumulator::default(), Accumulator::absorb)
            .finish()
    }
}

/// Build the plugin bundle for the residential registry.
#[must_use]
pub fn plugin() -> SourcePlugin {
    SourcePlugin {
        name: String::from("residential"),
        reducer: Arc::new(ResidentialReducer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: u64, address: &str, declaration: &str, changed_on: &str, residents: &str) -> RawRow {
        RawRow::new(line, ["1", address, declaration, changed_on, residents, "28,00"])
    }

    #[test]
    fn same_dwelling_keeps_most_recent_declaration() {
        let reduction = ResidentialReducer.reduce(&[
            row(2, "63-300 Pleszew, Polna 3", "D/1", "2023-05-01", "4"),
            row(3, "63-300 Pleszew, polna 3", "D/2", "01.02.2024", "3"),
            row(4, "63-300 Pleszew, Polna 3", "D/3", "2022-01-01", "5"),
        ]);

        let [entry] = reduction.entries.as_slice() else {
            panic!("expected one entry, got {:?}", reduction.entries);
        };
        assert_eq!(entry.occurrence_count, 3);
        let declaration = entry.declaration.as_ref().unwrap();
        assert_eq!(declaration.number, "D/2");
        assert_eq!(declaration.residents, Some(3));
        assert_eq!(entry.waste_types, BTreeSet::from([WasteTag::Mixed]));
        assert_eq!(entry.owner_label, None);
        assert_eq!(
            entry.notes,
            "Residential\nDeclaration: D/2\nStatus changed: 2024-02-01\nResidents: 3\nRate: 28,00"
        );
    }

    #[test]
    fn ties_go_to_the_later_row() {
        let reduction = ResidentialReducer.reduce(&[
            row(2, "63-300 Pleszew, Polna 3", "D/1", "", "4"),
            row(3, "63-300 Pleszew, Polna 3", "D/2", "brak", "2"),
        ]);
        let [entry] = reduction.entries.as_slice() else {
            panic!("expected one entry");
        };
        assert_eq!(entry.declaration.as_ref().unwrap().number, "D/2");
        assert!(entry.notes.contains("Status changed: brak"));
    }

    #[test]
    fn dated_row_beats_undated_later_row() {
        let reduction = ResidentialReducer.reduce(&[
            row(2, "63-300 Pleszew, Polna 3", "D/1", "2023-05-01 00:00:00", "4"),
            row(3, "63-300 Pleszew, Polna 3", "D/2", "", "2"),
        ]);
        let [entry] = reduction.entries.as_slice() else {
            panic!("expected one entry");
        };
        assert_eq!(entry.occurrence_count, 2);
        assert_eq!(entry.declaration.as_ref().unwrap().number, "D/1");
    }

    #[test]
    fn different_dwellings_stay_separate() {
        let reduction = ResidentialReducer.reduce(&[
            row(2, "63-300 Pleszew, Polna 3", "D/1", "2023-05-01", "4"),
            row(3, "63-300 Pleszew, Polna 5", "D/2", "2023-05-01", "4"),
        ]);
        assert_eq!(reduction.entries.len(), 2);
    }

    #[test]
    fn incomplete_address_is_rejected() {
        let reduction = ResidentialReducer.reduce(&[
            row(2, "", "D/1", "2023-05-01", "4"),
            RawRow::new(3, ["2"]),
        ]);
        assert!(reduction.entries.is_empty());
        assert_eq!(reduction.rows_seen, 2);
        assert_eq!(reduction.invalid_rows.len(), 2);
        let first = &reduction.invalid_rows[0];
        assert_eq!(first.reason, RejectionReason::MissingAddress);
        assert!(first.notes.contains("Declaration: D/1"));
        assert_eq!(first.waste_types, BTreeSet::from([WasteTag::Mixed]));
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 1);
        assert_eq!(parse_date("2024-02-01"), expected);
        assert_eq!(parse_date("01.02.2024"), expected);
        assert_eq!(parse_date("01-02-2024"), expected);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("wkrótce"), None);
    }
}
