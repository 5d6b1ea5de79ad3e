//! Domain data structures for registry rows, canonical entries, and store records.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which registry a row or entry was sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    /// Business subscriptions keyed by owner.
    Commercial,
    /// Household declarations keyed by dwelling.
    Residential,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceKind::Commercial => "Commercial",
            SourceKind::Residential => "Residential",
        };
        write!(formatter, "{label}")
    }
}

/// Canonical waste fractions a stop can be served for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteTag {
    /// Paper and cardboard.
    Paper,
    /// Plastics and metals.
    Plastic,
    /// Clear glass.
    GlassClear,
    /// Coloured glass.
    GlassColored,
    /// Organic waste.
    Bio,
    /// Ash.
    Ash,
    /// Mixed/residual waste.
    Mixed,
}

impl fmt::Display for WasteTag {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            WasteTag::Paper => "paper",
            WasteTag::Plastic => "plastic",
            WasteTag::GlassClear => "glass_clear",
            WasteTag::GlassColored => "glass_colored",
            WasteTag::Bio => "bio",
            WasteTag::Ash => "ash",
            WasteTag::Mixed => "mixed",
        };
        write!(formatter, "{slug}")
    }
}

/// One tokenized line of a registry file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow {
    /// 1-based line number in the decoded file.
    pub line: u64,
    /// Fields in column order.
    pub fields: Vec<String>,
}

impl RawRow {
    /// Build a row from a line number and its fields.
    #[must_use]
    pub fn new<I, S>(line: u64, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            line,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Field at `index`, or `None` when the row is shorter.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// The row re-joined with `;`, as shown to an operator.
    #[must_use]
    pub fn raw_text(&self) -> String {
        self.fields.join(";")
    }
}

/// Result of splitting one free-text address column.
///
/// Empty `street` or `city` marks the row as invalid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedAddressFields {
    /// Street name without the house number.
    pub street: String,
    /// House number including additions.
    pub number: String,
    /// City or locality.
    pub city: String,
    /// Postal code in `DD-DDD` form.
    pub postal_code: Option<String>,
}

impl ParsedAddressFields {
    /// Whether both street and city were found.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.street.is_empty() && !self.city.is_empty()
    }
}

/// A container declared for a commercial subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredContainer {
    /// Container description as written in the registry.
    pub name: String,
    /// Declared number of containers.
    pub count: f64,
    /// Collection frequency, when given.
    pub frequency: Option<String>,
}

impl fmt::Display for DeclaredContainer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} x{}", self.name, format_count(self.count))?;
        if let Some(frequency) = &self.frequency {
            write!(formatter, " ({frequency})")?;
        }
        Ok(())
    }
}

/// Render a count without a trailing `.0` for whole numbers.
#[must_use]
pub fn format_count(count: f64) -> String {
    if count.fract() == 0.0 && count.abs() < 1e15 {
        format!("{count:.0}")
    } else {
        format!("{count}")
    }
}

/// Latest snapshot of a residential waste declaration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Declaration {
    /// Declaration number.
    pub number: String,
    /// Change-of-status date, when parseable.
    pub changed_on: Option<NaiveDate>,
    /// Change-of-status date as written.
    pub changed_on_raw: String,
    /// Declared number of residents.
    pub residents: Option<u32>,
    /// Billing rate as written.
    pub rate: String,
}

/// One merged, persistence-ready address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntry {
    /// Street name.
    pub street: String,
    /// House number.
    pub number: String,
    /// City or locality.
    pub city: String,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Synthesized notes text.
    pub notes: String,
    /// Waste fractions served; never empty.
    pub waste_types: BTreeSet<WasteTag>,
    /// Containers merged by name and frequency.
    pub declared_containers: Vec<DeclaredContainer>,
    /// Registry the entry came from.
    pub source_kind: SourceKind,
    /// Number of raw rows folded into this entry.
    pub occurrence_count: u32,
    /// Owner spelling that seeded the entry (commercial only).
    pub owner_label: Option<String>,
    /// Every distinct owner spelling seen under the entry key.
    pub owner_labels: Vec<String>,
    /// Winning declaration snapshot (residential only).
    pub declaration: Option<Declaration>,
}

impl CanonicalEntry {
    /// Short human-readable address, e.g. `Kościelna 5, 63-300 Pleszew`.
    #[must_use]
    pub fn display_label(&self) -> String {
        display_label(
            &self.street,
            &self.number,
            &self.city,
            self.postal_code.as_deref(),
        )
    }

    /// Convert into the store's create payload.
    #[must_use]
    pub fn to_new_address(&self) -> NewAddress {
        NewAddress {
            street: self.street.clone(),
            number: self.number.clone(),
            city: self.city.clone(),
            postal_code: self.postal_code.clone(),
            notes: self.notes.clone(),
            waste_types: self.waste_types.clone(),
            declared_containers: self.declared_containers.clone(),
            source_kind: Some(self.source_kind),
            owner_labels: self.owner_labels.clone(),
        }
    }
}

/// Format an address the way it appears in reports.
#[must_use]
pub fn display_label(street: &str, number: &str, city: &str, postal_code: Option<&str>) -> String {
    let street_part = [street, number]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let city_part = [postal_code.unwrap_or(""), city]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    match (street_part.is_empty(), city_part.is_empty()) {
        (false, false) => format!("{street_part}, {city_part}"),
        (false, true) => street_part,
        (true, _) => city_part,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier assigned by the address store.
pub struct AddressId(pub String);

impl fmt::Display for AddressId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Fields sent to the store when creating an address.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewAddress {
    /// Street name.
    pub street: String,
    /// House number.
    pub number: String,
    /// City or locality.
    pub city: String,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Free-text notes.
    pub notes: String,
    /// Waste fractions served at this stop.
    pub waste_types: BTreeSet<WasteTag>,
    /// Declared containers.
    #[serde(default)]
    pub declared_containers: Vec<DeclaredContainer>,
    /// Registry the address came from, when known.
    #[serde(default)]
    pub source_kind: Option<SourceKind>,
    /// Owner labels for commercial addresses.
    #[serde(default)]
    pub owner_labels: Vec<String>,
}

/// Address record owned by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedAddress {
    /// Store identifier.
    pub id: AddressId,
    /// Street name.
    pub street: String,
    /// House number.
    pub number: String,
    /// City or locality.
    pub city: String,
    /// Postal code.
    #[serde(default)]
    pub postal_code: Option<String>,
    /// Free-text notes, possibly carrying an `Owner:` marker line.
    #[serde(default)]
    pub notes: String,
    /// Waste fractions served at this stop.
    #[serde(default)]
    pub waste_types: BTreeSet<WasteTag>,
    /// Declared containers.
    #[serde(default)]
    pub declared_containers: Vec<DeclaredContainer>,
    /// Registry the address came from; `None` for records predating the field.
    #[serde(default)]
    pub source_kind: Option<SourceKind>,
    /// Owner labels for commercial addresses.
    #[serde(default)]
    pub owner_labels: Vec<String>,
}

impl PersistedAddress {
    /// Attach a store identifier to create-payload fields.
    #[must_use]
    pub fn from_new(id: AddressId, fields: NewAddress) -> Self {
        Self {
            id,
            street: fields.street,
            number: fields.number,
            city: fields.city,
            postal_code: fields.postal_code,
            notes: fields.notes,
            waste_types: fields.waste_types,
            declared_containers: fields.declared_containers,
            source_kind: fields.source_kind,
            owner_labels: fields.owner_labels,
        }
    }
}

/// Why a row could not become a canonical entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Address column empty or absent.
    MissingAddress,
    /// Street could not be determined.
    MissingStreet,
    /// City could not be determined.
    MissingCity,
}

impl RejectionReason {
    /// Classify parsed fields, returning `None` when they are complete.
    #[must_use]
    pub fn for_fields(raw_address: &str, fields: &ParsedAddressFields) -> Option<Self> {
        if raw_address.trim().is_empty() {
            Some(Self::MissingAddress)
        } else if fields.street.is_empty() {
            Some(Self::MissingStreet)
        } else if fields.city.is_empty() {
            Some(Self::MissingCity)
        } else {
            None
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RejectionReason::MissingAddress => "missing address",
            RejectionReason::MissingStreet => "missing street",
            RejectionReason::MissingCity => "missing city",
        };
        write!(formatter, "{reason}")
    }
}

/// A registry row rejected by a reducer, with whatever could be salvaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidRow {
    /// Registry the row came from.
    pub source_kind: SourceKind,
    /// 1-based line number in the source file.
    pub line: u64,
    /// Original row text.
    pub raw_text: String,
    /// Why the row was rejected.
    pub reason: RejectionReason,
    /// Address fields that were determined.
    pub partial: ParsedAddressFields,
    /// Owner label (commercial only).
    pub owner_label: Option<String>,
    /// Containers declared on the row.
    pub declared_containers: Vec<DeclaredContainer>,
    /// Waste fractions classified from the row.
    pub waste_types: BTreeSet<WasteTag>,
    /// Notes the entry would have carried.
    pub notes: String,
}

/// Advisory report for one location shared by several billable units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Shared location key.
    pub location_key: String,
    /// Human-readable address.
    pub display_label: String,
    /// Sum of raw-row occurrences under the location.
    pub total_occurrences: u32,
    /// Registries contributing entries.
    pub source_kinds: BTreeSet<SourceKind>,
    /// One line per contributing entry.
    pub details: Vec<DuplicateDetail>,
}

/// One contributing entry in a [`DuplicateReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateDetail {
    /// Registry of the entry.
    pub source_kind: SourceKind,
    /// Owner spellings (commercial only).
    pub owners: Vec<String>,
    /// Raw rows folded into the entry.
    pub occurrences: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Position of a row in the correction queue.
pub struct InvalidRowId(pub u32);

impl fmt::Display for InvalidRowId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// An invalid row waiting for manual correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRow {
    /// Queue identifier.
    pub id: InvalidRowId,
    /// The rejected row.
    pub row: InvalidRow,
}

/// Outcome of one import run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Data rows read from both files.
    pub total_rows_seen: usize,
    /// Canonical entries after reduction.
    pub unique_entries: usize,
    /// Addresses created in the store.
    pub created: usize,
    /// Entries already present in the store.
    pub skipped_existing: usize,
    /// Capped preview of duplicate reports.
    pub duplicates: Vec<DuplicateReport>,
    /// Total number of duplicate reports before capping.
    pub duplicates_total: usize,
    /// Every rejected row, queued for correction.
    pub invalid_rows: Vec<QueuedRow>,
}
