//! Mapping of free-text container descriptions to waste tags.

use std::collections::BTreeSet;

use crate::model::WasteTag;

const GLASS_MARKERS: [&str; 4] = ["szkło", "szklo", "szkła", "szkla"];
const CLEAR_MARKERS: [&str; 2] = ["bezbarw", "clear"];

/// Classify a container description by case-insensitive substring rules.
///
/// Several tags may match one description. No match gives an empty set;
/// see [`with_mixed_fallback`].
#[must_use]
pub fn classify(description: &str) -> BTreeSet<WasteTag> {
    let normalized = description.to_lowercase();
    let mut tags = BTreeSet::new();

    if normalized.contains("papier") {
        tags.insert(WasteTag::Paper);
    }
    if normalized.contains("plastik") || normalized.contains("metal") {
        tags.insert(WasteTag::Plastic);
    }
    if GLASS_MARKERS.iter().any(|marker| normalized.contains(marker)) {
        if CLEAR_MARKERS.iter().any(|marker| normalized.contains(marker)) {
            tags.insert(WasteTag::GlassClear);
        } else {
            tags.insert(WasteTag::GlassColored);
        }
    }
    if normalized.contains("bio") {
        tags.insert(WasteTag::Bio);
    }
    if normalized.contains("popiół") || normalized.contains("popiol") {
        tags.insert(WasteTag::Ash);
    }
    if normalized.contains("zmiesz") {
        tags.insert(WasteTag::Mixed);
    }

    tags
}

/// Return `tags`, or `{mixed}` when it is empty.
#[must_use]
pub fn with_mixed_fallback(tags: BTreeSet<WasteTag>) -> BTreeSet<WasteTag> {
    if tags.is_empty() {
        BTreeSet::from([WasteTag::Mixed])
    } else {
        tags
    }
}
