//! Splitting of free-text registry addresses into street, number, city and postal code.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::ParsedAddressFields;

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2}-\d{3}\b").expect("postal code pattern is valid"));

/// Parse an address column of the form
/// `[postal city], [locality,] street number`.
///
/// - three or more segments: postal+city, locality override, then street and
///   number (later segments are re-joined with `, `)
/// - two segments: postal+city, then street and number
/// - one segment: street and number only, city left empty
///
/// Undeterminable parts are empty strings.
#[must_use]
pub fn parse_address(raw: &str) -> ParsedAddressFields {
    let segments: Vec<&str> = raw.split(',').map(str::trim).collect();

    let (head, locality, street_text) = match segments.as_slice() {
        [] | [""] => return ParsedAddressFields::default(),
        [only] => (None, None, (*only).to_owned()),
        [head, street] => (Some(*head), None, (*street).to_owned()),
        [head, locality, rest @ ..] => (Some(*head), Some(*locality), rest.join(", ")),
    };

    let (postal_code, head_city) = head.map_or((None, String::new()), split_postal_city);
    let city = locality
        .filter(|name| !name.is_empty())
        .map_or(head_city, collapse_whitespace);
    let (street, number) = split_street_number(&street_text);

    ParsedAddressFields {
        street,
        number,
        city,
        postal_code,
    }
}

/// Pull a `DD-DDD` postal code out of a segment; the rest is the city.
fn split_postal_city(segment: &str) -> (Option<String>, String) {
    let Some(found) = POSTAL_CODE.find(segment) else {
        return (None, collapse_whitespace(segment));
    };
    let city = format!(
        "{} {}",
        segment.get(..found.start()).unwrap_or_default(),
        segment.get(found.end()..).unwrap_or_default()
    );
    (Some(found.as_str().to_owned()), collapse_whitespace(&city))
}

/// Split `street number` at the first token that starts with a digit.
///
/// Tokens before it form the street, so a leading number (`3 Maja 15`)
/// leaves the street empty.
fn split_street_number(text: &str) -> (String, String) {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let split_at = tokens
        .iter()
        .position(|token| token.chars().next().is_some_and(|ch| ch.is_ascii_digit()))
        .unwrap_or(tokens.len());
    let (street, number) = tokens.split_at(split_at);
    (street.join(" "), number.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
