//! Byte decoding and delimited-row tokenizing for registry files.

use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, warn};

use crate::model::RawRow;

/// Legacy code page used when a file is not valid UTF-8.
pub const DEFAULT_FALLBACK_ENCODING: &str = "windows-1250";

const REPLACEMENT: char = '\u{FFFD}';

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors raised while turning file bytes into text.
pub enum DecodeError {
    /// Neither UTF-8 nor the fallback produced clean text.
    #[error("File is unreadable as UTF-8 or {fallback}")]
    Unreadable {
        /// Name of the fallback encoding that was tried.
        fallback: &'static str,
    },
    /// The configured fallback label is not a known encoding.
    #[error("Unknown encoding label: {0}")]
    UnknownEncoding(String),
}

/// Resolve an encoding label such as `windows-1250` or `iso-8859-2`.
///
/// # Errors
///
/// Returns [`DecodeError::UnknownEncoding`] for labels `encoding_rs` does not know.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding, DecodeError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| DecodeError::UnknownEncoding(label.to_owned()))
}

/// Decode file bytes, trying UTF-8 first and `fallback` when UTF-8 yields
/// replacement glyphs.
///
/// ASCII-only input decodes identically either way.
///
/// # Errors
///
/// Returns [`DecodeError::Unreadable`] when the fallback output still holds
/// replacement glyphs.
pub fn decode(bytes: &[u8], fallback: &'static Encoding) -> Result<String, DecodeError> {
    let (primary, used, _) = UTF_8.decode(bytes);
    if !primary.contains(REPLACEMENT) {
        debug!(encoding = used.name(), bytes = bytes.len(), "decoded registry file");
        return Ok(primary.into_owned());
    }

    warn!(
        fallback = fallback.name(),
        "file is not valid UTF-8, decoding with fallback encoding"
    );
    let (legacy, _, _) = fallback.decode(bytes);
    if legacy.contains(REPLACEMENT) {
        return Err(DecodeError::Unreadable {
            fallback: fallback.name(),
        });
    }
    Ok(legacy.into_owned())
}

/// Split decoded text into rows of fields, one row per line.
///
/// Quoted fields may contain the delimiter, and `""` inside quotes is a
/// literal quote. A quote never spans a line break: an unterminated quote
/// runs to the end of its line. Blank lines are dropped and short rows are
/// kept as-is.
#[must_use]
pub fn tokenize(text: &str, delimiter: u8) -> Vec<RawRow> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .quote(b'"')
        .double_quote(true);

    let mut rows = Vec::new();
    for (number, line) in (1_u64..).zip(text.lines()) {
        if line.trim().is_empty() {
            continue;
        }
        let mut reader = builder.from_reader(line.as_bytes());
        let record = match reader.records().next() {
            Some(Ok(record)) => record,
            Some(Err(err)) => {
                warn!(line = number, error = %err, "skipping unreadable line");
                continue;
            }
            None => continue,
        };
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(RawRow::new(number, record.iter()));
    }
    rows
}

#[cfg(test)]
mod tests {
    use encoding_rs::WINDOWS_1250;

    use super::*;

    #[test]
    fn utf8_input_is_kept() {
        let text = decode("Kościelna 5".as_bytes(), WINDOWS_1250).unwrap();
        assert_eq!(text, "Kościelna 5");
    }

    #[test]
    fn legacy_bytes_fall_back_to_code_page() {
        // "Kościelna Łąka" in windows-1250
        let bytes = b"Ko\x9Ccielna \xA3\xB9ka";
        let text = decode(bytes, WINDOWS_1250).unwrap();
        assert_eq!(text, "Kościelna Łąka");
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!(encoding_for_label("windows-1250").is_ok());
        assert_eq!(
            encoding_for_label("klingon"),
            Err(DecodeError::UnknownEncoding("klingon".to_owned()))
        );
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_escaped_quotes() {
        let rows = tokenize("1;\"Firma \"\"Eko\"\"; oddział\";x\n", b';');
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields, vec!["1", "Firma \"Eko\"; oddział", "x"]);
    }

    #[test]
    fn blank_lines_are_dropped_and_short_rows_kept() {
        let rows = tokenize("a;b;c\r\n\r\n  \r\nd\r\ne;f\r\n", b';');
        let fields: Vec<_> = rows.iter().map(|row| row.fields.clone()).collect();
        assert_eq!(
            fields,
            vec![
                vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
                vec!["d".to_owned()],
                vec!["e".to_owned(), "f".to_owned()],
            ]
        );
        assert_eq!(rows[0].line, 1);
    }

    #[test]
    fn unterminated_quote_stops_at_line_end() {
        let text = "1;\"Firma Eko;63-300 Pleszew, Polna 1;Papier\n\
                    2;Anna Nowak;63-300 Pleszew, Rynek 1;Papier\n\
                    3;Jan Kowalski;63-300 Pleszew, Polna 2;Papier\n";
        let rows = tokenize(text, b';');
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0].fields,
            vec!["1", "Firma Eko;63-300 Pleszew, Polna 1;Papier"]
        );
        assert_eq!(rows[1].field(1), Some("Anna Nowak"));
        assert_eq!(rows[2].line, 3);
    }

    #[test]
    fn line_numbers_count_blank_lines() {
        let rows = tokenize("a;b\n\nc;d\n", b';');
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn empty_text_has_no_rows() {
        assert!(tokenize("", b';').is_empty());
    }
}
