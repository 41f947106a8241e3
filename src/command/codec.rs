//! Path-segment value codec
//!
//! Commands carry their values as `field/value` segment pairs. Free-form
//! values (bucket names, urls, titles, colours) travel base64url-encoded so
//! they never contain `/`; small enumerations and integers travel as plain
//! tokens. Extraction takes the *last* match of a field's pattern, so a
//! repeated optional clause resolves to its final occurrence.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{self, GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use regex::Regex;
use thiserror::Error;

/// Clients are not consistent about padding, accept both forms.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode '{field}': {reason}")]
pub struct DecodeError {
    pub field: String,
    pub reason: String,
}

/// One occurrence of a repeatable clause, optionally followed by its
/// companion clause (`url/<v>/alias/<v>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeat {
    pub value: String,
    pub companion: Option<String>,
}

/// Raw value of the last `field/<value>` match, not decoded.
pub fn plain_value<'a>(command: &'a str, pattern: &Regex, field: &str) -> Option<&'a str> {
    let matched = pattern.find_iter(command).last()?;
    matched
        .as_str()
        .trim_start_matches('/')
        .strip_prefix(field)?
        .strip_prefix('/')
}

/// Last `field/<value>` match, base64url decoded into UTF-8.
pub fn decoded_value(
    command: &str,
    pattern: &Regex,
    field: &str,
) -> Result<Option<String>, DecodeError> {
    plain_value(command, pattern, field)
        .map(|raw| decode_segment(field, raw))
        .transpose()
}

/// Every occurrence of a repeatable clause, left to right, each decoded on
/// its own.
pub fn repeated_values(
    command: &str,
    pattern: &Regex,
    field: &str,
    companion: Option<&str>,
) -> Result<Vec<Repeat>, DecodeError> {
    let mut repeats = Vec::new();

    for matched in pattern.find_iter(command) {
        let mut segments = matched.as_str().trim_start_matches('/').split('/');

        let value = match (segments.next(), segments.next()) {
            (Some(name), Some(raw)) if name == field => decode_segment(field, raw)?,
            _ => {
                return Err(DecodeError {
                    field: field.to_string(),
                    reason: format!("malformed clause '{}'", matched.as_str()),
                });
            }
        };

        let companion = match (companion, segments.next(), segments.next()) {
            (Some(expected), Some(name), Some(raw)) if name == expected => {
                Some(decode_segment(expected, raw)?)
            }
            _ => None,
        };

        repeats.push(Repeat { value, companion });
    }

    Ok(repeats)
}

/// base64url with padding, the form clients are expected to send.
pub fn encode_value(text: &str) -> String {
    general_purpose::URL_SAFE.encode(text.as_bytes())
}

fn decode_segment(field: &str, raw: &str) -> Result<String, DecodeError> {
    let bytes = URL_SAFE_LENIENT.decode(raw).map_err(|err| DecodeError {
        field: field.to_string(),
        reason: err.to_string(),
    })?;

    String::from_utf8(bytes).map_err(|err| DecodeError {
        field: field.to_string(),
        reason: err.to_string(),
    })
}
