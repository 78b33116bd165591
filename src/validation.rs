//! Validation for peer-supplied identifiers and announce text

/// Length in bytes of a truncated destination hash.
pub const DESTINATION_HASH_LEN: usize = 16;

/// Maximum number of characters kept from an announced display name.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// Validation errors with helpful messages
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Destination hash is empty")]
    EmptyHash,

    #[error("Destination hash must be {expected} hex characters (got {found})")]
    HashLength { expected: usize, found: usize },

    #[error("Destination hash contains non-hex characters: {chars}")]
    HashCharacters { chars: String },

    #[error("Announce aspect '{0}' is not recognised")]
    UnknownAspect(String),

    #[error("Search query too long (maximum {max} characters)")]
    QueryTooLong { max: usize },
}

/// Validate and normalise a hex destination hash (case-insensitive, surrounding
/// whitespace and an optional `<`/`>` wrapper as printed by Reticulum are ignored).
pub fn validate_destination_hash(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim().trim_start_matches('<').trim_end_matches('>');
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyHash);
    }

    let invalid: String = trimmed.chars().filter(|c| !c.is_ascii_hexdigit()).collect();
    if !invalid.is_empty() {
        return Err(ValidationError::HashCharacters { chars: invalid });
    }

    let expected = DESTINATION_HASH_LEN * 2;
    if trimmed.len() != expected {
        return Err(ValidationError::HashLength {
            expected,
            found: trimmed.len(),
        });
    }

    Ok(trimmed.to_ascii_lowercase())
}

/// Turn raw announce app data into a display name.
///
/// Invalid UTF-8 is replaced, control characters are dropped, runs of whitespace
/// collapse to one space and the result is capped at [`MAX_DISPLAY_NAME_CHARS`].
/// Returns `None` when nothing printable is left.
pub fn sanitize_display_name(app_data: &[u8]) -> Option<String> {
    let raw = String::from_utf8_lossy(app_data);
    let mut out = String::with_capacity(raw.len().min(MAX_DISPLAY_NAME_CHARS * 4));
    let mut kept = 0usize;
    let mut pending_space = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            pending_space = kept > 0;
            continue;
        }
        if ch.is_control() || ch == char::REPLACEMENT_CHARACTER {
            continue;
        }
        if kept >= MAX_DISPLAY_NAME_CHARS {
            break;
        }
        if pending_space {
            if kept + 1 >= MAX_DISPLAY_NAME_CHARS {
                break;
            }
            out.push(' ');
            kept += 1;
            pending_space = false;
        }
        out.push(ch);
        kept += 1;
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Normalise a search query typed by the user.
pub fn normalize_query(query: &str, max_chars: usize) -> Result<String, ValidationError> {
    let trimmed = query.trim();
    if trimmed.chars().count() > max_chars {
        return Err(ValidationError::QueryTooLong { max: max_chars });
    }
    Ok(trimmed.to_lowercase())
}
