//! Identifier validation applied before any collaborator call.

use uuid::Uuid;

use crate::decision::DenyReason;

/// Parse a batch of raw `(field name, value)` identifiers. Returns the
/// parsed UUIDs in input order, or a validation denial listing every
/// violated field. Malformed input never reaches the store.
pub(crate) fn validate_identifiers(
    ids: &[(&'static str, &str)],
) -> Result<Vec<Uuid>, DenyReason> {
    let mut parsed = Vec::with_capacity(ids.len());
    let mut violations = Vec::new();

    for (field, value) in ids {
        match Uuid::parse_str(value.trim()) {
            Ok(id) => parsed.push(id),
            Err(_) => violations.push((*field).to_string()),
        }
    }

    if violations.is_empty() {
        Ok(parsed)
    } else {
        Err(DenyReason::InputValidationFailed { fields: violations })
    }
}
