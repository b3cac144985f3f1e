//! Alias and value canonicalization.
//!
//! `normalize` is the single place where surface spellings become schema
//! names. It never fails: unknown aliases and unknown values pass through
//! verbatim so callers can still see (and log) what came in.

use crate::fields::CanonicalField;

/// Map `(alias, raw value)` to `(canonical field, canonical value)`.
///
/// Idempotent: feeding the output back in returns the same pair.
pub fn normalize(alias_field: &str, raw_value: &str) -> (String, String) {
    match CanonicalField::from_alias(alias_field) {
        Some(field) => (field.as_str().to_string(), normalize_value(field, raw_value)),
        None => (alias_field.to_string(), raw_value.to_string()),
    }
}

/// Canonicalize a value for an already-resolved field.
pub fn normalize_value(field: CanonicalField, raw_value: &str) -> String {
    let Some(domain) = field.value_domain() else {
        return raw_value.to_string();
    };
    let key = raw_value.trim().to_lowercase();
    domain
        .get(key.as_str())
        .map(|canonical| (*canonical).to_string())
        .unwrap_or_else(|| raw_value.to_string())
}

/// Resolve an alias to a canonical field, returning the normalized value with it.
/// `None` when the alias is not in the table.
pub fn resolve(alias_field: &str, raw_value: &str) -> Option<(CanonicalField, String)> {
    let field = CanonicalField::from_alias(alias_field)?;
    Some((field, normalize_value(field, raw_value)))
}
