//! Brazilian document validators.
//!
//! Every document type exposes the same three pure functions:
//! `canonicalize` (normalised form used for storage and comparison),
//! `validate` and `format` (display only, lenient: returns the input
//! unchanged when it cannot be formatted).

pub mod age;
pub mod cep;
pub mod cpf;
pub mod email;
pub mod phone;
pub mod rg;

/// Keep only ASCII digits.
pub(crate) fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Keep only ASCII letters and digits.
pub(crate) fn alphanumeric_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
