//! CEP (postal code): 8 digits.

use super::digits_only;

pub fn canonicalize(raw: &str) -> String {
    digits_only(raw)
}

pub fn validate(raw: &str) -> bool {
    canonicalize(raw).len() == 8
}

/// `XXXXX-XXX`, or the input unchanged.
pub fn format(raw: &str) -> String {
    let c = canonicalize(raw);
    if c.len() != 8 {
        return raw.to_string();
    }
    format!("{}-{}", &c[0..5], &c[5..8])
}
