//! RG (state identity card). Formats vary per issuing state, so validation is
//! only a length check and formatting is a display heuristic.

use super::alphanumeric_only;

/// Letters are kept: some states issue RGs with a trailing letter.
pub fn canonicalize(raw: &str) -> String {
    alphanumeric_only(raw)
}

pub fn validate(raw: &str) -> bool {
    (5..=14).contains(&canonicalize(raw).len())
}

/// `XX.XXX.XXX-X…` for canonical forms of 8+ characters, otherwise the input
/// unchanged.
pub fn format(raw: &str) -> String {
    let c = canonicalize(raw);
    if c.len() < 8 {
        return raw.to_string();
    }
    format!("{}.{}.{}-{}", &c[0..2], &c[2..5], &c[5..8], &c[8..])
}
