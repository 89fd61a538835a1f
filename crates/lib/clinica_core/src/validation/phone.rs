//! Brazilian phone numbers.
//!
//! | digits | shape                          |
//! |--------|--------------------------------|
//! | 8      | landline, no area code         |
//! | 9      | mobile, no area code, `9…`     |
//! | 10     | landline with area code        |
//! | 11     | mobile with area code, `XX9…`  |

use super::digits_only;

pub fn canonicalize(raw: &str) -> String {
    digits_only(raw)
}

pub fn validate(raw: &str) -> bool {
    let c = canonicalize(raw);
    match c.len() {
        8 | 10 => true,
        9 => c.starts_with('9'),
        11 => c.as_bytes()[2] == b'9',
        _ => false,
    }
}

pub fn format(raw: &str) -> String {
    let c = canonicalize(raw);
    match c.len() {
        8 => format!("{}-{}", &c[0..4], &c[4..8]),
        9 => format!("{}-{}", &c[0..5], &c[5..9]),
        10 => format!("({}) {}-{}", &c[0..2], &c[2..6], &c[6..10]),
        11 => format!("({}) {}-{}", &c[0..2], &c[2..7], &c[7..11]),
        _ => raw.to_string(),
    }
}
