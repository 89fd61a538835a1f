//! Email address syntax check.
//!
//! Equivalent to matching
//! `^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$` plus a few structural
//! rules (dots and hyphens at the edges, consecutive dots).

/// Trimmed and lowercased.
pub fn canonicalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn validate(raw: &str) -> bool {
    let email = raw.trim();
    if email.is_empty() || !(6..=254).contains(&email.len()) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if domain.contains('@') {
        return false;
    }

    if local.is_empty() || !local.chars().all(is_local_char) {
        return false;
    }
    if !domain_matches(domain) {
        return false;
    }

    if local.starts_with('.') || local.ends_with('.') {
        return false;
    }
    if local.contains("..") || domain.contains("..") {
        return false;
    }
    !(domain.starts_with('-') || domain.ends_with('-'))
}

fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-')
}

/// `[A-Za-z0-9.-]+ "." [A-Za-z]{2,}`: the TLD is whatever follows the last dot.
fn domain_matches(domain: &str) -> bool {
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}
