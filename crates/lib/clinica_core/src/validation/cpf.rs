//! CPF (Cadastro de Pessoas Físicas): 11 digits, the last two are mod-11
//! check digits over the preceding ones.

use super::digits_only;

const CPF_LEN: usize = 11;

/// Digits-only form.
pub fn canonicalize(raw: &str) -> String {
    digits_only(raw)
}

/// Compute the check digit for `digits`, weighting position `i` by
/// `digits.len() + 1 - i`.
///
/// Used with the first 9 digits for the first check digit and with the first
/// 10 for the second.
pub fn check_digit(digits: &[u8]) -> u8 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * (top - i as u32))
        .sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => (11 - r) as u8,
    }
}

/// Full CPF validation: length, repeated-digit blacklist and both check digits.
pub fn validate(raw: &str) -> bool {
    let canonical = canonicalize(raw);
    if canonical.len() != CPF_LEN {
        return false;
    }

    let digits: Vec<u8> = canonical.bytes().map(|b| b - b'0').collect();
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// `XXX.XXX.XXX-XX` when the canonical form has 11 digits, otherwise the input
/// unchanged.
pub fn format(raw: &str) -> String {
    let c = canonicalize(raw);
    if c.len() != CPF_LEN {
        return raw.to_string();
    }
    format!("{}.{}.{}-{}", &c[0..3], &c[3..6], &c[6..9], &c[9..11])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_valid_cpf() {
        assert!(validate("529.982.247-25"));
        assert!(validate("52998224725"));
    }

    #[test]
    fn repeated_digits_are_rejected() {
        assert!(!validate("111.111.111-11"));
        assert!(!validate("00000000000"));
    }

    #[test]
    fn bad_checksum_is_rejected() {
        assert!(!validate("123.456.789-00"));
        assert!(!validate("529.982.247-24"));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(!validate("5299822472"));
        assert!(!validate("529982247250"));
        assert!(!validate(""));
    }

    #[test]
    fn check_digits_match_positions_nine_and_ten() {
        let digits = [5, 2, 9, 9, 8, 2, 2, 4, 7, 2];
        assert_eq!(check_digit(&digits[..9]), 2);
        assert_eq!(check_digit(&digits), 5);
    }

    #[test]
    fn validity_tracks_computed_check_digits() {
        // Every base of 9 non-identical digits completed with its own check
        // digits validates; bumping either check digit breaks it.
        for base in ["123456789", "987654321", "000000001", "314159265"] {
            let mut digits: Vec<u8> = base.bytes().map(|b| b - b'0').collect();
            digits.push(check_digit(&digits));
            digits.push(check_digit(&digits));
            let cpf: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
            assert!(validate(&cpf), "{cpf} should be valid");

            let mut broken = digits.clone();
            broken[10] = (broken[10] + 1) % 10;
            let cpf: String = broken.iter().map(|d| char::from(b'0' + d)).collect();
            assert!(!validate(&cpf), "{cpf} should be invalid");
        }
    }

    #[test]
    fn format_and_canonicalize_round_trip() {
        assert_eq!(format("52998224725"), "529.982.247-25");
        assert_eq!(format(&canonicalize("529.982.247-25")), "529.982.247-25");
        for input in ["529.982.247-25", "12345", "abc", ""] {
            assert_eq!(canonicalize(&format(input)), canonicalize(input));
        }
    }

    #[test]
    fn format_passes_short_input_through() {
        assert_eq!(format("123.45"), "123.45");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = canonicalize(" 529.982.247-25 ");
        assert_eq!(canonicalize(&once), once);
    }
}
