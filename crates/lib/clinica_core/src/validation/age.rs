//! Age in whole years.

use chrono::{Datelike, Local, NaiveDate};

/// Age of the minority threshold used by the guardian rule.
pub const ADULT_AGE: u32 = 18;

/// Completed years between `birth` and `today`. An unset birth date (or one
/// after `today`) yields 0.
pub fn age_on(birth: Option<NaiveDate>, today: NaiveDate) -> u32 {
    let Some(birth) = birth else {
        return 0;
    };
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// [`age_on`] evaluated against the local calendar date.
pub fn age(birth: Option<NaiveDate>) -> u32 {
    age_on(birth, Local::now().date_naive())
}

/// `true` when the person is younger than [`ADULT_AGE`] on `today`.
pub fn is_minor_on(birth: Option<NaiveDate>, today: NaiveDate) -> bool {
    birth.is_some() && age_on(birth, today) < ADULT_AGE
}
