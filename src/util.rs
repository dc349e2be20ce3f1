//! Pure numeric helpers used by the classifier to range-check lat/long
//! and stay-time sub-fields, grounded in the reference `Utilities.Utils`
//! (the degree/degree-minute range checks only — the original's
//! geodesic and performance helpers belong to other ICAO fields and have
//! no caller here, see SPEC_FULL.md §1).

/// Whether a plain-degrees value (as a numeric string, e.g. `"91"`) is
/// within `[0, max]`.
pub fn is_degree_semantics(value: &str, max: u32) -> bool {
    match value.parse::<u32>() {
        Ok(v) => v <= max,
        Err(_) => false,
    }
}

/// Whether a degrees+minutes value (e.g. `"8960"` for 89°60', encoded as
/// `width` digits of degrees followed by exactly two digits of minutes)
/// represents minutes `< 60` and a total `<= max` where `max` is already
/// expressed in the same degrees*100+minutes encoding (e.g. 9000 for 90
/// degrees latitude, 18000 for 180 degrees longitude).
pub fn is_degree_minute_semantics(value: &str, max: u32, width: usize) -> bool {
    if value.len() != width + 2 {
        return false;
    }
    let minutes: u32 = match value[value.len() - 2..].parse() {
        Ok(m) => m,
        Err(_) => return false,
    };
    let whole: u32 = match value.parse() {
        Ok(w) => w,
        Err(_) => return false,
    };
    minutes < 60 && whole <= max
}

/// Parse a `STAY_TIME` token text (`HHMM`) into `(hours, minutes)` if it
/// represents a valid time of day (`HH < 24`, `MM < 60`).
pub fn parse_stay_time(text: &str) -> Option<(u32, u32)> {
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hh: u32 = text[0..2].parse().ok()?;
    let mm: u32 = text[2..4].parse().ok()?;
    if hh < 24 && mm < 60 {
        Some((hh, mm))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_semantics_boundaries() {
        assert!(is_degree_semantics("0", 90));
        assert!(is_degree_semantics("89", 90));
        assert!(is_degree_semantics("90", 90));
        assert!(!is_degree_semantics("91", 90));
    }

    #[test]
    fn degree_minute_semantics_two_digit_latitude() {
        assert!(is_degree_minute_semantics("0000", 9000, 2));
        assert!(is_degree_minute_semantics("8900", 9000, 2));
        assert!(is_degree_minute_semantics("9000", 9000, 2));
        assert!(!is_degree_minute_semantics("9100", 9000, 2));
        assert!(is_degree_minute_semantics("8959", 9000, 2));
        assert!(!is_degree_minute_semantics("9001", 9000, 2));
    }

    #[test]
    fn degree_minute_semantics_three_digit_longitude() {
        assert!(is_degree_minute_semantics("00000", 18000, 3));
        assert!(is_degree_minute_semantics("17900", 18000, 3));
        assert!(is_degree_minute_semantics("18000", 18000, 3));
        assert!(!is_degree_minute_semantics("18100", 18000, 3));
        assert!(is_degree_minute_semantics("17959", 18000, 3));
        assert!(!is_degree_minute_semantics("18001", 18000, 3));
    }

    #[test]
    fn stay_time_requires_valid_clock_values() {
        assert_eq!(parse_stay_time("2359"), Some((23, 59)));
        assert_eq!(parse_stay_time("0000"), Some((0, 0)));
        assert_eq!(parse_stay_time("2400"), None);
        assert_eq!(parse_stay_time("0060"), None);
        assert_eq!(parse_stay_time("abc"), None);
    }
}
