//! The element classifier: a fixed, ordered battery of regex-class
//! patterns over a Token's literal text, producing a closed
//! `(BaseKind, SubKind)` pair. Pure and idempotent — grounded in the
//! teacher's character-class validation idiom (`decode::bds::bds21`'s
//! `Regex::new(r"^[A-Z0-9]+[\s#]?[A-Z0-9]+$")`) and its lazily-compiled
//! static-data pattern (`data::patterns::PATTERNS`).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::{is_degree_minute_semantics, is_degree_semantics, parse_stay_time};

/// The closed set of Field 15 element kinds a [`Token`](crate::token::Token)
/// can classify to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseKind {
    SpeedLevel,
    SpeedVfr,
    SpeedLevelLevel,
    SpeedLevelPlus,
    Point,
    LatLong,
    LatLongBearingDistance,
    AtsRoute,
    Sid,
    Star,
    SidStar,
    Dct,
    Truncate,
    CruiseClimb,
    StayN,
    StayTime,
    BreakStart,
    BreakEnd,
    Slash,
    Unknown,
    TooLong,
}

/// A refinement of [`BaseKind`]. Only `BreakStart`/`BreakEnd` carry a
/// meaningful refinement; every other base kind reports `SubKind::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubKind {
    None,
    Vfr,
    Oat,
    IfpStop,
    Ifr,
    Gat,
    IfpStart,
}

static SPEED_LEVEL_PLUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:N|M|K)[0-9]{3,4}(?:F[0-9]{3}|A[0-9]{3}|S[0-9]{4}|M[0-9]{4})PLUS$").unwrap()
});
static SPEED_LEVEL_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:N|M|K)[0-9]{3,4}(?:F[0-9]{3}|A[0-9]{3}|S[0-9]{4}|M[0-9]{4})(?:F[0-9]{3}|A[0-9]{3}|S[0-9]{4}|M[0-9]{4})$",
    )
    .unwrap()
});
static SPEED_VFR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:N|M|K)[0-9]{3,4}VFR$").unwrap());
static SPEED_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:N|M|K)[0-9]{3,4}(?:F[0-9]{3}|A[0-9]{3}|S[0-9]{4}|M[0-9]{4})$").unwrap()
});

static LAT_LONG_BD_DEG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{2}[NS][0-9]{3}[EW][0-9]{6}$").unwrap());
static LAT_LONG_BD_DM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}[NS][0-9]{5}[EW][0-9]{6}$").unwrap());
static LAT_LONG_DEG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{2}[NS][0-9]{3}[EW]$").unwrap());
static LAT_LONG_DM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}[NS][0-9]{5}[EW]$").unwrap());

// ICAO airway designators carry a 1-2 letter prefix (conventional/upper
// airspace, e.g. `B9`, `A17`) or a 2-letter prefix for area-navigation
// routes (`UL607`, `UN869`, `UM985`) followed by 1-4 digits and an
// optional suffix letter.
static ATS_ROUTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{1,2}[0-9]{1,4}[A-Z]?$").unwrap());
static SID_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{1,5}[0-9][A-Z]$").unwrap());
static STAY_N: Lazy<Regex> = Lazy::new(|| Regex::new(r"^STAY[1-9]$").unwrap());
static POINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,5}$").unwrap());

/// Classify `text` into its `(BaseKind, SubKind)`, trying the battery in
/// priority order: more specific shapes before their more general
/// prefixes (`..._PLUS`/`..._LEVEL` before plain `SPEED_LEVEL`, bearing/
/// distance forms before plain `LAT_LONG`), keyword literals before the
/// generic `POINT` fallback, and the length check last.
pub fn classify(text: &str) -> (BaseKind, SubKind) {
    let kind = classify_base(text);
    tracing::trace!(token = text, kind = ?kind, "classified token");
    kind
}

fn classify_base(text: &str) -> (BaseKind, SubKind) {
    if text == "/" {
        return (BaseKind::Slash, SubKind::None);
    }
    if SPEED_LEVEL_PLUS.is_match(text) {
        return (BaseKind::SpeedLevelPlus, SubKind::None);
    }
    if SPEED_LEVEL_LEVEL.is_match(text) {
        return (BaseKind::SpeedLevelLevel, SubKind::None);
    }
    if SPEED_VFR.is_match(text) {
        return (BaseKind::SpeedVfr, SubKind::None);
    }
    if SPEED_LEVEL.is_match(text) {
        return (BaseKind::SpeedLevel, SubKind::None);
    }
    if LAT_LONG_BD_DEG.is_match(text) || LAT_LONG_BD_DM.is_match(text) {
        return (BaseKind::LatLongBearingDistance, SubKind::None);
    }
    if LAT_LONG_DEG.is_match(text) || LAT_LONG_DM.is_match(text) {
        return (BaseKind::LatLong, SubKind::None);
    }
    match text {
        "DCT" => return (BaseKind::Dct, SubKind::None),
        "T" => return (BaseKind::Truncate, SubKind::None),
        "C" => return (BaseKind::CruiseClimb, SubKind::None),
        "SID" => return (BaseKind::Sid, SubKind::None),
        "STAR" => return (BaseKind::Star, SubKind::None),
        "VFR" => return (BaseKind::BreakStart, SubKind::Vfr),
        "OAT" => return (BaseKind::BreakStart, SubKind::Oat),
        "IFPSTOP" => return (BaseKind::BreakStart, SubKind::IfpStop),
        "IFR" => return (BaseKind::BreakEnd, SubKind::Ifr),
        "GAT" => return (BaseKind::BreakEnd, SubKind::Gat),
        "IFPSTART" => return (BaseKind::BreakEnd, SubKind::IfpStart),
        _ => {}
    }
    if STAY_N.is_match(text) {
        return (BaseKind::StayN, SubKind::None);
    }
    if text.len() == 4 && parse_stay_time(text).is_some() {
        return (BaseKind::StayTime, SubKind::None);
    }
    if ATS_ROUTE.is_match(text) {
        return (BaseKind::AtsRoute, SubKind::None);
    }
    if SID_STAR.is_match(text) {
        return (BaseKind::SidStar, SubKind::None);
    }
    if POINT.is_match(text) {
        return (BaseKind::Point, SubKind::None);
    }
    if text.len() > 7 {
        return (BaseKind::TooLong, SubKind::None);
    }
    (BaseKind::Unknown, SubKind::None)
}

static SPEED_LEVEL_CAPTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:N|M|K)[0-9]{3,4})(F[0-9]{3}|A[0-9]{3}|S[0-9]{4}|M[0-9]{4})$").unwrap()
});
static SPEED_LEVEL_LEVEL_CAPTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((?:N|M|K)[0-9]{3,4})(F[0-9]{3}|A[0-9]{3}|S[0-9]{4}|M[0-9]{4})(F[0-9]{3}|A[0-9]{3}|S[0-9]{4}|M[0-9]{4})$",
    )
    .unwrap()
});
static SPEED_LEVEL_PLUS_CAPTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:N|M|K)[0-9]{3,4})(F[0-9]{3}|A[0-9]{3}|S[0-9]{4}|M[0-9]{4})PLUS$").unwrap()
});
static SPEED_VFR_CAPTURE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^((?:N|M|K)[0-9]{3,4})VFR$").unwrap());

/// Split a `SPEED_LEVEL` token into its `(speed, level)` parts.
pub fn split_speed_level(text: &str) -> Option<(String, String)> {
    let caps = SPEED_LEVEL_CAPTURE.captures(text)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Split a `SPEED_LEVEL_LEVEL` token into its `(speed, first level, second
/// level)` parts.
pub fn split_speed_level_level(text: &str) -> Option<(String, String, String)> {
    let caps = SPEED_LEVEL_LEVEL_CAPTURE.captures(text)?;
    Some((caps[1].to_string(), caps[2].to_string(), caps[3].to_string()))
}

/// Split a `SPEED_LEVEL_PLUS` token into its `(speed, level)` parts (the
/// trailing `PLUS` literal is discarded).
pub fn split_speed_level_plus(text: &str) -> Option<(String, String)> {
    let caps = SPEED_LEVEL_PLUS_CAPTURE.captures(text)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Split a `SPEED_VFR` token into its speed part (the trailing `VFR`
/// literal is discarded).
pub fn split_speed_vfr(text: &str) -> Option<String> {
    let caps = SPEED_VFR_CAPTURE.captures(text)?;
    Some(caps[1].to_string())
}

/// The default level assumed for a VFR break when none is stated, per
/// the reference implementation's constant of the same purpose.
pub const DEFAULT_VFR_LEVEL: &str = "F050";

/// Range-check a `LAT_LONG` or `LAT_LONG_BEARING_DISTANCE` token's
/// latitude/longitude portion, returning zero, one, or two diagnostic
/// messages — independently for latitude and longitude, matching the
/// reference behavior of reporting both when both are out of range.
pub fn lat_long_range_errors(text: &str) -> Vec<String> {
    let mut errors = Vec::new();

    let (lat, lon, dm) = if let Some(caps) = split_deg(text) {
        (caps.0, caps.1, false)
    } else if let Some(caps) = split_dm(text) {
        (caps.0, caps.1, true)
    } else {
        return errors;
    };

    if dm {
        if !is_degree_minute_semantics(lat, 9000, 2) {
            errors.push(format!(
                "Latitude degree/minute value must be 0 to 9000 with minutes < 60 instead of '{text}'"
            ));
        }
        if !is_degree_minute_semantics(lon, 18000, 3) {
            errors.push(format!(
                "Longitude degree/minute value must be 0 to 18000 with minutes < 60 instead of '{text}'"
            ));
        }
    } else {
        if !is_degree_semantics(lat, 90) {
            errors.push(format!("Latitude degree value must be 0 to 90 instead of '{text}'"));
        }
        if !is_degree_semantics(lon, 180) {
            errors.push(format!("Longitude degree value must be 0 to 180 instead of '{text}'"));
        }
    }
    errors
}

/// Split a degrees-only lat/long (optionally with trailing
/// bearing/distance digits) into its `(latitude, longitude)` digit
/// substrings.
fn split_deg(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    if bytes.len() < 7 {
        return None;
    }
    if !(bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit()) {
        return None;
    }
    if bytes[2] != b'N' && bytes[2] != b'S' {
        return None;
    }
    if !bytes[3..6].iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() < 7 || (bytes[6] != b'E' && bytes[6] != b'W') {
        return None;
    }
    let rest = &text[7..];
    if !(rest.is_empty() || (rest.len() == 6 && rest.bytes().all(|b| b.is_ascii_digit()))) {
        return None;
    }
    Some((&text[0..2], &text[3..6]))
}

/// Split a degrees+minutes lat/long (optionally with trailing
/// bearing/distance digits) into its `(latitude, longitude)` digit
/// substrings.
fn split_dm(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    if !bytes[0..4].iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes[4] != b'N' && bytes[4] != b'S' {
        return None;
    }
    if !bytes[5..10].iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() < 11 || (bytes[10] != b'E' && bytes[10] != b'W') {
        return None;
    }
    let rest = &text[11..];
    if !(rest.is_empty() || (rest.len() == 6 && rest.bytes().all(|b| b.is_ascii_digit()))) {
        return None;
    }
    Some((&text[0..4], &text[5..10]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_level_splits_into_parts() {
        assert_eq!(split_speed_level("N0450F350"), Some(("N0450".to_string(), "F350".to_string())));
        assert_eq!(
            split_speed_level_level("N0100F200F320"),
            Some(("N0100".to_string(), "F200".to_string(), "F320".to_string()))
        );
        assert_eq!(
            split_speed_level_plus("N0100F200PLUS"),
            Some(("N0100".to_string(), "F200".to_string()))
        );
        assert_eq!(split_speed_vfr("N0450VFR"), Some("N0450".to_string()));
    }

    #[test]
    fn speed_level_variants_priority() {
        assert_eq!(classify("N0450F350").0, BaseKind::SpeedLevel);
        assert_eq!(classify("N0450VFR").0, BaseKind::SpeedVfr);
        assert_eq!(classify("N0100F200F320").0, BaseKind::SpeedLevelLevel);
        assert_eq!(classify("N0100F200PLUS").0, BaseKind::SpeedLevelPlus);
    }

    #[test]
    fn lat_long_variants() {
        assert_eq!(classify("23N179E").0, BaseKind::LatLong);
        assert_eq!(classify("2314S12356W").0, BaseKind::LatLong);
        assert_eq!(classify("12N123E123456").0, BaseKind::LatLongBearingDistance);
        assert_eq!(classify("1234S09012E").0, BaseKind::LatLong);
    }

    #[test]
    fn keywords_and_break_markers() {
        assert_eq!(classify("DCT").0, BaseKind::Dct);
        assert_eq!(classify("T").0, BaseKind::Truncate);
        assert_eq!(classify("C").0, BaseKind::CruiseClimb);
        assert_eq!(classify("VFR"), (BaseKind::BreakStart, SubKind::Vfr));
        assert_eq!(classify("OAT"), (BaseKind::BreakStart, SubKind::Oat));
        assert_eq!(classify("IFPSTOP"), (BaseKind::BreakStart, SubKind::IfpStop));
        assert_eq!(classify("IFR"), (BaseKind::BreakEnd, SubKind::Ifr));
        assert_eq!(classify("GAT"), (BaseKind::BreakEnd, SubKind::Gat));
        assert_eq!(classify("IFPSTART"), (BaseKind::BreakEnd, SubKind::IfpStart));
    }

    #[test]
    fn ats_route_sid_star_and_point() {
        assert_eq!(classify("B9").0, BaseKind::AtsRoute);
        assert_eq!(classify("UL607").0, BaseKind::AtsRoute);
        assert_eq!(classify("LNZ1A").0, BaseKind::SidStar);
        assert_eq!(classify("NOLAN2C").0, BaseKind::SidStar);
        assert_eq!(classify("ABC").0, BaseKind::Point);
        assert_eq!(classify("PNT").0, BaseKind::Point);
    }

    #[test]
    fn stay_and_too_long_and_unknown() {
        assert_eq!(classify("STAY6").0, BaseKind::StayN);
        assert_eq!(classify("2359").0, BaseKind::StayTime);
        assert_eq!(classify("2400").0, BaseKind::Unknown);
        assert_eq!(classify("ABCDEFGHIJKLMNOPQRSTUVWXYZ").0, BaseKind::TooLong);
        assert_eq!(classify("1").0, BaseKind::Unknown);
    }

    #[test]
    fn lat_long_range_checks_report_independently() {
        let errors = lat_long_range_errors("91N181E");
        assert_eq!(
            errors,
            vec![
                "Latitude degree value must be 0 to 90 instead of '91N181E'".to_string(),
                "Longitude degree value must be 0 to 180 instead of '91N181E'".to_string(),
            ]
        );

        let errors = lat_long_range_errors("8960N17960E");
        assert_eq!(
            errors,
            vec![
                "Latitude degree/minute value must be 0 to 9000 with minutes < 60 instead of '8960N17960E'".to_string(),
                "Longitude degree/minute value must be 0 to 18000 with minutes < 60 instead of '8960N17960E'".to_string(),
            ]
        );

        assert!(lat_long_range_errors("89N179E").is_empty());
    }
}
