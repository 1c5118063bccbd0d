//! Go-style duration strings
//!
//! Resources express timeouts and intervals the way Kubernetes users expect:
//! a sequence of decimal numbers, each with a unit, e.g. `1h30m`, `1.5s`,
//! `250ms`, `500us`. Units are `h`, `m`, `s`, `ms`, `us` (or `µs`), and `ns`.

use std::time::Duration;

use crate::Error;

/// Units longest-suffix first so `ms` is not read as `m`
const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
];

/// Parse a Go-style duration string.
///
/// # Errors
///
/// Returns a validation error when the string is empty, a component is
/// missing its number or unit, or a unit is not one of `h`, `m`, `s`, `ms`,
/// `us`, `µs`, `ns`.
pub fn parse_duration(s: &str) -> Result<Duration, Error> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::validation("duration cannot be empty"));
    }

    let mut total_nanos: u128 = 0;
    let mut remaining = s;

    while !remaining.is_empty() {
        let num_end = remaining
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(remaining.len());
        let number = &remaining[..num_end];
        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(Error::validation(format!(
                "expected a number at position {} in '{}'",
                s.len() - remaining.len(),
                s
            )));
        }
        remaining = &remaining[num_end..];

        let Some((unit, scale)) = UNITS.iter().find(|(unit, _)| remaining.starts_with(unit)) else {
            return Err(Error::validation(if remaining.is_empty() {
                format!("missing unit suffix in duration '{}'", s)
            } else {
                format!("invalid duration unit in '{}' (expected h, m, s, ms, us, or ns)", s)
            }));
        };
        remaining = &remaining[unit.len()..];

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| Error::validation(format!("invalid number in duration '{}'", s)))?
        };
        let mut component = whole.saturating_mul(*scale);
        // fractional digits past nanosecond precision are dropped
        let mut place = *scale;
        for digit in fraction.bytes() {
            place /= 10;
            if place == 0 {
                break;
            }
            component = component.saturating_add(u128::from(digit - b'0') * place);
        }
        total_nanos = total_nanos.saturating_add(component);
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).unwrap_or(u64::MAX);
    // remainder of a division by 1e9 always fits in u32
    let nanos = (total_nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Parse an optional duration, keeping `None` as `None`.
pub fn parse_optional_duration(s: Option<&str>) -> Result<Option<Duration>, Error> {
    s.map(parse_duration).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn parses_combined_units() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(
            parse_duration("1m30s500ms").unwrap(),
            Duration::from_millis(90_500)
        );
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(parse_duration(" 10s ").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_empty() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("   ").is_err());
    }

    #[test]
    fn rejects_missing_unit() {
        let err = parse_duration("30").unwrap_err();
        assert!(err.to_string().contains("missing unit"));
    }

    #[test]
    fn parses_fractions_and_small_units() {
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("0.5h").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration(".25s").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("500us").unwrap(), Duration::from_micros(500));
        assert_eq!(parse_duration("500µs").unwrap(), Duration::from_micros(500));
        assert_eq!(parse_duration("42ns").unwrap(), Duration::from_nanos(42));
        assert_eq!(parse_duration("1m0.5s").unwrap(), Duration::from_millis(60_500));
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(parse_duration(".s").is_err());
        assert!(parse_duration("1.2.3s").is_err());
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("m").is_err());
    }

    #[test]
    fn optional_duration_passes_none_through() {
        assert_eq!(parse_optional_duration(None).unwrap(), None);
        assert_eq!(
            parse_optional_duration(Some("1s")).unwrap(),
            Some(Duration::from_secs(1))
        );
        assert!(parse_optional_duration(Some("bogus")).is_err());
    }
}
