//! House number parsing.

/// Longest non-digit suffix tolerated after the number (`12a`, `7 b`).
const MAX_SUFFIX: usize = 2;

/// Largest house number accepted. Bigger values are treated as unparsable,
/// which also bounds how many points one interpolation segment can yield.
pub const MAX_HOUSENUMBER: i32 = 32_767;

/// Parses the numeric part of an `addr:housenumber` value.
///
/// Leading and trailing whitespace is ignored and up to two trailing
/// non-digit characters are stripped. Anything else, including zero,
/// negative values and values above [`MAX_HOUSENUMBER`], yields `None`.
#[must_use]
pub fn parse_housenumber(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    let number = trimmed.trim_end_matches(|c: char| !c.is_ascii_digit());
    if trimmed[number.len()..].chars().count() > MAX_SUFFIX {
        return None;
    }
    number
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|n| (1..=MAX_HOUSENUMBER).contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_housenumber("12"), Some(12));
        assert_eq!(parse_housenumber("  7 "), Some(7));
    }

    #[test]
    fn short_suffixes_are_stripped() {
        assert_eq!(parse_housenumber("12a"), Some(12));
        assert_eq!(parse_housenumber("12 b"), Some(12));
        assert_eq!(parse_housenumber("3bis"), None);
    }

    #[test]
    fn unparsable_values_are_absent() {
        assert_eq!(parse_housenumber(""), None);
        assert_eq!(parse_housenumber("abc"), None);
        assert_eq!(parse_housenumber("12/3a"), None);
        assert_eq!(parse_housenumber("0"), None);
        assert_eq!(parse_housenumber("-4"), None);
    }

    #[test]
    fn numbers_above_the_limit_are_absent() {
        assert_eq!(parse_housenumber("32767"), Some(32_767));
        assert_eq!(parse_housenumber("32768"), None);
        assert_eq!(parse_housenumber("20000001"), None);
        assert_eq!(parse_housenumber("2147483647"), None);
        assert_eq!(parse_housenumber("99999999999"), None);
    }
}
