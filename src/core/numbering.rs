use super::error::EfacturaError;

/// Format an invoice number as `{prefix}-{year}-{4-digit seq}`,
/// e.g. "FAC-2025-0042".
pub fn format_number(prefix: &str, year: i32, seq: u32) -> String {
    format!("{prefix}-{year}-{seq:04}")
}

/// Parse `{prefix}-{year}-{seq}` back into its parts.
pub fn parse_number(number: &str) -> Option<(&str, i32, u32)> {
    let (rest, seq) = number.rsplit_once('-')?;
    let (prefix, year) = rest.rsplit_once('-')?;
    if prefix.is_empty() {
        return None;
    }
    Some((prefix, year.parse().ok()?, seq.parse().ok()?))
}

/// Allocate the next number for a prefix/year given every number already
/// issued under that prefix: highest existing sequence + 1, or 0001 when
/// none exist yet.
pub fn next_in_sequence<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    prefix: &str,
    year: i32,
) -> Result<String, EfacturaError> {
    let mut highest = 0u32;
    for number in existing {
        if let Some((p, y, seq)) = parse_number(number) {
            if p == prefix && y == year {
                highest = highest.max(seq);
            }
        }
    }
    let next = highest
        .checked_add(1)
        .ok_or_else(|| EfacturaError::Numbering(format!("sequence exhausted for {prefix}-{year}")))?;
    Ok(format_number(prefix, year, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_pads_to_four_digits() {
        assert_eq!(format_number("FAC", 2025, 1), "FAC-2025-0001");
        assert_eq!(format_number("FAC", 2025, 123), "FAC-2025-0123");
        assert_eq!(format_number("FAC", 2025, 12345), "FAC-2025-12345");
    }

    #[test]
    fn parse_roundtrip() {
        assert_eq!(parse_number("FAC-2025-0042"), Some(("FAC", 2025, 42)));
        assert_eq!(parse_number("A-B-2025-0001"), Some(("A-B", 2025, 1)));
        assert_eq!(parse_number("garbage"), None);
        assert_eq!(parse_number("-2025-0001"), None);
    }

    #[test]
    fn next_starts_at_one() {
        let next = next_in_sequence([], "FAC", 2025).unwrap();
        assert_eq!(next, "FAC-2025-0001");
    }

    #[test]
    fn next_increments_highest() {
        let existing = ["FAC-2025-0001", "FAC-2025-0007", "FAC-2024-0099"];
        let next = next_in_sequence(existing, "FAC", 2025).unwrap();
        assert_eq!(next, "FAC-2025-0008");
    }

    #[test]
    fn other_prefixes_ignored() {
        let existing = ["PRO-2025-0031", "FAC-2025-0002"];
        let next = next_in_sequence(existing, "FAC", 2025).unwrap();
        assert_eq!(next, "FAC-2025-0003");
    }
}
