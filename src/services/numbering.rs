//! Human-readable document numbers (`QUO-0007`, `WO-0012`, `DN-0003`).

/// Next free number for a prefix, scanning the numbers already taken within
/// the tenant. Unparsable numbers are ignored rather than rejected; the
/// sequence continues after the highest well-formed suffix.
pub fn next_document_number<'a>(
    prefix: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    let highest = existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(prefix))
        .filter_map(|rest| rest.strip_prefix('-'))
        .filter_map(|digits| digits.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}-{:04}", prefix, highest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_and_continues_after_the_highest() {
        assert_eq!(next_document_number("WO", []), "WO-0001");
        assert_eq!(
            next_document_number("WO", ["WO-0001", "WO-0005", "WO-0002"]),
            "WO-0006"
        );
    }

    #[test]
    fn ignores_foreign_and_malformed_numbers() {
        assert_eq!(
            next_document_number("WO", ["QUO-0009", "WO-abc", "WO-0003"]),
            "WO-0004"
        );
    }
}
