/// Splits a comma-separated configuration value into trimmed, non-empty items.
///
/// Order is preserved and duplicates are kept; callers decide whether a
/// repeated id means a repeated call.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
