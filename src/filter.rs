use std::collections::BTreeSet;

/// Parse a comma-separated filter list such as `".txt, .PDF"`.
///
/// Items are trimmed and lowercased; empty items are dropped.
pub fn parse_filters(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Decide whether a file name is eligible for backup.
///
/// An empty filter set allows everything. Otherwise the lowercase trailing
/// extension (from the last `.` to the end) must be in the set, or the
/// lowercase name must end with one of the filter strings. The second rule
/// covers filters written without a leading dot and compound suffixes like
/// `.tar.gz`.
pub fn matches(file_name: &str, filters: &BTreeSet<String>) -> bool {
    if filters.is_empty() {
        return true;
    }

    let name = file_name.to_lowercase();
    let extension = name.rfind('.').map(|idx| &name[idx..]).unwrap_or("");

    if filters.contains(extension) {
        return true;
    }

    filters.iter().any(|filter| name.ends_with(filter.as_str()))
}
