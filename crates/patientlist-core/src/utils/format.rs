/// Case-insensitive substring test.
/// An empty needle matches everything.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Case-insensitive equality, ignoring surrounding whitespace
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Trim a user-entered value, mapping blank input to `None`
pub fn normalize_term(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Johnson", "john"));
        assert!(contains_ignore_case("Johnson", "SON"));
        assert!(contains_ignore_case("anything", ""));
        assert!(!contains_ignore_case("Smith", "jo"));
    }

    #[test]
    fn test_eq_ignore_case() {
        assert!(eq_ignore_case("army", "ARMY"));
        assert!(eq_ignore_case(" o-3 ", "O-3"));
        assert!(!eq_ignore_case("army", "navy"));
    }

    #[test]
    fn test_normalize_term() {
        assert_eq!(normalize_term(Some("  army ")), Some("army".to_string()));
        assert_eq!(normalize_term(Some("   ")), None);
        assert_eq!(normalize_term(Some("")), None);
        assert_eq!(normalize_term(None), None);
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Hello", 3), "Hel");
    }
}
