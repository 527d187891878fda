/// Get environment variable with QUAYSIDE_ prefix, falling back to unprefixed version
///
/// Checks `QUAYSIDE_{key}` first, then `{key}`, so deployments can use either
/// namespaced or conventional variable names.
///
/// # Examples
///
/// ```rust,ignore
/// // Checks QUAYSIDE_PORT first, then PORT
/// let port = get_env_with_prefix("PORT");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("QUAYSIDE_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse a boolean-ish environment value ("true", "1", "yes", "on")
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Split a comma separated list, dropping empty entries
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("QUAYSIDE_ENV_HELPER_VAR", "prefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("ENV_HELPER_VAR"),
            Some("prefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("QUAYSIDE_ENV_HELPER_VAR");
        }

        unsafe {
            std::env::set_var("ENV_HELPER_FALLBACK_VAR", "unprefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("ENV_HELPER_FALLBACK_VAR"),
            Some("unprefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("ENV_HELPER_FALLBACK_VAR");
        }

        assert_eq!(get_env_with_prefix("ENV_HELPER_MISSING_VAR"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list("http://a, ,http://b,"),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
    }
}
