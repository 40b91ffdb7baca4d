//! Output filenames: `{product}_{base}_{YYYYMMDDHHMMSS}.{ext}`.

use chrono::{DateTime, Utc};

/// Base name used when sanitizing leaves nothing
pub const PLACEHOLDER_BASE_NAME: &str = "tweet";

/// Keep ASCII letters and digits only, falling back to
/// [`PLACEHOLDER_BASE_NAME`]
#[must_use]
pub fn sanitize_base_name(base_name: &str) -> String {
    let cleaned: String = base_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if cleaned.is_empty() {
        PLACEHOLDER_BASE_NAME.to_string()
    } else {
        cleaned
    }
}

/// Build a filename stamped with `at` (UTC)
#[must_use]
pub fn generate_filename(product: &str, base_name: &str, extension: &str, at: DateTime<Utc>) -> String {
    format!(
        "{product}_{}_{}.{extension}",
        sanitize_base_name(base_name),
        at.format("%Y%m%d%H%M%S")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_base_name("@jack_dorsey!"), "jackdorsey");
        assert_eq!(sanitize_base_name("Ünïcødé"), "ncd");
        assert_eq!(sanitize_base_name("__"), PLACEHOLDER_BASE_NAME);
        assert_eq!(sanitize_base_name(""), PLACEHOLDER_BASE_NAME);
    }

    #[test]
    fn test_generate_filename() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(
            generate_filename("tweet-studio", "@postloom", "gif", at),
            "tweet-studio_postloom_20240307090501.gif"
        );
        assert_eq!(
            generate_filename("tweet-studio", "", "png", at),
            "tweet-studio_tweet_20240307090501.png"
        );
    }

    proptest! {
        #[test]
        fn prop_sanitized_is_alphanumeric(name in ".*") {
            let cleaned = sanitize_base_name(&name);
            prop_assert!(!cleaned.is_empty());
            prop_assert!(cleaned.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}
