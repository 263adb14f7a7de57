//! Identifier generation and validation.

use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// Longest project id accepted by [`is_valid_project_id`].
pub const MAX_PROJECT_ID_LEN: usize = 128;

#[allow(clippy::expect_used)]
fn project_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("static regex is valid"))
}

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a new UUID v7 (time-ordered).
#[must_use]
pub fn generate_uuid_v7() -> Uuid {
    Uuid::now_v7()
}

/// Returns true if `project_id` is safe to use as a storage key and file name.
#[must_use]
pub fn is_valid_project_id(project_id: &str) -> bool {
    project_id.len() <= MAX_PROJECT_ID_LEN
        && !project_id.contains("..")
        && project_id_pattern().is_match(project_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_valid() {
        assert_eq!(generate_uuid().get_version_num(), 4);
        assert_eq!(generate_uuid_v7().get_version_num(), 7);
    }

    #[test]
    fn test_uuid_v7_is_time_ordered() {
        let first = generate_uuid_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = generate_uuid_v7();
        assert!(first < second);
    }

    #[test]
    fn test_project_id_validation() {
        assert!(is_valid_project_id("proj-42"));
        assert!(is_valid_project_id("6f1c2a9e.v2"));
        assert!(!is_valid_project_id(""));
        assert!(!is_valid_project_id("../etc/passwd"));
        assert!(!is_valid_project_id("a/b"));
        assert!(!is_valid_project_id(".hidden"));
        assert!(!is_valid_project_id("a..b"));
        assert!(!is_valid_project_id(&"x".repeat(MAX_PROJECT_ID_LEN + 1)));
    }
}
