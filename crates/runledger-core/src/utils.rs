//! Utility helpers: data paths, record ids, user identity, filenames.

use std::path::PathBuf;

/// Get the Runledger data directory (e.g. `~/.runledger/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".runledger")
}

/// Generate a new record id: 12 lowercase hex chars from a v4 UUID.
pub fn new_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// Best-effort name of the local user, used as the default `created_by`.
pub fn system_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Sanitize a string for use as a filename.
pub fn safe_filename(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_shape() {
        let id = new_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_new_id_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn test_system_user_not_empty() {
        assert!(!system_user().is_empty());
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("hello world!"), "hello_world_");
        assert_eq!(safe_filename("a/b/c"), "a_b_c");
        assert_eq!(safe_filename("run-01_v2.json"), "run-01_v2.json");
    }

    #[test]
    fn test_data_path_ends_with_runledger() {
        assert!(get_data_path().ends_with(".runledger"));
    }
}
