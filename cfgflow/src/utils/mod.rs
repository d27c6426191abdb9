//! Utility functions for identifiers and timestamps.

use chrono::Utc;
use uuid::Uuid;

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// Format: `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`
///
/// # Examples
///
/// ```
/// use cfgflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Returns a collision-free file name: `<prefix>_<uuid-simple>.<extension>`.
#[must_use]
pub fn unique_file_name(prefix: &str, extension: &str) -> String {
    format!("{prefix}_{}.{extension}", generate_uuid().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_valid() {
        let id = generate_uuid();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.contains(':'));
    }

    #[test]
    fn test_unique_file_name() {
        let a = unique_file_name("cfg", "png");
        let b = unique_file_name("cfg", "png");

        assert!(a.starts_with("cfg_"));
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), "cfg_".len() + 32 + ".png".len());
        assert_ne!(a, b);
    }
}
