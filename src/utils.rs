//! Small helpers shared across the pipeline: log truncation, media
//! filename sanitization, and data-directory validation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary at or below `max` bytes,
/// with an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

static FILENAME_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static FILENAME_COLLAPSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Build a safe media filename from a product name.
///
/// Drops everything except word characters, whitespace, and hyphens,
/// then collapses runs of whitespace/hyphens into single hyphens.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(media_filename("MX Master 3S (Graphite)"), "MX-Master-3S-Graphite.jpg");
/// ```
pub fn media_filename(product_name: &str) -> String {
    let stripped = FILENAME_STRIP.replace_all(product_name, "");
    let collapsed = FILENAME_COLLAPSE.replace_all(stripped.trim(), "-");
    format!("{collapsed}.jpg")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then performs a write test by
/// creating and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Small sync probe write; simpler error surface than async here.
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Data directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "ガジェットレビュー".repeat(10);
        let result = truncate_for_log(&s, 10);
        // Must not panic and must keep whole characters.
        assert!(result.contains("…"));
    }

    #[test]
    fn test_media_filename_strips_and_collapses() {
        assert_eq!(
            media_filename("MX Master 3S (Graphite)"),
            "MX-Master-3S-Graphite.jpg"
        );
        assert_eq!(media_filename("K70  RGB -- PRO!"), "K70-RGB-PRO.jpg");
    }

    #[test]
    fn test_media_filename_plain_name() {
        assert_eq!(media_filename("Anker 521 Power Bank"), "Anker-521-Power-Bank.jpg");
    }
}
