// ABOUTME: Debug artifact capture: page markup, screenshots and error text under a flat directory.
// ABOUTME: Capture never fails the caller; directory snapshots let the run loop spot new artifacts.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;

use crate::browser::Page;

/// Writes `{prefix}_{UTC timestamp}.{ext}` files into one directory.
#[derive(Debug, Clone)]
pub struct DebugCapture {
    dir: PathBuf,
}

/// UTC timestamp tag used in artifact names.
pub fn timestamp_tag() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Replaces anything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_prefix(prefix: &str) -> String {
    let cleaned: String = prefix
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "debug".to_string()
    } else {
        cleaned
    }
}

impl DebugCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Names of the regular files currently in the directory.
    pub fn snapshot(&self) -> BTreeSet<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return BTreeSet::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect()
    }

    /// Files present now that were not in `before`, sorted.
    pub fn new_since(&self, before: &BTreeSet<String>) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter(|name| !before.contains(name))
            .collect()
    }

    /// Saves markup and a screenshot of `page`. If either fails, a text file
    /// with `reason` and the capture error is written instead.
    pub fn capture_page(&self, page: &dyn Page, prefix: &str, reason: &str) -> Vec<PathBuf> {
        let prefix = sanitize_prefix(prefix);
        let ts = timestamp_tag();
        let mut written = Vec::new();
        let mut problems = Vec::new();

        match page.content() {
            Ok(html) => {
                if let Some(p) = self.write(&format!("{}_{}.html", prefix, ts), html.as_bytes()) {
                    written.push(p);
                }
            }
            Err(e) => problems.push(format!("content: {}", e)),
        }

        match page.screenshot_png() {
            Ok(png) => {
                if let Some(p) = self.write(&format!("{}_{}.png", prefix, ts), &png) {
                    written.push(p);
                }
            }
            Err(e) => problems.push(format!("screenshot: {}", e)),
        }

        if !problems.is_empty() {
            let body = format!(
                "url: {}\nreason: {}\n{}\n",
                page.current_url(),
                reason,
                problems.join("\n")
            );
            written.extend(self.capture_text(&format!("{}_exception", prefix), &body));
        }

        tracing::info!(prefix = %prefix, files = written.len(), "saved debug capture");
        written
    }

    /// Saves `text` as `{prefix}_{ts}.txt`.
    pub fn capture_text(&self, prefix: &str, text: &str) -> Option<PathBuf> {
        let name = format!("{}_{}.txt", sanitize_prefix(prefix), timestamp_tag());
        self.write(&name, text.as_bytes())
    }

    fn write(&self, name: &str, data: &[u8]) -> Option<PathBuf> {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "cannot create debug dir");
            return None;
        }
        let path = self.dir.join(name);
        match fs::write(&path, data) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "debug artifact written");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "debug artifact write failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::StaticPage;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_prefix_replaces_unsafe_chars() {
        assert_eq!(sanitize_prefix("olens_click_3"), "olens_click_3");
        assert_eq!(sanitize_prefix("a/b c"), "a_b_c");
        assert_eq!(sanitize_prefix(""), "debug");
    }

    #[test]
    fn test_snapshot_of_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let capture = DebugCapture::new(dir.path().join("nope"));
        assert!(capture.snapshot().is_empty());
    }

    #[test]
    fn test_capture_text_appears_in_new_since() {
        let dir = TempDir::new().unwrap();
        let capture = DebugCapture::new(dir.path().join("debug"));
        let before = capture.snapshot();
        let path = capture.capture_text("lensme_timeout", "timed out").unwrap();
        assert!(path.exists());
        let created = capture.new_since(&before);
        assert_eq!(created.len(), 1);
        assert!(created[0].starts_with("lensme_timeout_"));
        assert!(created[0].ends_with(".txt"));
    }

    #[test]
    fn test_capture_page_without_screenshot_writes_html_and_text() {
        let dir = TempDir::new().unwrap();
        let capture = DebugCapture::new(dir.path());
        let page = StaticPage::from_html("https://x.example/", "<html><body>hi</body></html>");
        let files = capture.capture_page(&page, "x_no_results", "zero items");
        assert_eq!(files.len(), 2);
        let names = capture.snapshot();
        assert!(names.iter().any(|n| n.starts_with("x_no_results_") && n.ends_with(".html")));
        let text = names
            .iter()
            .find(|n| n.starts_with("x_no_results_exception_"))
            .expect("exception text");
        let body = fs::read_to_string(dir.path().join(text)).unwrap();
        assert!(body.contains("zero items"));
        assert!(body.contains("screenshot"));
    }

    #[test]
    fn test_unwritable_dir_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain-file");
        fs::write(&file, "x").unwrap();
        let capture = DebugCapture::new(file.join("sub"));
        assert!(capture.capture_text("a", "b").is_none());
    }
}
