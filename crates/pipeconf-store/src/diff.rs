//! Unified-diff post-processing.

use std::sync::OnceLock;

use regex::Regex;

fn hunk_header() -> &'static Regex {
    static HUNK: OnceLock<Regex> = OnceLock::new();
    HUNK.get_or_init(|| {
        Regex::new(r"^@@ -\d+(,\d+)? \+\d+(,\d+)? @@").expect("hunk header pattern is valid")
    })
}

/// Drop the per-file header block (`diff --git`, `index`, `---`, `+++`, mode
/// lines) from `git diff` output, keeping hunks verbatim.
///
/// Only lines between a `diff --git` line and the first hunk of that file
/// are removed, so content lines that happen to start with `---` survive.
pub fn strip_file_headers(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_header = false;

    for line in raw.lines() {
        if line.starts_with("diff --git ") {
            in_header = true;
            continue;
        }
        if in_header {
            if hunk_header().is_match(line) {
                in_header = false;
            } else {
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "diff --git a/pipelines.cfg b/pipelines.cfg\n\
index 1111111..2222222 100644\n\
--- a/pipelines.cfg\n\
+++ b/pipelines.cfg\n\
@@ -1,2 +1,2 @@\n\
-<cruise schemaVersion='33'>\n\
+<cruise schemaVersion='60'>\n\
--- removed line that looks like a header\n";

    #[test]
    fn strips_headers_keeps_hunks() {
        let cleaned = strip_file_headers(RAW);
        assert!(!cleaned.contains("diff --git"));
        assert!(!cleaned.contains("index 1111111"));
        assert!(!cleaned.contains("--- a/pipelines.cfg"));
        assert!(!cleaned.contains("+++ b/pipelines.cfg"));
        assert!(cleaned.starts_with("@@ -1,2 +1,2 @@"));
        assert!(cleaned.contains("-<cruise schemaVersion='33'>"));
        assert!(cleaned.contains("+<cruise schemaVersion='60'>"));
    }

    #[test]
    fn header_lookalikes_inside_hunks_survive() {
        let cleaned = strip_file_headers(RAW);
        assert!(cleaned.contains("--- removed line that looks like a header"));
    }

    #[test]
    fn empty_diff_stays_empty() {
        assert_eq!(strip_file_headers(""), "");
    }
}
