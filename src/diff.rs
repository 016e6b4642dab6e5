/// Unified-diff parsing: hunk headers give changed line ranges in the new
/// file, and added declaration lines give symbol names directly.

#[derive(Debug, Clone, Copy)]
pub struct DiffHunk {
    pub start_line: i64,
    pub line_count: i64,
}

impl DiffHunk {
    pub fn end_line(&self) -> i64 {
        self.start_line + (self.line_count - 1).max(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChangedFile {
    pub path: String,
    pub changed_ranges: Vec<DiffHunk>,
}

pub fn parse_diff(diff: &str) -> Vec<ChangedFile> {
    let mut files = Vec::new();
    let mut current: Option<ChangedFile> = None;

    for line in diff.lines() {
        if let Some(path) = line.strip_prefix("+++ b/") {
            if let Some(file) = current.take() {
                files.push(file);
            }
            current = Some(ChangedFile {
                path: path.to_string(),
                ..Default::default()
            });
        } else if let Some(path) = line.strip_prefix("+++ ") {
            if path == "/dev/null" {
                continue;
            }
            if let Some(file) = current.take() {
                files.push(file);
            }
            current = Some(ChangedFile {
                path: path.to_string(),
                ..Default::default()
            });
        } else if let Some(rest) = line.strip_prefix("@@ ") {
            let Some(file) = current.as_mut() else {
                continue;
            };
            let Some(ranges) = rest.split("@@").next() else {
                continue;
            };
            // Hunk header: -old_start,old_count +new_start,new_count
            for part in ranges.split_whitespace() {
                if let Some(new_range) = part.strip_prefix('+') {
                    if let Some((start, count)) = parse_hunk_range(new_range) {
                        file.changed_ranges.push(DiffHunk {
                            start_line: start,
                            line_count: count,
                        });
                    }
                }
            }
        }
    }

    if let Some(file) = current {
        files.push(file);
    }
    files
}

fn parse_hunk_range(range: &str) -> Option<(i64, i64)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// Declarations named directly in the diff text: added `class X:` /
/// `def x(...)` lines and `@@ ... def x` context markers.
pub fn harvest_decl_names(diff: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix('+') {
            if line.starts_with("+++") {
                continue;
            }
            if let Some(name) = decl_name_in(rest.trim_start()) {
                names.push(name);
            }
        } else if let Some(rest) = line.strip_prefix("@@ ") {
            if let Some(context) = rest.split("@@").nth(1) {
                if let Some(name) = decl_name_in(context.trim()) {
                    names.push(name);
                }
            }
        }
    }
    names.sort();
    names.dedup();
    names
}

fn decl_name_in(text: &str) -> Option<String> {
    let rest = text
        .strip_prefix("class ")
        .or_else(|| text.strip_prefix("async def "))
        .or_else(|| text.strip_prefix("def "))
        .or_else(|| text.strip_prefix("fn "))?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() { None } else { Some(name) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hunk_ranges() {
        let diff = "\
--- a/app/router.py
+++ b/app/router.py
@@ -10,3 +10,4 @@ class Router:
+        pass
";
        let files = parse_diff(diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "app/router.py");
        assert_eq!(files[0].changed_ranges.len(), 1);
        assert_eq!(files[0].changed_ranges[0].start_line, 10);
        assert_eq!(files[0].changed_ranges[0].end_line(), 13);
    }

    #[test]
    fn harvests_added_declarations() {
        let diff = "\
+++ b/app/x.py
@@ -1,2 +1,4 @@ def outer
+class Widget:
+    def render(self):
";
        let names = harvest_decl_names(diff);
        assert_eq!(names, vec!["Widget", "outer", "render"]);
    }

    #[test]
    fn single_line_hunk_defaults_to_count_one() {
        assert!(matches!(parse_hunk_range("42"), Some((42, 1))));
    }
}
