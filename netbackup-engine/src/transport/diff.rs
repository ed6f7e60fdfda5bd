//! Line-indexed configuration diff.
//!
//! The differential backup decision only needs byte equality plus a
//! human-readable summary of what moved, so the diff is a positional line
//! comparison rather than a full LCS.

/// Outcome of comparing two configuration texts.
#[derive(Debug, Clone)]
pub struct ConfigDiff {
    /// True iff the two texts are not byte-identical.
    pub has_changes: bool,
    /// One `Line <n>: -<old> +<new>` entry per differing line pair.
    pub text: Option<String>,
}

/// Compare two configuration texts line by line.
///
/// `has_changes` tracks byte equality exactly; the rendered text covers
/// changed, added and removed lines by position.
pub fn line_diff(old: &str, new: &str) -> ConfigDiff {
    if old == new {
        return ConfigDiff {
            has_changes: false,
            text: None,
        };
    }

    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let mut out = String::new();

    let line_count = old_lines.len().max(new_lines.len());
    for i in 0..line_count {
        let old_line = old_lines.get(i).copied().unwrap_or("");
        let new_line = new_lines.get(i).copied().unwrap_or("");
        if old_line != new_line {
            out.push_str(&format!("Line {}: -{} +{}\n", i + 1, old_line, new_line));
        }
    }

    ConfigDiff {
        has_changes: true,
        text: Some(out),
    }
}
