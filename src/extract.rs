/// Scalar field extraction: independent pattern matchers over raw log text.
///
/// Each matcher is a pure function returning an `Option`; a miss is a normal
/// outcome, never an error, and no matcher substitutes a default like 0 for a
/// genuinely missing field ("zero commits" and "could not determine commit
/// count" must stay distinguishable).
use regex::Regex;
use std::sync::LazyLock;

static PR_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"PR NUMBER:\s*(\d+)").unwrap());

// `[ \t]*` rather than `\s*`: the value must come from the marker's own line.
static PR_AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PR Author:[ \t]*([^\n]*)").unwrap());

static TOTAL_COMMITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Total Commits:\s*(\d+)").unwrap());

static CHANGED_FILES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Changed Files:\s*(\d+)\s*files?").unwrap());

static MODEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""model"\s*:\s*"([^"]+)""#).unwrap());

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z").unwrap());

static TITLE_PR_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\d+)").unwrap());

fn capture_u64(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// PR number from the `PR NUMBER: <digits>` marker.
pub fn pr_number(text: &str) -> Option<u64> {
    capture_u64(&PR_NUMBER, text)
}

/// PR number from a run's display title, e.g. `Fix login flow (#123)`.
/// Fallback tier for [`pr_number`]; the assembler applies the two-tier policy.
pub fn pr_number_from_title(title: &str) -> Option<u64> {
    capture_u64(&TITLE_PR_REF, title)
}

/// PR author from the `PR Author: <name>` marker.
pub fn pr_author(text: &str) -> Option<String> {
    PR_AUTHOR
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Commit count from the `Total Commits: <digits>` marker.
pub fn total_commits(text: &str) -> Option<u64> {
    capture_u64(&TOTAL_COMMITS, text)
}

/// Changed-file count from the `Changed Files: <digits> files` marker.
pub fn changed_files(text: &str) -> Option<u64> {
    capture_u64(&CHANGED_FILES, text)
}

/// Model identifier from any `"model":"..."` fragment in the log, last match
/// wins. This usually appears on a short unfragmented line, so no reassembly
/// is needed.
pub fn model(text: &str) -> Option<String> {
    MODEL
        .captures_iter(text)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// First and last ISO-8601 timestamps appearing anywhere in the log, taken as
/// the run's start and end times.
pub fn time_bounds(text: &str) -> Option<(String, String)> {
    let mut iter = TIMESTAMP.find_iter(text);
    let first = iter.next()?.as_str().to_string();
    let last = iter.last().map(|m| m.as_str().to_string());
    let end = last.unwrap_or_else(|| first.clone());
    Some((first, end))
}
