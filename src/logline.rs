/// Log line prefix stripping: GitHub Actions logs fetched via `gh run view --log`
/// prefix each line with `<job>\t<step>\t<timestamp>` metadata. The content we
/// care about is whatever follows that prefix.
use regex::Regex;
use std::sync::LazyLock;

/// ISO-8601 timestamp followed by whitespace; content is everything after.
static TIMESTAMP_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z\s+(.*)").unwrap()
});

/// Strip the `job\tstep\ttimestamp` prefix from a raw log line.
///
/// Primary match: a 4-field tab-delimited line yields everything after the
/// third tab, exactly as shipped (the tab variant preserves content
/// whitespace, which matters when a payload is split mid-string). Fallback:
/// an ISO timestamp followed by whitespace, the rest of the line being the
/// content. Lines matching neither shape are returned unmodified —
/// continuation lines of a wrapped payload may carry shorter prefixes, and
/// dropping them would corrupt reassembly.
pub fn strip_prefix(line: &str) -> &str {
    let mut tabs = 0;
    for (i, b) in line.bytes().enumerate() {
        if b == b'\t' {
            tabs += 1;
            if tabs == 3 {
                return &line[i + 1..];
            }
        }
    }

    if let Some(caps) = TIMESTAMP_PREFIX.captures(line) {
        if let Some(m) = caps.get(1) {
            return &line[m.start()..];
        }
    }
    line
}
