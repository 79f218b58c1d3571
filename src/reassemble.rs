/// Multiline JSON reassembly: the log shipper fragments a single JSON document
/// across consecutive lines, each independently prefixed. This module locates
/// the start of the payload of interest, accumulates stripped content while
/// tracking brace depth, and parses the result.
use crate::logline::strip_prefix;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Which embedded JSON block to reassemble. Each kind has its own start-token
/// matcher so unrelated JSON-like text in the log does not open a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// The final `{"type":"result",...}` block carrying cost/duration/turns.
    Result,
    /// A block carrying a `"model"` key (usually short and unfragmented).
    ModelInfo,
}

impl BlockKind {
    /// Does this stripped line content mark the start of a block of this kind?
    fn starts(&self, content: &str) -> bool {
        match self {
            BlockKind::Result => content.contains("\"type\"") && content.contains("\"result\""),
            BlockKind::ModelInfo => content.contains("\"model\""),
        }
    }

    /// Is this parsed value actually a block of this kind? The start token is
    /// a heuristic; an unrelated object can sit near the marker line.
    fn validates(&self, value: &Value) -> bool {
        match self {
            BlockKind::Result => value.get("type").and_then(|t| t.as_str()) == Some("result"),
            BlockKind::ModelInfo => value.get("model").is_some(),
        }
    }
}

/// Quote-aware brace depth scanner. State persists across fragments: the log
/// shipper may split a payload mid-string, so `in_string`/`escaped` must
/// survive fragment boundaries.
#[derive(Debug, Default)]
struct DepthScanner {
    depth: i64,
    in_string: bool,
    escaped: bool,
    opened: bool,
}

impl DepthScanner {
    fn push(&mut self, fragment: &str) {
        for c in fragment.chars() {
            if self.escaped {
                self.escaped = false;
                continue;
            }
            if self.in_string {
                match c {
                    '\\' => self.escaped = true,
                    '"' => self.in_string = false,
                    _ => {}
                }
            } else {
                match c {
                    '"' => self.in_string = true,
                    '{' | '[' => {
                        self.depth += 1;
                        self.opened = true;
                    }
                    '}' | ']' => self.depth -= 1,
                    _ => {}
                }
            }
        }
    }

    /// Depth returned to zero after having gone positive.
    fn closed(&self) -> bool {
        self.opened && self.depth == 0
    }
}

#[derive(Debug, PartialEq, Eq)]
enum WindowState {
    Idle,
    Accumulating,
}

/// One reassembly window: Idle until an opening `{` appears, then Accumulating
/// until depth returns to zero or the line stream is exhausted.
struct Window {
    state: WindowState,
    scanner: DepthScanner,
    buf: String,
}

impl Window {
    fn new() -> Self {
        Self {
            state: WindowState::Idle,
            scanner: DepthScanner::default(),
            buf: String::new(),
        }
    }

    /// Feed one stripped line. Returns true once the window has closed.
    fn push(&mut self, content: &str) -> bool {
        let fragment = match self.state {
            WindowState::Idle => match content.find('{') {
                // Content before the opening brace is prelude, not payload.
                Some(pos) => {
                    self.state = WindowState::Accumulating;
                    &content[pos..]
                }
                None => return false,
            },
            WindowState::Accumulating => content,
        };
        self.scanner.push(fragment);
        self.buf.push_str(fragment);
        self.scanner.closed()
    }

    /// Parse the accumulated buffer. `None` if the window never closed
    /// (truncated log) or the buffer is unparseable even after repair.
    fn finish(self) -> Option<Value> {
        if !self.scanner.closed() {
            return None;
        }
        parse_with_repair(&self.buf)
    }
}

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Parse JSON, retrying once with trailing-comma repair. The source log format
/// occasionally emits one malformed trailing comma before a closing brace.
fn parse_with_repair(text: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Some(v);
    }
    let repaired = TRAILING_COMMA.replace_all(text, "$1");
    serde_json::from_str::<Value>(&repaired).ok()
}

/// Reassemble the first block of the given kind from a run's raw log lines.
///
/// The opening `{` may sit a few lines before the line carrying the start
/// token (the shipper splits after the brace), so each candidate window
/// searches back up to 3 lines for it. A window whose parsed value does not
/// validate as the requested kind is discarded and the scan continues.
pub fn reassemble_block(lines: &[String], kind: BlockKind) -> Option<Value> {
    for (i, line) in lines.iter().enumerate() {
        if !kind.starts(strip_prefix(line)) {
            continue;
        }
        let start = (i.saturating_sub(3)..i)
            .find(|&j| strip_prefix(&lines[j]).contains('{'))
            .unwrap_or(i);

        let mut window = Window::new();
        for line in &lines[start..] {
            if window.push(strip_prefix(line)) {
                break;
            }
        }
        match window.finish() {
            Some(value) if kind.validates(&value) => return Some(value),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reassembles_two_line_fragmented_result() {
        let log = lines(&[
            "review\tUNKNOWN STEP\t2025-12-17T23:51:16.777Z\t{\"type\":\"result\",",
            "review\tUNKNOWN STEP\t2025-12-17T23:51:17.001Z\t\"total_cost_usd\":0.49,\"num_turns\":22}",
        ]);
        let v = reassemble_block(&log, BlockKind::Result).unwrap();
        assert_eq!(
            v,
            json!({"type":"result","total_cost_usd":0.49,"num_turns":22})
        );
    }

    #[test]
    fn single_line_result() {
        let log = lines(&[
            "job\tstep\t2025-01-01T00:00:00.000Z\t{\"type\":\"result\",\"total_cost_usd\":1.5}",
        ]);
        let v = reassemble_block(&log, BlockKind::Result).unwrap();
        assert_eq!(v["total_cost_usd"], 1.5);
    }

    #[test]
    fn opening_brace_before_marker_line() {
        let log = lines(&[
            "job\tstep\t2025-01-01T00:00:00.000Z\t{",
            "job\tstep\t2025-01-01T00:00:00.001Z\t\"type\": \"result\",",
            "job\tstep\t2025-01-01T00:00:00.002Z\t\"num_turns\": 7",
            "job\tstep\t2025-01-01T00:00:00.003Z\t}",
        ]);
        let v = reassemble_block(&log, BlockKind::Result).unwrap();
        assert_eq!(v["num_turns"], 7);
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let log = lines(&[
            "job\tstep\t2025-01-01T00:00:00.000Z\t{\"type\":\"result\",",
            "job\tstep\t2025-01-01T00:00:00.001Z\t\"result\":\"{not a real brace}\",\"num_turns\":3}",
        ]);
        let v = reassemble_block(&log, BlockKind::Result).unwrap();
        assert_eq!(v["num_turns"], 3);
        assert_eq!(v["result"], "{not a real brace}");
    }

    #[test]
    fn escaped_quote_inside_string() {
        let payload = r#"{"type":"result","result":"she said \"hi {\" then left","num_turns":1}"#;
        let log = vec![format!("job\tstep\t2025-01-01T00:00:00.000Z\t{payload}")];
        let v = reassemble_block(&log, BlockKind::Result).unwrap();
        assert_eq!(v["num_turns"], 1);
        assert_eq!(v["result"], "she said \"hi {\" then left");
    }

    #[test]
    fn trailing_comma_repaired() {
        let log = lines(&[
            "job\tstep\t2025-01-01T00:00:00.000Z\t{\"type\":\"result\",\"a\":1,\"b\":2,}",
        ]);
        let v = reassemble_block(&log, BlockKind::Result).unwrap();
        assert_eq!(v, json!({"type":"result","a":1,"b":2}));
    }

    #[test]
    fn truncated_payload_fails() {
        let log = lines(&[
            "job\tstep\t2025-01-01T00:00:00.000Z\t{\"type\":\"result\",",
            "job\tstep\t2025-01-01T00:00:00.001Z\t\"num_turns\":22",
        ]);
        assert!(reassemble_block(&log, BlockKind::Result).is_none());
    }

    #[test]
    fn empty_lines_fail() {
        assert!(reassemble_block(&[], BlockKind::Result).is_none());
    }

    #[test]
    fn skips_non_result_object_near_marker() {
        // The first marker line sits next to an unrelated object, whose
        // window parses but fails validation; the scan continues and finds
        // the real block further down.
        let log = lines(&[
            "job\tstep\t2025-01-01T00:00:00.000Z\tsome text {\"foo\": 1}",
            "job\tstep\t2025-01-01T00:00:00.001Z\techo \"type\" \"result\" markers",
            "job\tstep\t2025-01-01T00:00:00.002Z\tplain output",
            "job\tstep\t2025-01-01T00:00:00.003Z\tplain output",
            "job\tstep\t2025-01-01T00:00:00.004Z\tplain output",
            "job\tstep\t2025-01-01T00:00:00.005Z\t{\"type\":\"result\",\"num_turns\":9}",
        ]);
        let v = reassemble_block(&log, BlockKind::Result).unwrap();
        assert_eq!(v["num_turns"], 9);
    }

    #[test]
    fn model_info_block() {
        let log = lines(&[
            "job\tstep\t2025-01-01T00:00:00.000Z\t{\"model\":\"claude-sonnet-4-5-20250929\"}",
        ]);
        let v = reassemble_block(&log, BlockKind::ModelInfo).unwrap();
        assert_eq!(v["model"], "claude-sonnet-4-5-20250929");
    }

    #[test]
    fn first_matching_window_wins() {
        let log = lines(&[
            "job\tstep\t2025-01-01T00:00:00.000Z\t{\"type\":\"result\",\"num_turns\":1}",
            "job\tstep\t2025-01-01T00:00:00.001Z\t{\"type\":\"result\",\"num_turns\":2}",
        ]);
        let v = reassemble_block(&log, BlockKind::Result).unwrap();
        assert_eq!(v["num_turns"], 1);
    }

    #[test]
    fn string_state_survives_fragment_boundary() {
        // The shipper split mid-string; the closing brace inside the string
        // continuation must not close the window early.
        let log = lines(&[
            "job\tstep\t2025-01-01T00:00:00.000Z\t{\"type\":\"result\",\"result\":\"code: fn main() {",
            "job\tstep\t2025-01-01T00:00:00.001Z\t}\",\"num_turns\":4}",
        ]);
        let v = reassemble_block(&log, BlockKind::Result).unwrap();
        assert_eq!(v["num_turns"], 4);
        assert_eq!(v["result"], "code: fn main() {}");
    }

    #[test]
    fn roundtrip_under_refragmentation() {
        let text = r#"{"type":"result","total_cost_usd":0.4907,"duration_ms":183455,"num_turns":22,"is_error":false,"result":"Fixed the {bug} in [module]"}"#;
        let original: Value = serde_json::from_str(text).unwrap();

        // Keep the start token on the opening line (the shipper wraps long
        // lines, it does not split the short head), then split the remainder
        // at arbitrary byte offsets and re-prefix every piece.
        let (head, tail) = text.split_at("{\"type\":\"result\",".len());
        for chunk in [1, 3, 7, 13, tail.len()] {
            let mut frags = vec![format!("job\tstep\t2025-01-01T00:00:00.000Z\t{head}")];
            frags.extend(tail.as_bytes().chunks(chunk).map(|c| {
                format!(
                    "job\tstep\t2025-01-01T00:00:00.000Z\t{}",
                    std::str::from_utf8(c).unwrap()
                )
            }));
            let v = reassemble_block(&frags, BlockKind::Result).unwrap();
            assert_eq!(v, original, "chunk size {chunk}");
        }
    }
}
