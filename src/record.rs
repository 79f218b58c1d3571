/// Data model and record assembly: merge run metadata, the reassembled result
/// payload, and pattern-extracted scalars into one `ExecutionRecord` per run.
use crate::extract;
use crate::github::RunInfo;
use crate::reassemble::{reassemble_block, BlockKind};
use serde::Serialize;

/// Workflow run conclusion as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
    Cancelled,
    Unknown,
}

impl RunStatus {
    /// Map a raw `gh` conclusion string. Anything unrecognized, including the
    /// empty string a still-running run reports, is `Unknown`.
    pub fn from_conclusion(raw: &str) -> Self {
        match raw {
            "success" => RunStatus::Success,
            "failure" => RunStatus::Failure,
            "cancelled" => RunStatus::Cancelled,
            _ => RunStatus::Unknown,
        }
    }
}

/// One workflow run's extracted metrics. Every field beyond `run_id` and
/// `status` is independently optional: partial extraction still emits a
/// record, and absent fields serialize as null rather than a fabricated
/// zero or empty string.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub run_id: String,
    pub pr_number: Option<u64>,
    pub pr_title: Option<String>,
    pub pr_author: Option<String>,
    pub branch: Option<String>,
    pub status: RunStatus,
    pub model: Option<String>,
    pub total_cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u64>,
    pub total_commits: Option<u64>,
    pub changed_files: Option<u64>,
    pub is_error: Option<bool>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Assemble one record from the run's listing metadata and its raw log lines.
///
/// The reassembled result payload is authoritative for cost, duration, turn
/// count, error flag and model; the pattern matchers fill in PR metadata and
/// serve as the model fallback when the payload is absent or failed to
/// reassemble. PR number uses a two-tier policy: the `PR NUMBER:` log marker
/// first, then a `#N` reference in the display title.
///
/// An empty line sequence yields a record carrying only the listing metadata;
/// nothing in here fails.
pub fn assemble_record(meta: &RunInfo, lines: &[String]) -> ExecutionRecord {
    let text = lines.join("\n");

    let payload = reassemble_block(lines, BlockKind::Result);

    let (total_cost_usd, duration_ms, num_turns, is_error, payload_model) = match &payload {
        Some(p) => (
            p.get("total_cost_usd").and_then(|v| v.as_f64()),
            p.get("duration_ms").and_then(|v| v.as_u64()),
            p.get("num_turns").and_then(|v| v.as_u64()),
            Some(
                p.get("is_error")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            ),
            p.get("model")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        ),
        None => (None, None, None, None, None),
    };

    let pr_number =
        extract::pr_number(&text).or_else(|| extract::pr_number_from_title(&meta.display_title));

    let (start_time, end_time) = match extract::time_bounds(&text) {
        Some((s, e)) => (Some(s), Some(e)),
        None => (None, None),
    };

    ExecutionRecord {
        run_id: meta.database_id.to_string(),
        pr_number,
        pr_title: non_empty(&meta.display_title),
        pr_author: extract::pr_author(&text),
        branch: non_empty(&meta.head_branch),
        status: RunStatus::from_conclusion(&meta.conclusion),
        model: payload_model.or_else(|| extract::model(&text)),
        total_cost_usd,
        duration_ms,
        num_turns,
        total_commits: extract::total_commits(&text),
        changed_files: extract::changed_files(&text),
        is_error,
        start_time,
        end_time,
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
