/// Report generation: CSV (row per run) and JSON (array of records) outputs.
/// Absent fields render as "N/A" in the CSV and null in the JSON; rendering
/// never conflates "unknown" with a legitimate zero.
use crate::record::{ExecutionRecord, RunStatus};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ReportError {
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize {
        source: serde_json::Error,
    },
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Write { path, source } => {
                write!(f, "failed to write report {}: {}", path.display(), source)
            }
            ReportError::Serialize { source } => {
                write!(f, "failed to serialize records: {source}")
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Write { source, .. } => Some(source),
            ReportError::Serialize { source } => Some(source),
        }
    }
}

const NOT_AVAILABLE: &str = "N/A";

const CSV_HEADER: [&str; 14] = [
    "PR Number",
    "PR Title",
    "PR Author",
    "Branch",
    "Model",
    "Cost (USD)",
    "Duration (s)",
    "Turns",
    "Commits",
    "Changed Files",
    "Status",
    "Start Time",
    "End Time",
    "PR Link",
];

/// Format a duration in milliseconds as seconds.
fn format_duration(duration_ms: Option<u64>) -> String {
    match duration_ms {
        Some(ms) => format!("{}", ms as f64 / 1000.0),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Trim an ISO timestamp to `YYYY-MM-DD HH:MM:SS`.
fn format_timestamp(timestamp: Option<&str>) -> String {
    match timestamp {
        Some(ts) if ts.len() >= 19 => ts[..19].replace('T', " "),
        Some(ts) => ts.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Shorten verbose model identifiers for report readability.
fn shorten_model(model: &str) -> String {
    model.replace("claude-sonnet-4-5-20250929", "sonnet-4.5")
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Success => "success",
        RunStatus::Failure => "failure",
        RunStatus::Cancelled => "cancelled",
        RunStatus::Unknown => "unknown",
    }
}

/// RFC 4180 quoting: fields containing a comma, quote, or newline are wrapped
/// in quotes with embedded quotes doubled.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn opt_string<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn csv_row(record: &ExecutionRecord, repo: &str) -> String {
    let model = match &record.model {
        Some(m) => shorten_model(m),
        None => NOT_AVAILABLE.to_string(),
    };
    let cost = match record.total_cost_usd {
        Some(c) => format!("{c:.4}"),
        None => NOT_AVAILABLE.to_string(),
    };
    let pr_link = match record.pr_number {
        Some(n) => format!("https://github.com/{repo}/pull/{n}"),
        None => NOT_AVAILABLE.to_string(),
    };

    let fields = [
        opt_string(&record.pr_number),
        opt_string(&record.pr_title),
        opt_string(&record.pr_author),
        opt_string(&record.branch),
        model,
        cost,
        format_duration(record.duration_ms),
        opt_string(&record.num_turns),
        opt_string(&record.total_commits),
        opt_string(&record.changed_files),
        status_label(record.status).to_string(),
        format_timestamp(record.start_time.as_deref()),
        format_timestamp(record.end_time.as_deref()),
        pr_link,
    ];
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Write the CSV report: header row plus one row per record.
pub fn write_csv(
    records: &[ExecutionRecord],
    path: &Path,
    repo: &str,
) -> Result<(), ReportError> {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');
    for record in records {
        out.push_str(&csv_row(record, repo));
        out.push('\n');
    }
    std::fs::write(path, out).map_err(|e| ReportError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write the JSON output: a pretty-printed array of records.
pub fn write_json(records: &[ExecutionRecord], path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| ReportError::Serialize { source: e })?;
    std::fs::write(path, json).map_err(|e| ReportError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}
