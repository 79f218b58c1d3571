/// GitHub collaborator: lists workflow runs and fetches per-run logs by
/// shelling out to the `gh` CLI.
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;

/// One row from `gh run list --json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub database_id: u64,
    #[serde(default)]
    pub display_title: String,
    #[serde(default)]
    pub head_branch: String,
    #[serde(default)]
    pub conclusion: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub number: u64,
}

/// Errors from the `gh` subprocess boundary.
#[derive(Debug)]
pub enum GithubError {
    /// Failed to spawn `gh` (not installed, not on PATH).
    Spawn { source: std::io::Error },
    /// `gh` exited nonzero.
    Status { code: Option<i32>, stderr: String },
    /// `gh` produced output we could not parse.
    Parse { source: serde_json::Error },
}

impl std::fmt::Display for GithubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GithubError::Spawn { source } => write!(f, "failed to spawn gh: {source}"),
            GithubError::Status { code, stderr } => {
                write!(f, "gh exited with status {:?}: {}", code, stderr.trim())
            }
            GithubError::Parse { source } => write!(f, "failed to parse gh output: {source}"),
        }
    }
}

impl std::error::Error for GithubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GithubError::Spawn { source } => Some(source),
            GithubError::Status { .. } => None,
            GithubError::Parse { source } => Some(source),
        }
    }
}

/// Run a command and capture stdout, treating a nonzero exit as an error.
async fn capture_stdout(program: &str, args: &[&str]) -> Result<String, GithubError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| GithubError::Spawn { source: e })?;

    if !output.status.success() {
        return Err(GithubError::Status {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// List workflow runs via `gh run list`, filtered to the last `days` days.
pub async fn list_runs(
    workflow: &str,
    limit: u32,
    days: i64,
    repo: &str,
) -> Result<Vec<RunInfo>, GithubError> {
    let limit_str = limit.to_string();
    let args = [
        "run",
        "list",
        "--workflow",
        workflow,
        "--limit",
        &limit_str,
        "--repo",
        repo,
        "--json",
        "databaseId,displayTitle,headBranch,conclusion,createdAt,number",
    ];
    tracing::debug!(workflow, repo, limit, "listing workflow runs");
    let stdout = capture_stdout("gh", &args).await?;

    let runs: Vec<RunInfo> =
        serde_json::from_str(&stdout).map_err(|e| GithubError::Parse { source: e })?;

    let cutoff = Utc::now() - Duration::days(days);
    Ok(filter_recent(runs, cutoff))
}

/// Keep runs created at or after the cutoff. Runs whose `createdAt` is
/// missing or unparseable are kept rather than dropped.
fn filter_recent(runs: Vec<RunInfo>, cutoff: DateTime<Utc>) -> Vec<RunInfo> {
    runs.into_iter()
        .filter(|run| {
            if run.created_at.is_empty() {
                return true;
            }
            match DateTime::parse_from_rfc3339(&run.created_at) {
                Ok(dt) => dt.with_timezone(&Utc) >= cutoff,
                Err(_) => true,
            }
        })
        .collect()
}

/// Fetch one run's full log via `gh run view --log`, split into lines.
pub async fn fetch_run_log(run_id: &str, repo: &str) -> Result<Vec<String>, GithubError> {
    let args = ["run", "view", run_id, "--log", "--repo", repo];
    let stdout = capture_stdout("gh", &args).await?;
    Ok(stdout.lines().map(|l| l.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_info_deserializes_gh_row() {
        let json = r#"[{
            "databaseId": 9876543210,
            "displayTitle": "Fix login flow (#451)",
            "headBranch": "feature/login",
            "conclusion": "success",
            "createdAt": "2025-12-17T23:50:00Z",
            "number": 77
        }]"#;
        let runs: Vec<RunInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].database_id, 9876543210);
        assert_eq!(runs[0].display_title, "Fix login flow (#451)");
        assert_eq!(runs[0].conclusion, "success");
    }

    #[test]
    fn run_info_missing_fields_default() {
        let json = r#"[{"databaseId": 1}]"#;
        let runs: Vec<RunInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(runs[0].conclusion, "");
        assert_eq!(runs[0].created_at, "");
    }

    fn run_created_at(created_at: &str) -> RunInfo {
        RunInfo {
            database_id: 1,
            display_title: String::new(),
            head_branch: String::new(),
            conclusion: String::new(),
            created_at: created_at.to_string(),
            number: 1,
        }
    }

    #[test]
    fn filter_keeps_recent_drops_old() {
        let cutoff = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        let runs = vec![
            run_created_at("2025-12-17T23:50:00Z"),
            run_created_at("2025-11-01T00:00:00Z"),
        ];
        let kept = filter_recent(runs, cutoff);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].created_at, "2025-12-17T23:50:00Z");
    }

    #[test]
    fn filter_keeps_unparseable_and_missing_dates() {
        let cutoff = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        let runs = vec![run_created_at("not a date"), run_created_at("")];
        assert_eq!(filter_recent(runs, cutoff).len(), 2);
    }

    #[test]
    fn filter_boundary_is_inclusive() {
        let cutoff = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        let runs = vec![run_created_at("2025-12-01T00:00:00Z")];
        assert_eq!(filter_recent(runs, cutoff).len(), 1);
    }

    #[tokio::test]
    async fn capture_stdout_success() {
        let out = capture_stdout("echo", &["hello"]).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn capture_stdout_nonzero_exit() {
        let err = capture_stdout("sh", &["-c", "echo oops >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            GithubError::Status { code, stderr } => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("oops"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn capture_stdout_spawn_failure() {
        let err = capture_stdout("nonexistent-binary-xyz", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GithubError::Spawn { .. }));
        assert!(err.to_string().contains("failed to spawn"));
    }
}
