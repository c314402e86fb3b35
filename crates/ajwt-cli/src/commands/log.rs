//! Log command: check an exported execution log offline.

use std::path::Path;

use ajwt_execlog::{ExecutionLogEntry, LogAnchor, LogIssue, audit_entries};
use anyhow::{Context, bail};
use serde::Deserialize;

use crate::theme::Theme;

/// An exported instance log: either a bare entry array or entries plus the
/// anchor recorded for the instance.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LogExport {
    Anchored {
        entries: Vec<ExecutionLogEntry>,
        #[serde(default)]
        anchor: Option<LogAnchor>,
    },
    Bare(Vec<ExecutionLogEntry>),
}

impl LogExport {
    fn into_parts(self) -> (Vec<ExecutionLogEntry>, Option<LogAnchor>) {
        match self {
            Self::Anchored { entries, anchor } => (entries, anchor),
            Self::Bare(entries) => (entries, None),
        }
    }
}

/// Parse an export and list every inconsistency in it.
pub(crate) fn audit(json: &str) -> anyhow::Result<(usize, Vec<LogIssue>)> {
    let export: LogExport =
        serde_json::from_str(json).context("file is not an exported execution log")?;
    let (entries, anchor) = export.into_parts();
    Ok((entries.len(), audit_entries(&entries, anchor)))
}

/// Verify the exported log at `path`. Fails if any entry is inconsistent.
pub(crate) fn verify(path: &Path, json: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let (count, issues) = audit(&raw)?;

    if json {
        let out = serde_json::json!({
            "entries": count,
            "intact": issues.is_empty(),
            "issues": issues,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if issues.is_empty() {
        println!(
            "{}",
            Theme::success(&format!("{count} entries, hash chain intact"))
        );
    } else {
        println!("{}", Theme::header("Execution log"));
        println!("{}", Theme::field("Entries", &count.to_string()));
        for issue in &issues {
            println!(
                "{}",
                Theme::rejected(&format!("entry {}: {}", issue.sequence_no(), issue.describe()))
            );
        }
    }

    if !issues.is_empty() {
        bail!("execution log failed verification with {} issue(s)", issues.len());
    }
    Ok(())
}
