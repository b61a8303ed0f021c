//! Export the latest summary as a `summary.txt` attachment or JSON.
//!
//! Text export is the summary body verbatim. JSON export also carries the
//! results it was generated from, for archiving a briefing.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;

use crate::models::{ResultSet, SummaryRecord, SummaryStatus};

/// File name offered for the text attachment.
pub const SUMMARY_FILE_NAME: &str = "summary.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
}

impl ExportFormat {
    /// JSON for `*.json` paths, text otherwise.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Serialize)]
struct ExportData<'a> {
    exported_at: String,
    summary: &'a SummaryRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a ResultSet>,
}

/// Render the summary. Only generated summaries can be exported.
pub fn render_summary(
    record: Option<&SummaryRecord>,
    results: Option<&ResultSet>,
    format: ExportFormat,
) -> Result<String> {
    let Some(record) = record else {
        bail!("there is no summary to export");
    };
    if record.status == SummaryStatus::Failed {
        bail!("the last summary failed: {}", record.text);
    }

    match format {
        ExportFormat::Text => Ok(record.text.clone()),
        ExportFormat::Json => {
            let data = ExportData {
                exported_at: crate::period::format_rfc3339(chrono::Utc::now()),
                summary: record,
                results,
            };
            Ok(serde_json::to_string_pretty(&data)?)
        }
    }
}

/// Write rendered content to `output`, or stdout when `None`.
///
/// Parent directories are created as needed.
pub fn write_export(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
            eprintln!("Exported summary ({} bytes) to {}", content.len(), path.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
