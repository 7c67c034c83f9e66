//! Output file generation
//!
//! Writes the narration log and the final report. The report is either the
//! plain line-per-competitor text or a JSON array of result rows.

use anyhow::{Context, Result};
use biathlon_engine::ranking::result_rows;
use biathlon_engine::RaceOutcome;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Txt,
    Json,
}

/// Render the final report in the requested format
pub fn render_report(outcome: &RaceOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Txt => Ok(join_lines(&outcome.report_lines())),
        OutputFormat::Json => {
            let rows = result_rows(outcome.competitors());
            let mut json = serde_json::to_string_pretty(&rows).context("Failed to serialize report")?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Write lines to a file, one per line, creating parent directories
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    write_text(path, &join_lines(lines))
}

/// Write text to a file, creating parent directories
pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {:?}", dir))?;
    }

    let file = File::create(path).with_context(|| format!("Failed to create file {:?}", path))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(text.as_bytes())
        .with_context(|| format!("Error writing to file {:?}", path))?;
    writer
        .flush()
        .with_context(|| format!("Error flushing buffer to file {:?}", path))?;

    log::debug!("Wrote {} bytes to {:?}", text.len(), path);
    Ok(())
}

fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    text
}
