use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::{Amount, FundingRecord, RunOutput};

pub const DEFAULT_OUTPUT_DIR: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One pretty-printed JSON array per file
    #[default]
    Json,
    /// One JSON object per line
    Jsonl,
}

impl OutputFormat {
    fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

/// One included posting joined with the funding record of its company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRow {
    pub company: String,
    pub title: String,
    pub location: Option<String>,
    pub department: Option<String>,
    pub url: String,
    pub platform: String,
    pub match_reason: String,
    pub amount: Option<Amount>,
    pub round: Option<String>,
    pub investors: Vec<String>,
    pub funding_location: Option<String>,
    pub source_document_id: Option<String>,
}

/// Paths written by `save_output`
#[derive(Debug, Clone)]
pub struct SavedFiles {
    pub fundings: PathBuf,
    pub jobs: PathBuf,
    pub combined: PathBuf,
    pub report: PathBuf,
}

/// Join every included posting with the first funding record of its company.
pub fn combine(output: &RunOutput) -> Vec<CombinedRow> {
    let mut by_company: HashMap<String, &FundingRecord> = HashMap::new();
    for record in &output.funding_records {
        by_company
            .entry(record.company_name.trim().to_lowercase())
            .or_insert(record);
    }

    output
        .postings
        .iter()
        .map(|filtered| {
            let posting = &filtered.posting;
            let funding = by_company.get(&posting.company_name.trim().to_lowercase());
            CombinedRow {
                company: posting.company_name.clone(),
                title: posting.title.clone(),
                location: posting.location.clone(),
                department: posting.department.clone(),
                url: posting.url.clone(),
                platform: posting.source_platform.to_string(),
                match_reason: filtered.match_reason.to_string(),
                amount: funding.and_then(|f| f.amount.clone()),
                round: funding.and_then(|f| f.round.clone()),
                investors: funding.map(|f| f.investors.clone()).unwrap_or_default(),
                funding_location: funding.and_then(|f| f.location.clone()),
                source_document_id: funding.map(|f| f.source_document_id.clone()),
            }
        })
        .collect()
}

/// Write fundings, jobs, combined rows and the run report under `dir`.
pub fn save_output(dir: &Path, output: &RunOutput, format: OutputFormat, date: NaiveDate) -> Result<SavedFiles> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let file_name = |stem: &str| dir.join(format!("{}_{}.{}", stem, date.format("%Y-%m-%d"), format.extension()));
    let saved = SavedFiles {
        fundings: file_name("fundings"),
        jobs: file_name("jobs"),
        combined: file_name("combined"),
        report: dir.join(format!("report_{}.json", date.format("%Y-%m-%d"))),
    };

    write_rows(&saved.fundings, &output.funding_records, format)?;
    write_rows(&saved.jobs, &output.postings, format)?;
    write_rows(&saved.combined, &combine(output), format)?;

    let report = serde_json::to_string_pretty(&output.report).context("Failed to serialize run report")?;
    fs::write(&saved.report, report).with_context(|| format!("Failed to write report to {:?}", saved.report))?;

    tracing::info!(dir = %dir.display(), "Output saved");
    Ok(saved)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(path, rows),
        OutputFormat::Jsonl => write_jsonl(path, rows),
    }
}

pub fn write_json<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let mut writer = BufWriter::new(file);
    for row in rows {
        let line = serde_json::to_string(row).context("Failed to serialize row")?;
        writeln!(writer, "{}", line).context("Failed to write row")?;
    }

    writer.flush()?;
    Ok(())
}
