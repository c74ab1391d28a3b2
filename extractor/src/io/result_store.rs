//! Persistence of per-file extraction results and the batch summary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::types::FileResult;

/// File name of the batch-level summary inside the output directory.
pub const BATCH_SUMMARY_FILE: &str = "batch_summary.json";

const PROCESSED_SUFFIX: &str = "_processed.json";

/// One input file the batch could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub file: String,
    pub error: String,
}

/// Counts and failures of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub failures: Vec<FileFailure>,
}

/// `<output_dir>/<stem>_processed.json` for an input file name.
pub fn output_path_for(output_dir: &Path, filename: &str) -> PathBuf {
    let stem = filename.strip_suffix(".json").unwrap_or(filename);
    output_dir.join(format!("{stem}{PROCESSED_SUFFIX}"))
}

/// Write a file result atomically and return where it landed.
pub fn write_result(output_dir: &Path, result: &FileResult) -> Result<PathBuf> {
    let path = output_path_for(output_dir, &result.filename);
    write_json_atomic(&path, result)
        .with_context(|| format!("write result for {}", result.filename))?;
    Ok(path)
}

pub fn load_result(path: &Path) -> Result<FileResult> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse result {}", path.display()))
}

pub fn write_batch_summary(output_dir: &Path, summary: &BatchSummary) -> Result<PathBuf> {
    let path = output_dir.join(BATCH_SUMMARY_FILE);
    write_json_atomic(&path, summary)?;
    Ok(path)
}

/// Pretty JSON (non-ASCII kept) with trailing newline, via temp file + rename.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
