//! Batch processing of every transcript in an input directory.
//!
//! Each file gets its own extraction state. A file that fails to load, extract
//! or persist is recorded in the batch summary and the batch moves on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{error, info, instrument, warn};

use crate::extract::{FileExtraction, WindowController};
use crate::io::oracle::Oracle;
use crate::io::result_store::{BatchSummary, FileFailure, write_batch_summary, write_result};
use crate::io::transcript::{list_transcripts, load_transcript};

/// A processed file and where its record was written.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub output_path: PathBuf,
    pub extraction: FileExtraction,
}

/// Outcome of a batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub summary_path: PathBuf,
    pub written: Vec<PathBuf>,
}

impl BatchReport {
    /// At least one file failed.
    pub fn is_partial(&self) -> bool {
        self.summary.failed_files > 0
    }
}

/// Load, extract and persist a single transcript.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn process_file<O: Oracle + ?Sized>(
    controller: &WindowController<'_, O>,
    path: &Path,
    output_dir: &Path,
) -> Result<ProcessedFile> {
    let filename = file_name(path)?;
    let turns = load_transcript(path)?;
    let extraction = controller
        .extract_file(&filename, &turns)
        .with_context(|| format!("extract {filename}"))?;
    let output_path = write_result(output_dir, &extraction.result)?;
    info!(output = %output_path.display(), qa_count = extraction.result.qa_count, "result saved");
    Ok(ProcessedFile {
        output_path,
        extraction,
    })
}

/// Process every `*.json` transcript in `input_dir` in file-name order.
///
/// Only an unreadable input directory or an unwritable batch summary is an
/// error; per-file faults end up in [`BatchSummary::failures`].
#[instrument(skip_all, fields(input = %input_dir.display(), output = %output_dir.display()))]
pub fn run_batch<O: Oracle + ?Sized>(
    controller: &WindowController<'_, O>,
    input_dir: &Path,
    output_dir: &Path,
) -> Result<BatchReport> {
    let inputs = list_transcripts(input_dir)?;
    if inputs.is_empty() {
        warn!("no transcripts found");
    }
    info!(files = inputs.len(), "starting batch");

    let mut summary = BatchSummary {
        total_files: inputs.len(),
        ..BatchSummary::default()
    };
    let mut written = Vec::new();

    for path in &inputs {
        match process_file(controller, path, output_dir) {
            Ok(processed) => {
                summary.processed_files += 1;
                written.push(processed.output_path);
            }
            Err(err) => {
                let file = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                error!(file = %file, err = %format!("{err:#}"), "file failed");
                summary.failed_files += 1;
                summary.failures.push(FileFailure {
                    file,
                    error: format!("{err:#}"),
                });
            }
        }
    }

    let summary_path = write_batch_summary(output_dir, &summary)?;
    info!(
        processed = summary.processed_files,
        failed = summary.failed_files,
        "batch finished"
    );
    Ok(BatchReport {
        summary,
        summary_path,
        written,
    })
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("input path has no file name: {}", path.display()))
}
