//! Loading turn-structured transcripts from disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::types::Turn;

/// Read one transcript: a JSON array of `{speaker, content}` objects.
///
/// Extra fields on a turn are ignored; a missing field or a non-array document
/// is an error for the whole file.
pub fn load_transcript(path: &Path) -> Result<Vec<Turn>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let turns: Vec<Turn> = serde_json::from_str(&raw)
        .with_context(|| format!("parse transcript {}", path.display()))?;
    Ok(turns)
}

/// Every `*.json` file directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into.
pub fn list_transcripts(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read input directory {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        let path = entry.path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
