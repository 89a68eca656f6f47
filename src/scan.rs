// Copyright 2026 Corpus Probe Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Directory scanning and file classification.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use tracing::debug;
use tracing::info;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::model::Category;
use crate::model::DocumentRecord;

#[derive(Debug, Default)]
pub struct ScanReport {
    pub records: Vec<DocumentRecord>,
    pub skipped_large: usize,
    pub skipped_short: usize,
    pub warnings: Vec<String>,
}

impl ScanReport {
    pub fn stats(&self) -> crate::output::StatsOut {
        crate::output::StatsOut {
            total_hits: self.records.len() as i64,
            skipped: Some((self.skipped_large + self.skipped_short) as i64),
            ..Default::default()
        }
    }
}

/// Scans the immediate entries of `root` and builds one record per accepted file.
///
/// Entries are grouped by the order of `config.extensions`, then sorted by
/// file name. A file that cannot be read is reported as a warning and skipped.
pub fn scan_directory(root: &Path, config: &ScanConfig) -> Result<ScanReport> {
    if !root.is_dir() {
        anyhow::bail!("scan root {} is not a directory", root.display());
    }
    let extension_set = build_extension_set(&config.extensions)?;
    let mut report = ScanReport::default();

    let mut candidates: Vec<(usize, PathBuf)> = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                report.warnings.push(format!("skipped entry: {err}"));
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let matched = extension_set.matches(entry.file_name()).into_iter().min();
        if let Some(idx) = matched {
            candidates.push((idx, entry.into_path()));
        }
    }
    candidates.sort_by_key(|(idx, _)| *idx);

    for (idx, path) in candidates {
        let file_type = &config.extensions[idx];
        let next_id = report.records.len() as i64 + 1;
        match read_candidate(&path, file_type, next_id, config) {
            Ok(Candidate::Accepted(record)) => report.records.push(record),
            Ok(Candidate::TooLarge(size)) => {
                debug!(path = %path.display(), size, "skipping large file");
                report.skipped_large += 1;
            }
            Ok(Candidate::TooShort) => {
                debug!(path = %path.display(), "skipping near-empty file");
                report.skipped_short += 1;
            }
            Ok(Candidate::NotAFile) => {
                debug!(path = %path.display(), "skipping non-file entry");
            }
            Err(err) => {
                let name = file_name(&path);
                let message = format!("{err:#}");
                warn!(file = %name, error = %message, "skipped file");
                report.warnings.push(format!("skipped {name}: {message}"));
            }
        }
    }

    info!(
        root = %root.display(),
        accepted = report.records.len(),
        skipped = report.skipped_large + report.skipped_short + report.warnings.len(),
        "scan complete"
    );
    Ok(report)
}

enum Candidate {
    Accepted(DocumentRecord),
    TooLarge(u64),
    TooShort,
    NotAFile,
}

fn read_candidate(
    path: &Path,
    file_type: &str,
    document_id: i64,
    config: &ScanConfig,
) -> Result<Candidate> {
    let metadata = std::fs::metadata(path).with_context(|| format!("metadata {}", path.display()))?;
    if !metadata.is_file() {
        return Ok(Candidate::NotAFile);
    }
    if metadata.len() > config.max_file_bytes {
        return Ok(Candidate::TooLarge(metadata.len()));
    }
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let content = decode_lossy(&bytes);
    if content.trim().chars().count() < config.min_text_chars {
        return Ok(Candidate::TooShort);
    }

    let title = file_name(path);
    let length = content.chars().count() as i64;
    let category = classify(&title, &content, config.code_prefix_chars);
    Ok(Candidate::Accepted(DocumentRecord {
        document_id,
        full_text: truncate_chars(&content, config.max_stored_chars).to_string(),
        file_path: path.to_string_lossy().into_owned(),
        file_type: file_type.to_string(),
        length,
        category,
        relevance_score: relevance_score(length, config),
        title,
    }))
}

fn build_extension_set(extensions: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        builder.add(Glob::new(&format!("*{ext}")).with_context(|| format!("extension {ext}"))?);
    }
    Ok(builder.build()?)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Decodes UTF-8, dropping invalid byte sequences instead of replacing them.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// First matching rule wins.
pub fn classify(file_name: &str, content: &str, code_prefix_chars: usize) -> Category {
    let name = file_name.to_lowercase();
    if name.contains(".py") || truncate_chars(content, code_prefix_chars).contains("import ") {
        Category::PythonCode
    } else if name.contains(".sql") || content.to_lowercase().contains("select") {
        Category::SqlScripts
    } else if name.contains(".md") || name.ends_with(".txt") {
        Category::Documentation
    } else if name.contains(".json") {
        Category::Configuration
    } else if name.contains(".ipynb") {
        Category::JupyterNotebook
    } else {
        Category::GeneralFiles
    }
}

/// Saturating linear score, `min(length / divisor, cap)`.
pub fn relevance_score(length: i64, config: &ScanConfig) -> f64 {
    (length.max(0) as f64 / config.relevance_divisor).min(config.relevance_cap)
}
