//! Keyword-based sorting scan.
//!
//! Walks the same trees as the indexer, under the same counting policy, and
//! files every document under the first keyword found in its name or text.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::traits::TextExtractor;
use crate::types::ScanProgress;
use crate::walk::{collect_files, display_name, normalize_path, WalkRules};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMatch {
    pub path: String,
    pub name: String,
    pub size: u64,
    /// Whether the keyword was found in the file name (otherwise in the text).
    pub in_name: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordScanReport {
    pub total_files: usize,
    pub files_processed: usize,
    /// Files whose text could not be extracted; matched on name only.
    pub files_failed: usize,
    pub matches: BTreeMap<String, Vec<FileMatch>>,
}

impl KeywordScanReport {
    pub fn matched_files(&self) -> usize {
        self.matches.values().map(Vec::len).sum()
    }
}

pub struct KeywordScan<'a> {
    keywords: Vec<String>,
    rules: &'a WalkRules,
    extractor: &'a dyn TextExtractor,
    progress_every: usize,
}

impl<'a> KeywordScan<'a> {
    pub fn new(keywords: &[String], rules: &'a WalkRules, extractor: &'a dyn TextExtractor) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords, rules, extractor, progress_every: 5 }
    }

    pub fn progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Blocking. `on_progress` sees `0/N`, every `progress_every` files, and a
    /// final `complete` update.
    pub fn run<F>(&self, directories: &[PathBuf], mut on_progress: F) -> KeywordScanReport
    where
        F: FnMut(ScanProgress),
    {
        let files = collect_files(directories, self.rules);
        let total = files.len();
        let mut report = KeywordScanReport { total_files: total, ..Default::default() };
        on_progress(ScanProgress::indexing(0, total));

        for (i, entry) in files.iter().enumerate() {
            let name = display_name(&entry.path);
            let lowered_name = name.to_lowercase();
            let hit = match self.keywords.iter().find(|k| lowered_name.contains(k.as_str())) {
                Some(k) => Some((k.clone(), true)),
                None => match self.extractor.extract(&entry.path) {
                    Ok(text) => {
                        let text = text.to_lowercase();
                        self.keywords.iter().find(|k| text.contains(k.as_str())).map(|k| (k.clone(), false))
                    }
                    Err(err) => {
                        // still counts as processed
                        warn!(path = %entry.path.display(), error = %err, "skipping unreadable file");
                        report.files_failed += 1;
                        None
                    }
                },
            };
            if let Some((keyword, in_name)) = hit {
                debug!(path = %entry.path.display(), %keyword, "keyword match");
                report.matches.entry(keyword).or_default().push(FileMatch {
                    path: normalize_path(&entry.path),
                    name,
                    size: entry.size,
                    in_name,
                });
            }
            report.files_processed = i + 1;
            if report.files_processed % self.progress_every == 0 && report.files_processed < total {
                on_progress(ScanProgress::indexing(report.files_processed, total));
            }
        }

        on_progress(ScanProgress::complete(total));
        info!(total, matched = report.matched_files(), failed = report.files_failed, "keyword scan finished");
        report
    }
}
