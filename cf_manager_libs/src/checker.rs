use crate::crawler::read_manifest;
use crate::models::{MatchSide, SimilarityMatch, SubmissionIdentity, SubmissionRecord};
use crate::moss::{self, FileNameCodec, MossError, ReportScraper, SimilarityService, UploadFile};
use anyhow::{Context, Result};
use itertools::Itertools;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

static REPORT: Lazy<ReportScraper> = Lazy::new(ReportScraper::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub min_lines: u32,
    pub min_percent: u32,
}

impl Thresholds {
    pub fn keeps(&self, lines: u32, first_percent: u32, second_percent: u32) -> bool {
        lines >= self.min_lines
            && (first_percent >= self.min_percent || second_percent >= self.min_percent)
    }
}

/// MOSS language of the most common extension among `files`.
pub fn dominant_language(files: &[PathBuf]) -> &'static str {
    files
        .iter()
        .map(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or_default()
                .to_lowercase()
        })
        .counts()
        .into_iter()
        // ties go to the alphabetically first extension
        .max_by(|(a, x), (b, y)| x.cmp(y).then_with(|| b.cmp(a)))
        .map(|(ext, _)| moss::language_of(&ext))
        .unwrap_or("ascii")
}

/// Runs every problem directory of a crawl through the similarity service.
pub struct SimilarityChecker<'a, M: SimilarityService + Sync> {
    service: &'a M,
    codec: FileNameCodec,
    thresholds: Thresholds,
    contest_id: u64,
}

impl<'a, M: SimilarityService + Sync> SimilarityChecker<'a, M> {
    pub fn new(service: &'a M, codec: FileNameCodec, thresholds: Thresholds, contest_id: u64) -> Self {
        Self {
            service,
            codec,
            thresholds,
            contest_id,
        }
    }

    /// Checks each problem directory under `dir` holding at least two sources.
    ///
    /// When `dir` has a manifest, only the files it lists are sources.
    /// A problem that fails is logged and skipped. Only reading `dir` itself can fail.
    pub async fn check(&self, dir: &Path) -> Result<Vec<SimilarityMatch>> {
        let manifest: HashMap<String, SubmissionRecord> = read_manifest(dir)
            .await?
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();

        let mut problems: Vec<(String, PathBuf)> = Vec::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("failed to read {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                problems.push((name.to_string(), entry.path()));
            }
        }
        problems.sort();

        let mut matches = Vec::new();
        for (problem, path) in problems {
            let files = source_files(&path, &problem, &manifest).await?;
            if files.len() < 2 {
                tracing::info!("problem {} has {} file(s), skipped", problem, files.len());
                continue;
            }

            match self.check_problem(&problem, &files, &manifest).await {
                Ok(mut found) => {
                    tracing::info!("{} suspicious pairs in problem {}", found.len(), problem);
                    matches.append(&mut found);
                }
                Err(e) => tracing::error!("failed to check problem {}: {:?}", problem, e),
            }
        }

        Ok(matches)
    }

    fn identity_of(
        &self,
        problem: &str,
        file_name: &str,
        path: &Path,
        manifest: &HashMap<String, SubmissionRecord>,
    ) -> SubmissionIdentity {
        match manifest.get(&format!("{}/{}", problem, file_name)) {
            Some(record) => SubmissionIdentity {
                contest_id: record.contest_id,
                submission_id: record.submission_id,
                username: record.username.clone(),
            },
            None => SubmissionIdentity {
                contest_id: self.contest_id,
                submission_id: 0,
                username: path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_default(),
            },
        }
    }

    async fn check_problem(
        &self,
        problem: &str,
        files: &[PathBuf],
        manifest: &HashMap<String, SubmissionRecord>,
    ) -> Result<Vec<SimilarityMatch>> {
        let mut uploads = Vec::with_capacity(files.len());
        let mut local_names: HashMap<SubmissionIdentity, String> = HashMap::new();

        for path in files {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let identity = self.identity_of(problem, &file_name, path, manifest);
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("txt");

            let display_name = format!("{}/{}", problem, self.codec.encode(&identity, extension));
            if self.codec.decode(&display_name).as_ref() != Some(&identity) {
                tracing::warn!("{} can't be identified in a report, skipped", path.display());
                continue;
            }

            let content = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            local_names.insert(identity, file_name);
            uploads.push(UploadFile {
                display_name,
                content,
            });
        }

        if uploads.len() < 2 {
            tracing::info!("nothing to compare in problem {}", problem);
            return Ok(Vec::new());
        }

        let language = dominant_language(files);
        let comment = format!("contest {} problem {}", self.contest_id, problem);
        let url = self.service.submit(language, &uploads, &comment).await?;
        tracing::info!("report of problem {}: {}", problem, url);

        let html = self.service.fetch_report(&url).await?;
        let raw = REPORT
            .extract_matches(&html)
            .ok_or_else(|| MossError::ReportShape(url.clone()))?;

        let mut matches = Vec::new();
        for row in raw {
            if !self
                .thresholds
                .keeps(row.lines, row.first_percent, row.second_percent)
            {
                continue;
            }

            let (Some(first), Some(second)) = (
                self.codec.decode(&row.first_name),
                self.codec.decode(&row.second_name),
            ) else {
                tracing::warn!(
                    "unknown file names in report: {} / {}",
                    row.first_name,
                    row.second_name
                );
                continue;
            };

            matches.push(SimilarityMatch {
                problem: problem.to_string(),
                first: MatchSide {
                    file_name: local_names
                        .get(&first)
                        .cloned()
                        .unwrap_or_else(|| row.first_name.clone()),
                    identity: first,
                    percent: row.first_percent,
                },
                second: MatchSide {
                    file_name: local_names
                        .get(&second)
                        .cloned()
                        .unwrap_or_else(|| row.second_name.clone()),
                    identity: second,
                    percent: row.second_percent,
                },
                lines: row.lines,
                url: row.url,
            });
        }

        Ok(matches)
    }
}

/// Sorted source files of one problem directory. CSV exports are never sources.
async fn source_files(
    dir: &Path,
    problem: &str,
    manifest: &HashMap<String, SubmissionRecord>,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_csv = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        let file_name = entry.file_name().to_string_lossy().to_string();
        let listed =
            manifest.is_empty() || manifest.contains_key(&format!("{}/{}", problem, file_name));
        if !is_csv && listed {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
