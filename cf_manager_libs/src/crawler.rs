use crate::filter::{self, UserFilter};
use crate::models::{Submission, SubmissionRecord};
use crate::site::ContestSite;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "submissions.csv";

/// File extension for a language name as shown in the status table.
pub fn extension_of(language: &str) -> &'static str {
    let language = language.to_lowercase();
    if language.contains("c++") || language.contains("g++") {
        "cpp"
    } else if language.contains("pascal") || language.contains("delphi") {
        "pas"
    } else if language.contains("c#") || language.contains("mono") || language.contains(".net") {
        "cs"
    } else if language.contains("python") || language.contains("pypy") {
        "py"
    } else if language.contains("kotlin") {
        "kt"
    } else if language.contains("java") && !language.contains("javascript") {
        "java"
    } else if language.contains("javascript") || language.contains("node.js") {
        "js"
    } else if language.contains("rust") {
        "rs"
    } else if language.contains("go") {
        "go"
    } else if language.starts_with("gnu c") || language.contains(" c1") || language == "c" {
        "c"
    } else {
        "txt"
    }
}

/// Downloads the sources of a contest into `<dest>/<problem>/<username>.<ext>`.
pub struct SubmissionCrawler<'a, S: ContestSite + Sync> {
    site: &'a S,
    group_id: String,
    contest_id: u64,
    filter: Option<UserFilter>,
    accepted_only: bool,
}

impl<'a, S: ContestSite + Sync> SubmissionCrawler<'a, S> {
    pub fn new(site: &'a S, group_id: &str, contest_id: u64) -> Self {
        Self {
            site,
            group_id: group_id.to_string(),
            contest_id,
            filter: None,
            accepted_only: true,
        }
    }

    pub fn filter(mut self, filter: Option<UserFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn accepted_only(mut self, accepted_only: bool) -> Self {
        self.accepted_only = accepted_only;
        self
    }

    /// Walks every status page and fetches the source of each wanted submission.
    ///
    /// The listing is ordered from the newest submission, so only the latest one of
    /// each (problem, author) pair is kept. Any failed request aborts the crawl.
    pub async fn crawl(&self) -> Result<Vec<Submission>> {
        tracing::info!(
            "Start to crawl submissions of contest {} in group {}",
            self.contest_id,
            self.group_id
        );

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut submissions = Vec::new();
        let mut page = 1;

        loop {
            let listing = self
                .site
                .fetch_submission_page(&self.group_id, self.contest_id, page)
                .await
                .with_context(|| format!("failed to fetch status page {}", page))?;
            tracing::info!(
                "Crawl status page {}/{} ({} submissions)",
                page,
                listing.last_page,
                listing.submissions.len()
            );

            for digest in listing.submissions {
                if self.accepted_only && !digest.is_accepted() {
                    continue;
                }
                if !filter::passes(self.filter.as_ref(), &digest.author) {
                    continue;
                }
                if !seen.insert((digest.problem.clone(), digest.author.clone())) {
                    continue;
                }

                let source = self
                    .site
                    .fetch_source(&self.group_id, self.contest_id, digest.submission_id)
                    .await
                    .with_context(|| {
                        format!("failed to fetch submission {}", digest.submission_id)
                    })?;
                tracing::debug!(
                    "fetched submission {} of {} for problem {}",
                    digest.submission_id,
                    digest.author,
                    digest.problem
                );

                submissions.push(Submission {
                    contest_id: self.contest_id,
                    submission_id: digest.submission_id,
                    problem: digest.problem,
                    author: digest.author,
                    language: digest.language,
                    verdict: digest.verdict,
                    source,
                });
            }

            if page >= listing.last_page {
                break;
            }
            page += 1;
        }

        tracing::info!("{} submissions crawled.", submissions.len());
        Ok(submissions)
    }

    /// Writes the sources and the manifest under `dest`.
    pub async fn save(
        &self,
        submissions: &[Submission],
        dest: &Path,
    ) -> Result<Vec<SubmissionRecord>> {
        let mut records = Vec::with_capacity(submissions.len());

        for submission in submissions.iter() {
            let relative: PathBuf = Path::new(&submission.problem).join(format!(
                "{}.{}",
                submission.author,
                extension_of(&submission.language)
            ));
            let path = dest.join(&relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            tokio::fs::write(&path, &submission.source)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;

            records.push(SubmissionRecord {
                contest_id: submission.contest_id,
                submission_id: submission.submission_id,
                problem: submission.problem.clone(),
                username: submission.author.clone(),
                language: submission.language.clone(),
                verdict: submission.verdict.clone(),
                path: relative.to_string_lossy().replace('\\', "/"),
            });
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in records.iter() {
            writer.serialize(record)?;
        }
        writer.flush()?;

        tokio::fs::create_dir_all(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;
        let manifest = dest.join(MANIFEST_FILE);
        tokio::fs::write(&manifest, writer.get_ref())
            .await
            .with_context(|| format!("failed to write {}", manifest.display()))?;

        tracing::info!("{} sources saved under {}", records.len(), dest.display());
        Ok(records)
    }

    pub async fn run(&self, dest: &Path) -> Result<Vec<SubmissionRecord>> {
        let submissions = self.crawl().await?;
        self.save(&submissions, dest).await
    }
}

/// Reads the manifest written by [`SubmissionCrawler::save`], if there is one.
pub async fn read_manifest(dir: &Path) -> Result<Vec<SubmissionRecord>> {
    let path = dir.join(MANIFEST_FILE);
    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("failed to open {}", path.display())),
    };

    let mut reader = csv::Reader::from_reader(content.as_slice());
    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<SubmissionRecord>, csv::Error>>()
        .with_context(|| format!("failed to read {}", path.display()))?;

    Ok(records)
}
