use crate::models::{SimilarityMatch, Standings, StandingsRow};
use serde::{Deserialize, Serialize};

/// One suspicious pair, as written to `plagiarism.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismRecord {
    pub problem: String,
    pub first_user: String,
    pub first_submission: u64,
    pub first_percent: u32,
    pub second_user: String,
    pub second_submission: u64,
    pub second_percent: u32,
    pub lines: u32,
    pub url: String,
}

impl From<&SimilarityMatch> for PlagiarismRecord {
    fn from(found: &SimilarityMatch) -> Self {
        Self {
            problem: found.problem.clone(),
            first_user: found.first.identity.username.clone(),
            first_submission: found.first.identity.submission_id,
            first_percent: found.first.percent,
            second_user: found.second.identity.username.clone(),
            second_submission: found.second.identity.submission_id,
            second_percent: found.second.percent,
            lines: found.lines,
            url: found.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub standings: Standings,
    pub pairs: Vec<PlagiarismRecord>,
}

fn has_handle(row: &StandingsRow, username: &str) -> bool {
    row.handle
        .split(',')
        .any(|handle| handle.trim().eq_ignore_ascii_case(username))
}

/// Applies similarity matches to a standings table.
///
/// With `new_score` set, both cells of every match (the author's row, the problem's
/// column) get that score; other cells and the row order stay as they are.
pub fn correlate(
    standings: &Standings,
    matches: &[SimilarityMatch],
    new_score: Option<f64>,
) -> Correlation {
    let mut adjusted = standings.clone();

    if let Some(score) = new_score {
        for found in matches {
            let Some(column) = standings
                .problems
                .iter()
                .position(|problem| problem.index == found.problem)
            else {
                tracing::warn!("problem {} is not in the standings", found.problem);
                continue;
            };

            for side in [&found.first, &found.second] {
                let mut flagged = false;
                for row in adjusted
                    .rows
                    .iter_mut()
                    .filter(|row| has_handle(row, &side.identity.username))
                {
                    if let Some(cell) = row.points.get_mut(column) {
                        *cell = score;
                        flagged = true;
                    }
                }
                if !flagged {
                    tracing::warn!(
                        "{} is not in the standings, problem {} left as is",
                        side.identity.username,
                        found.problem
                    );
                }
            }
        }
    }

    Correlation {
        standings: adjusted,
        pairs: matches.iter().map(PlagiarismRecord::from).collect(),
    }
}
