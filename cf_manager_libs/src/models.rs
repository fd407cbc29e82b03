use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Participant,
    Spectator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Manager => write!(f, "manager"),
            Role::Participant => write!(f, "participant"),
            Role::Spectator => write!(f, "spectator"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    /// Role cells on the members page carry extra words ("Participant (pending)"),
    /// so this matches on the contained keyword.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if lower.contains("manager") {
            Ok(Role::Manager)
        } else if lower.contains("spectator") {
            Ok(Role::Spectator)
        } else if lower.contains("participant") {
            Ok(Role::Participant)
        } else {
            Err(format!("unknown group role: {}", s.trim()))
        }
    }
}

/// A row of the group members page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub username: String,
    pub role: Role,
    pub pending: bool,
    /// Hidden inputs of the row's action form (`csrf_token`, `groupRoleId`, `_tta`).
    pub form_fields: BTreeMap<String, String>,
}

impl Member {
    /// Role shown in listings: pending members are reported as `pending`
    /// regardless of the role they asked for.
    pub fn display_role(&self) -> String {
        if self.pending {
            String::from("pending")
        } else {
            self.role.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Accept,
    Reject,
}

impl fmt::Display for ConfirmAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfirmAction::Accept => write!(f, "accept"),
            ConfirmAction::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContestDigest {
    pub contest_id: u64,
    pub name: String,
    pub manager_mode: bool,
}

/// A row of the contest status (submission listing) page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionDigest {
    pub submission_id: u64,
    pub author: String,
    pub problem: String,
    pub language: String,
    pub verdict: String,
}

impl SubmissionDigest {
    pub fn is_accepted(&self) -> bool {
        self.verdict == "OK" || self.verdict.eq_ignore_ascii_case("accepted")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPage {
    pub submissions: Vec<SubmissionDigest>,
    pub last_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub contest_id: u64,
    pub submission_id: u64,
    pub problem: String,
    pub author: String,
    pub language: String,
    pub verdict: String,
    pub source: String,
}

/// Entry of the `submissions.csv` manifest written next to the crawled sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub contest_id: u64,
    pub submission_id: u64,
    pub problem: String,
    pub username: String,
    pub language: String,
    pub verdict: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub index: String,
    pub name: String,
}

impl Problem {
    /// Column label used in standings tables, e.g. `A(Watermelon)`.
    pub fn label(&self) -> String {
        format!("{}({})", self.index, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub handle: String,
    pub points: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Standings {
    pub problems: Vec<Problem>,
    pub rows: Vec<StandingsRow>,
}

/// Identity of an uploaded submission recovered from its file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionIdentity {
    pub contest_id: u64,
    pub submission_id: u64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchSide {
    pub identity: SubmissionIdentity,
    pub file_name: String,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub problem: String,
    pub first: MatchSide,
    pub second: MatchSide,
    pub lines: u32,
    pub url: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_role_from_cell_text() {
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!(
            " Participant (pending) ".parse::<Role>().unwrap(),
            Role::Participant
        );
        assert_eq!("SPECTATOR".parse::<Role>().unwrap(), Role::Spectator);
        assert!("Owner of everything".parse::<Role>().is_err());
    }

    #[test]
    fn pending_member_displays_as_pending() {
        let member = Member {
            username: String::from("alice"),
            role: Role::Participant,
            pending: true,
            form_fields: BTreeMap::new(),
        };
        assert_eq!(member.display_role(), "pending");
    }

    #[test]
    fn problem_label() {
        let problem = Problem {
            index: String::from("A"),
            name: String::from("Watermelon"),
        };
        assert_eq!(problem.label(), "A(Watermelon)");
    }

    #[test]
    fn verdict_accepted() {
        let mut digest = SubmissionDigest {
            submission_id: 1,
            author: String::from("alice"),
            problem: String::from("A"),
            language: String::from("GNU C++17"),
            verdict: String::from("OK"),
        };
        assert!(digest.is_accepted());
        digest.verdict = String::from("WRONG_ANSWER");
        assert!(!digest.is_accepted());
    }
}
