use crate::models::Member;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

/// Username format filter.
///
/// A username passes when the pattern matches at its beginning; the pattern is
/// not implicitly anchored at the end, so `^2023` and `2023` behave the same.
#[derive(Debug, Clone)]
pub struct UserFilter {
    pattern: Regex,
}

impl UserFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern =
            Regex::new(pattern).with_context(|| format!("invalid user format `{}`", pattern))?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, username: &str) -> bool {
        self.pattern
            .find(username)
            .map(|m| m.start() == 0)
            .unwrap_or(false)
    }

    pub fn filter_members(&self, members: Vec<Member>) -> Vec<Member> {
        members
            .into_iter()
            .filter(|member| self.matches(&member.username))
            .collect()
    }
}

/// Optional filter helper: `None` lets everything through.
pub fn passes(filter: Option<&UserFilter>, username: &str) -> bool {
    filter.map(|f| f.matches(username)).unwrap_or(true)
}

/// Reads a list of usernames from a CSV file.
///
/// Uses the `username` column when the header has one, otherwise the first column of
/// every record (the first line included, as the file is then headerless).
pub async fn read_username_list(path: &Path) -> Result<HashSet<String>> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_slice());

    let mut records = reader.records();
    let first = match records.next() {
        Some(record) => record?,
        None => return Ok(HashSet::new()),
    };

    let mut usernames = HashSet::new();
    let column = match first.iter().position(|field| field.trim() == "username") {
        Some(column) => column,
        None => {
            if let Some(name) = first.get(0) {
                usernames.insert(name.trim().to_string());
            }
            0
        }
    };

    for record in records {
        let record = record?;
        if let Some(name) = record.get(column) {
            let name = name.trim();
            if !name.is_empty() {
                usernames.insert(name.to_string());
            }
        }
    }

    Ok(usernames)
}

pub fn retain_listed(members: Vec<Member>, usernames: &HashSet<String>) -> Vec<Member> {
    members
        .into_iter()
        .filter(|member| usernames.contains(&member.username))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::Role;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn member(username: &str) -> Member {
        Member {
            username: String::from(username),
            role: Role::Participant,
            pending: false,
            form_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn matches_from_the_beginning_only() {
        let filter = UserFilter::new(r"2023\d+").unwrap();
        assert!(filter.matches("20231234"));
        assert!(filter.matches("20231234_extra"));
        assert!(!filter.matches("x20231234"));
        assert!(!filter.matches("alice"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(UserFilter::new("(unclosed").is_err());
    }

    #[test]
    fn filtering_is_idempotent() {
        let filter = UserFilter::new("s[0-9]").unwrap();
        let members = vec![
            member("s1alice"),
            member("bob"),
            member("s2carol"),
            member("xs3dave"),
        ];

        let once = filter.filter_members(members);
        let twice = filter.filter_members(once.clone());
        assert_eq!(once, twice);
        let names: Vec<&str> = once.iter().map(|m| m.username.as_str()).collect();
        assert_eq!(names, vec!["s1alice", "s2carol"]);
    }

    #[test]
    fn no_filter_passes_everything() {
        assert!(passes(None, "anyone"));
        let filter = UserFilter::new("a").unwrap();
        assert!(!passes(Some(&filter), "bob"));
    }

    #[tokio::test]
    async fn read_usernames_with_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,username").unwrap();
        writeln!(file, "1,alice").unwrap();
        writeln!(file, "2,bob").unwrap();

        let usernames = read_username_list(file.path()).await.unwrap();
        assert_eq!(
            usernames,
            HashSet::from([String::from("alice"), String::from("bob")])
        );
    }

    #[tokio::test]
    async fn read_usernames_without_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alice,Alice Liddell").unwrap();
        writeln!(file, "bob,Bob").unwrap();

        let usernames = read_username_list(file.path()).await.unwrap();
        assert_eq!(
            usernames,
            HashSet::from([String::from("alice"), String::from("bob")])
        );

        let kept = retain_listed(vec![member("alice"), member("carol")], &usernames);
        assert_eq!(kept, vec![member("alice")]);
    }
}
