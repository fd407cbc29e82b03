use crate::models::{ConfirmAction, ContestDigest, Member, Role, Standings, SubmissionPage};
use crate::scraper::{
    ContestsPageScraper, MembersPageScraper, StandingsPageScraper, StatusPageScraper,
};
use crate::session::{CfSession, SessionError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use thiserror::Error;
use tokio::time::{self, Duration};

type Result<T> = std::result::Result<T, SiteError>;

static MEMBERS: Lazy<MembersPageScraper> = Lazy::new(MembersPageScraper::new);
static CONTESTS: Lazy<ContestsPageScraper> = Lazy::new(ContestsPageScraper::new);
static STATUS: Lazy<StatusPageScraper> = Lazy::new(StatusPageScraper::new);
static STANDINGS: Lazy<StandingsPageScraper> = Lazy::new(StandingsPageScraper::new);

#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    SessionError(#[from] SessionError),
    #[error("unexpected page shape: {0}")]
    MarkupError(String),
}

/// Everything the tool needs from the contest site.
///
/// Only implementations of this trait know about page markup.
#[async_trait]
pub trait ContestSite {
    async fn fetch_members(&self, group_id: &str) -> Result<Vec<Member>>;
    async fn fetch_contests(&self, group_id: &str) -> Result<Vec<ContestDigest>>;
    async fn fetch_contest_name(&self, group_id: &str, contest_id: u64) -> Result<String>;
    async fn fetch_submission_page(
        &self,
        group_id: &str,
        contest_id: u64,
        page: u32,
    ) -> Result<SubmissionPage>;
    async fn fetch_source(&self, group_id: &str, contest_id: u64, submission_id: u64)
        -> Result<String>;
    async fn fetch_standings(&self, group_id: &str, contest_id: u64) -> Result<Standings>;
    /// Standings of a public contest, outside of any group.
    async fn fetch_common_standings(&self, contest_id: u64) -> Result<Standings>;
    async fn confirm_member(
        &self,
        group_id: &str,
        member: &Member,
        action: ConfirmAction,
    ) -> Result<()>;
    async fn remove_member(&self, group_id: &str, member: &Member) -> Result<()>;
    async fn set_manager_mode(&self, group_id: &str, contest_id: u64, enabled: bool)
        -> Result<()>;

    /// Whether `username` is a confirmed manager of the group.
    async fn is_manager(&self, group_id: &str, username: &str) -> Result<bool> {
        let members = self.fetch_members(group_id).await?;
        Ok(members.iter().any(|member| {
            member.username.eq_ignore_ascii_case(username)
                && member.role == Role::Manager
                && !member.pending
        }))
    }
}

pub struct CodeforcesSite {
    session: CfSession,
    interval: Duration,
}

impl CodeforcesSite {
    pub fn new(session: CfSession, interval: Duration) -> Self {
        Self { session, interval }
    }

    /// Hidden fields of a member row plus the session's token, ready to post.
    fn member_form(&self, member: &Member) -> Vec<(String, String)> {
        let mut fields = member.form_fields.clone();
        if let Some(token) = self.session.csrf_token() {
            fields
                .entry(String::from("csrf_token"))
                .or_insert_with(|| token.to_string());
        }
        fields
            .entry(String::from("_tta"))
            .or_insert_with(|| self.session.tta().to_string());
        fields.into_iter().collect()
    }

    fn base_form(&self) -> Vec<(String, String)> {
        vec![
            (
                String::from("csrf_token"),
                self.session.csrf_token().unwrap_or_default().to_string(),
            ),
            (String::from("_tta"), self.session.tta().to_string()),
        ]
    }

    async fn get(&self, path: &str) -> Result<String> {
        let html = self.session.get(path).await?;
        time::sleep(self.interval).await;
        Ok(html)
    }

    async fn post(&self, path: &str, fields: &[(String, String)]) -> Result<String> {
        let html = self.session.post_form(path, fields).await?;
        time::sleep(self.interval).await;
        Ok(html)
    }

    /// Reads `<contest_path>/standings/page/<n>` until the last page and merges them.
    async fn standings_pages(&self, contest_path: &str, contest_id: u64) -> Result<Standings> {
        let mut standings = Standings::default();
        let mut page = 1;

        loop {
            let html = self
                .get(&format!("{}/standings/page/{}", contest_path, page))
                .await?;
            let (mut chunk, last_page) = STANDINGS.extract_standings(&html).ok_or_else(|| {
                SiteError::MarkupError(format!(
                    "standings table of contest {} not found on page {}",
                    contest_id, page
                ))
            })?;

            if standings.problems.is_empty() {
                standings.problems = chunk.problems;
            }
            standings.rows.append(&mut chunk.rows);

            if page >= last_page {
                break;
            }
            page += 1;
        }

        tracing::info!(
            "{} rows found in the standings of contest {}",
            standings.rows.len(),
            contest_id
        );
        Ok(standings)
    }
}

#[async_trait]
impl ContestSite for CodeforcesSite {
    async fn fetch_members(&self, group_id: &str) -> Result<Vec<Member>> {
        let html = self.get(&format!("group/{}/members", group_id)).await?;
        let members = MEMBERS.extract_members(&html);
        tracing::info!("{} members found in group {}", members.len(), group_id);
        Ok(members)
    }

    async fn fetch_contests(&self, group_id: &str) -> Result<Vec<ContestDigest>> {
        let html = self.get(&format!("group/{}/contests", group_id)).await?;
        Ok(CONTESTS.extract_contests(&html))
    }

    async fn fetch_contest_name(&self, group_id: &str, contest_id: u64) -> Result<String> {
        let html = self
            .get(&format!("group/{}/contest/{}", group_id, contest_id))
            .await?;
        CONTESTS.extract_contest_name(&html).ok_or_else(|| {
            SiteError::MarkupError(format!("name of contest {} not found", contest_id))
        })
    }

    async fn fetch_submission_page(
        &self,
        group_id: &str,
        contest_id: u64,
        page: u32,
    ) -> Result<SubmissionPage> {
        let html = self
            .get(&format!(
                "group/{}/contest/{}/status/page/{}?order=BY_ARRIVED_DESC",
                group_id, contest_id, page
            ))
            .await?;
        Ok(STATUS.extract_submissions(&html))
    }

    async fn fetch_source(
        &self,
        group_id: &str,
        contest_id: u64,
        submission_id: u64,
    ) -> Result<String> {
        let html = self
            .get(&format!(
                "group/{}/contest/{}/submission/{}",
                group_id, contest_id, submission_id
            ))
            .await?;
        STATUS.extract_source(&html).ok_or_else(|| {
            SiteError::MarkupError(format!("source of submission {} not found", submission_id))
        })
    }

    async fn fetch_standings(&self, group_id: &str, contest_id: u64) -> Result<Standings> {
        self.standings_pages(&format!("group/{}/contest/{}", group_id, contest_id), contest_id)
            .await
    }

    async fn fetch_common_standings(&self, contest_id: u64) -> Result<Standings> {
        self.standings_pages(&format!("contest/{}", contest_id), contest_id)
            .await
    }

    async fn confirm_member(
        &self,
        group_id: &str,
        member: &Member,
        action: ConfirmAction,
    ) -> Result<()> {
        let mut fields = self.member_form(member);
        fields.push((String::from("action"), String::from("confirm")));
        fields.push((
            String::from("confirmed"),
            (action == ConfirmAction::Accept).to_string(),
        ));

        self.post(&format!("group/{}/members", group_id), &fields)
            .await?;
        tracing::info!("{} {}ed", member.username, action);
        Ok(())
    }

    async fn remove_member(&self, group_id: &str, member: &Member) -> Result<()> {
        let mut fields = self.member_form(member);
        fields.push((String::from("action"), String::from("removeMember")));

        self.post(&format!("group/{}/members", group_id), &fields)
            .await?;
        tracing::info!("{} removed", member.username);
        Ok(())
    }

    async fn set_manager_mode(
        &self,
        group_id: &str,
        contest_id: u64,
        enabled: bool,
    ) -> Result<()> {
        let mut fields = self.base_form();
        fields.push((String::from("action"), String::from("setManagerMode")));
        fields.push((String::from("contestId"), contest_id.to_string()));
        fields.push((String::from("managerMode"), enabled.to_string()));

        self.post(&format!("group/{}/contests", group_id), &fields)
            .await?;
        tracing::info!(
            "manager mode of contest {} set to {}",
            contest_id,
            enabled
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn member_form_keeps_row_fields() {
        let site = CodeforcesSite::new(
            CfSession::new("https://codeforces.com").unwrap(),
            Duration::from_millis(0),
        );
        let member = Member {
            username: String::from("bob"),
            role: Role::Participant,
            pending: true,
            form_fields: BTreeMap::from([
                (String::from("csrf_token"), String::from("row-token")),
                (String::from("groupRoleId"), String::from("13")),
            ]),
        };

        let fields = site.member_form(&member);
        assert!(fields.contains(&(String::from("csrf_token"), String::from("row-token"))));
        assert!(fields.contains(&(String::from("groupRoleId"), String::from("13"))));
        assert!(fields.iter().any(|(key, _)| key == "_tta"));
    }

    /// Reads the members of a real group with a saved session.
    ///
    /// Set `CF_SESSION` to a session file written by the `login` command and `CF_GROUP`
    /// to a group the account manages.
    #[tokio::test]
    #[ignore]
    async fn test_fetch_members() {
        let session = CfSession::load(std::path::Path::new(
            &std::env::var("CF_SESSION").unwrap(),
        ))
        .unwrap();
        let site = CodeforcesSite::new(session, Duration::from_secs(1));
        let members = site
            .fetch_members(&std::env::var("CF_GROUP").unwrap())
            .await
            .unwrap();

        assert!(!members.is_empty());
    }

    /// Reads the public standings of a finished round, no session needed.
    #[tokio::test]
    #[ignore]
    async fn test_fetch_common_standings() {
        let site = CodeforcesSite::new(
            CfSession::new("https://codeforces.com").unwrap(),
            Duration::from_secs(1),
        );
        let standings = site.fetch_common_standings(4).await.unwrap();

        assert!(!standings.problems.is_empty());
        assert!(!standings.rows.is_empty());
    }
}
