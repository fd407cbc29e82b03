use super::Result;
use crate::filter::UserFilter;
use crate::models::SubmissionIdentity;
use once_cell::sync::Lazy;
use regex::Regex;

// Contest and submission ids are digits, so the first two dashes always delimit them
// even when the username itself contains dashes or dots.
static UPLOAD_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<contest>\d+)-(?P<submission>\d+)-(?P<username>.+)\.(?P<ext>[A-Za-z0-9]+)$")
        .unwrap()
});

/// Maps submission identities to upload file names and back.
///
/// The report shows the display name given at upload time, possibly with a directory
/// prefix. The `transformer` expression picks the part that holds the encoded name; the
/// default `[^/]+$` keeps the last path component.
pub struct FileNameCodec {
    transformer: Regex,
    filter: Option<UserFilter>,
}

impl FileNameCodec {
    pub fn new(transformer: &str, filter: Option<UserFilter>) -> Result<Self> {
        Ok(Self {
            transformer: Regex::new(transformer)?,
            filter,
        })
    }

    pub fn encode(&self, identity: &SubmissionIdentity, extension: &str) -> String {
        format!(
            "{}-{}-{}.{}",
            identity.contest_id, identity.submission_id, identity.username, extension
        )
    }

    pub fn transform<'a>(&self, displayed: &'a str) -> &'a str {
        self.transformer
            .find(displayed)
            .map(|m| m.as_str())
            .unwrap_or(displayed)
    }

    /// Recovers the identity from a name shown in the report.
    ///
    /// Names that do not follow the upload format, or whose username fails the
    /// configured user format, give `None`.
    pub fn decode(&self, displayed: &str) -> Option<SubmissionIdentity> {
        let name = self.transform(displayed.trim());
        let captures = UPLOAD_NAME.captures(name)?;

        let username = captures.name("username")?.as_str();
        if let Some(filter) = &self.filter {
            if !filter.matches(username) {
                return None;
            }
        }

        Some(SubmissionIdentity {
            contest_id: captures.name("contest")?.as_str().parse().ok()?,
            submission_id: captures.name("submission")?.as_str().parse().ok()?,
            username: username.to_string(),
        })
    }
}
