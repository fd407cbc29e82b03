pub mod config;
pub mod contest;
pub mod get;
pub mod login;
pub mod member;
pub mod plagiarism;

use anyhow::{Context as _, Result};
use cf_manager_libs::config::{self as settings, Config, SESSION_FILE};
use cf_manager_libs::moss::{FileNameCodec, MossClient};
use cf_manager_libs::{CfSession, CodeforcesSite, Thresholds, UserFilter};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tokio::time::Duration;

/// Application directory and the config loaded from it.
pub struct Context {
    pub app_dir: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn load() -> Result<Self> {
        let app_dir = settings::app_dir()?;
        let config = Config::load(&app_dir)?;
        Ok(Self { app_dir, config })
    }

    pub fn session_path(&self) -> PathBuf {
        self.app_dir.join(SESSION_FILE)
    }

    pub fn group_id(&self, flag: Option<String>) -> Result<String> {
        flag.or_else(|| self.config.group_id.clone())
            .ok_or_else(|| anyhow::anyhow!("group-id not found in the command or config file."))
    }

    pub fn output_dir(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        flag.or_else(|| self.config.output_dir.clone())
            .ok_or_else(|| anyhow::anyhow!("output-dir not found in the command or config file."))
    }

    pub fn thresholds(&self, min_lines: Option<u32>, min_percent: Option<u32>) -> Thresholds {
        Thresholds {
            min_lines: min_lines.unwrap_or(self.config.min_lines),
            min_percent: min_percent.unwrap_or(self.config.min_percent),
        }
    }

    pub fn session(&self) -> Result<CfSession> {
        CfSession::load(&self.session_path()).context("failed to load the saved session")
    }

    pub fn site(&self) -> Result<CodeforcesSite> {
        Ok(CodeforcesSite::new(
            self.session()?,
            Duration::from_millis(self.config.request_interval_ms),
        ))
    }

    /// Site for public pages, anonymous when nobody has logged in.
    pub fn public_site(&self) -> Result<CodeforcesSite> {
        let session = match self.session() {
            Ok(session) => session,
            Err(_) => CfSession::new(&self.config.base_url)?,
        };
        Ok(CodeforcesSite::new(
            session,
            Duration::from_millis(self.config.request_interval_ms),
        ))
    }

    pub fn moss(&self) -> Result<MossClient> {
        let user_id = self.config.moss_user_id.ok_or_else(|| {
            anyhow::anyhow!("moss_user_id not found in the config file, register one at moss.stanford.edu")
        })?;
        Ok(MossClient::new(
            &self.config.moss_host,
            self.config.moss_port,
            user_id,
        ))
    }

    pub fn codec(&self, filter: Option<UserFilter>) -> Result<FileNameCodec> {
        FileNameCodec::new(&self.config.transformer, filter)
            .with_context(|| format!("invalid transformer `{}`", self.config.transformer))
    }
}

pub fn user_filter(format: Option<&str>) -> Result<Option<UserFilter>> {
    format.map(UserFilter::new).transpose()
}

/// `<output>/contest_<group>_<contest>(<name>)`
pub fn contest_dir(output_dir: &Path, group_id: &str, contest_id: u64, name: &str) -> PathBuf {
    output_dir.join(format!("contest_{}_{}({})", group_id, contest_id, name))
}

/// Asks a `[y/n]` question on the terminal; `assume_yes` skips it.
pub fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }

    print!("{} [y/n]: ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod test {
    use super::*;

    fn context(config: Config) -> Context {
        Context {
            app_dir: PathBuf::from("/nonexistent"),
            config,
        }
    }

    #[test]
    fn flags_win_over_config() {
        let ctx = context(Config {
            group_id: Some(String::from("fromconfig")),
            output_dir: Some(PathBuf::from("/data")),
            ..Config::default()
        });

        assert_eq!(ctx.group_id(Some(String::from("flag"))).unwrap(), "flag");
        assert_eq!(ctx.group_id(None).unwrap(), "fromconfig");
        assert_eq!(ctx.output_dir(None).unwrap(), PathBuf::from("/data"));

        let thresholds = ctx.thresholds(Some(20), None);
        assert_eq!(thresholds.min_lines, 20);
        assert_eq!(thresholds.min_percent, 90);
    }

    #[test]
    fn missing_identifiers_are_errors() {
        let ctx = context(Config::default());
        let err = ctx.group_id(None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "group-id not found in the command or config file."
        );
        assert!(ctx.output_dir(None).is_err());
        assert!(ctx.moss().is_err());
        assert!(ctx.site().is_err());
        assert!(ctx.public_site().is_ok());
    }

    #[test]
    fn contest_directory_name() {
        assert_eq!(
            contest_dir(Path::new("/out"), "AbC", 1500, "Round 1"),
            PathBuf::from("/out/contest_AbC_1500(Round 1)")
        );
    }

    #[test]
    fn assume_yes_skips_the_prompt() {
        assert!(confirm("remove everyone?", true).unwrap());
    }
}
