use crate::scraper::HeaderScraper;
use once_cell::sync::Lazy;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::REFERER;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Duration;

type Result<T> = std::result::Result<T, SessionError>;

static SCRAPER: Lazy<HeaderScraper> = Lazy::new(HeaderScraper::new);

const LOGIN_PATH: &str = "enter?back=%2F";
const TTA_COOKIE: &str = "39ce7";
// Value the login form carries before the `39ce7` cookie has been issued.
const DEFAULT_TTA: i64 = 569;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to request to the contest site")]
    RequestError(#[from] reqwest::Error),
    #[error("invalid url given")]
    InvalidUrlError(#[from] url::ParseError),
    #[error("failed to access the session file")]
    IoError(#[from] std::io::Error),
    #[error("failed to (de)serialize the session file")]
    SerializeError(#[from] serde_json::Error),
    #[error("{0}")]
    AuthenticationError(String),
}

/// What survives between two invocations of the tool.
#[derive(Debug, Serialize, Deserialize)]
struct SessionState {
    base_url: String,
    username: Option<String>,
    csrf_token: Option<String>,
    cookies: Vec<String>,
}

/// Authenticated HTTP session against the contest site.
pub struct CfSession {
    base_url: Url,
    client: Client,
    jar: Arc<Jar>,
    csrf_token: Option<String>,
    username: Option<String>,
}

fn build_client(jar: Arc<Jar>) -> Result<Client> {
    let client = Client::builder()
        .cookie_provider(jar)
        .gzip(true)
        .timeout(Duration::from_secs(30))
        .build()?;
    Ok(client)
}

/// Computes the `_tta` anti-bot value the site expects in forms from the `39ce7` cookie.
pub fn tta(cookie: &str) -> i64 {
    let codes: Vec<i64> = cookie.chars().map(|c| c as i64).collect();
    let mut value: i64 = 0;
    for i in 0..codes.len() {
        let n = i as i64;
        value = (value + (n + 1) * (n + 2) * codes[i]) % 1009;
        if i % 3 == 0 {
            value += 1;
        }
        if i % 2 == 0 {
            value *= 2;
        }
        if i > 0 {
            value -= (codes[i / 2] / 2) * (value % 5);
        }
        value = value.rem_euclid(1009);
    }
    value
}

fn log_rejection(requested: &Url) {
    tracing::error!(
        "the site rejected the request to {}. It could be due to too many requests or \
         missing permission; slow down or check your permission again.",
        requested
    );
}

impl CfSession {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let jar = Arc::new(Jar::default());
        let client = build_client(jar.clone())?;

        Ok(CfSession {
            base_url,
            client,
            jar,
            csrf_token: None,
            username: None,
        })
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Cookies currently held for the site, as `name=value` pairs.
    pub fn cookies(&self) -> Vec<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|header| header.to_str().ok().map(String::from))
            .map(|header| {
                header
                    .split(';')
                    .map(|pair| pair.trim().to_string())
                    .filter(|pair| !pair.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().into_iter().find_map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        })
    }

    /// `_tta` value for forms posted with this session.
    pub fn tta(&self) -> i64 {
        self.cookie(TTA_COOKIE)
            .map(|cookie| tta(&cookie))
            .unwrap_or(DEFAULT_TTA)
    }

    /// GET a page of the site and return its body.
    ///
    /// The site answers requests it refuses (rate limiting, missing permission) with a
    /// redirect to the front page. That is logged but not treated as an error.
    pub async fn get(&self, path: &str) -> Result<String> {
        let url = self.url(path)?;
        tracing::debug!("GET {}", url);
        let res = self.client.get(url.clone()).send().await?;

        if self.is_rejection(&url, res.url()) {
            log_rejection(&url);
        }
        let res = res.error_for_status()?;

        Ok(res.text().await?)
    }

    /// POST a form to the site and return the response body.
    pub async fn post_form(&self, path: &str, fields: &[(String, String)]) -> Result<String> {
        let url = self.url(path)?;
        tracing::debug!("POST {}", url);
        let res = self
            .client
            .post(url.clone())
            .header(REFERER, url.as_str())
            .form(fields)
            .send()
            .await?;

        if self.is_rejection(&url, res.url()) {
            log_rejection(&url);
        }
        let res = res.error_for_status()?;

        Ok(res.text().await?)
    }

    /// Whether a request for `requested` was bounced to the front page.
    ///
    /// Requests whose `back` parameter points at `/` (the login form) land there on success.
    fn is_rejection(&self, requested: &Url, landed: &Url) -> bool {
        let is_root = |url: &Url| url.path() == "/" && url.query().is_none();
        let back_to_root = requested
            .query_pairs()
            .any(|(key, value)| key == "back" && value == "/");

        !is_root(requested)
            && !back_to_root
            && is_root(landed)
            && landed.host_str() == self.base_url.host_str()
    }

    /// Username shown in the page header, `None` when nobody is logged in.
    pub async fn logged_username(&self) -> Result<Option<String>> {
        let html = self.get("/").await?;
        Ok(SCRAPER.extract_username(&html))
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() || password.is_empty() {
            return Err(SessionError::AuthenticationError(String::from(
                "please provide username and password",
            )));
        }

        // Start from an empty cookie jar.
        self.jar = Arc::new(Jar::default());
        self.client = build_client(self.jar.clone())?;
        self.csrf_token = None;
        self.username = None;

        let html = self.get(LOGIN_PATH).await?;
        let csrf_token = SCRAPER.extract_csrf_token(&html).ok_or_else(|| {
            SessionError::AuthenticationError(String::from(
                "csrf token not found in the login page",
            ))
        })?;

        let fields: Vec<(String, String)> = vec![
            ("csrf_token", csrf_token.clone()),
            ("action", String::from("enter")),
            ("ftaa", String::from("uf8qxh8b5vphq6wna4")),
            ("bfaa", String::from("1ef059a32710a29f84fbde5b5500d49c")),
            ("handleOrEmail", username.to_string()),
            ("password", password.to_string()),
            ("remember", String::from("on")),
            ("_tta", self.tta().to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        let html = self.post_form(LOGIN_PATH, &fields).await?;
        match SCRAPER.extract_username(&html) {
            Some(logged) if logged.eq_ignore_ascii_case(username) => {
                tracing::info!("logged in as {}", logged);
                self.csrf_token = SCRAPER.extract_csrf_token(&html).or(Some(csrf_token));
                self.username = Some(logged);
                Ok(())
            }
            _ => {
                tracing::warn!("login failed for {}", username);
                Err(SessionError::AuthenticationError(String::from(
                    "login failed, wrong username or password",
                )))
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let state = SessionState {
            base_url: self.base_url.to_string(),
            username: self.username.clone(),
            csrf_token: self.csrf_token.clone(),
            cookies: self.cookies(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&state)?)?;
        tracing::debug!("session saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SessionError::AuthenticationError(String::from(
                "no saved session found, run `login` first",
            )));
        }
        let state: SessionState = serde_json::from_str(&std::fs::read_to_string(path)?)?;

        let mut session = CfSession::new(&state.base_url)?;
        for cookie in state.cookies.iter() {
            session.jar.add_cookie_str(cookie, &session.base_url);
        }
        session.csrf_token = state.csrf_token;
        session.username = state.username;

        Ok(session)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    const LOGIN_PAGE: &str = r#"
<div class="lang-chooser">
  <div style="text-align:right;"><a href="?locale=en">en</a></div>
  <div><a href="/enter?back=%2F">Enter</a> | <a href="/register">Register</a></div>
</div>
<form method="post"><input type="hidden" name="csrf_token" value="login-token"/></form>
"#;

    const FRONT_PAGE: &str = r#"
<div class="lang-chooser">
  <div style="text-align:right;"><a href="?locale=en">en</a></div>
  <div><a href="/profile/alice">alice</a> | <a href="/alice/logout">Logout</a></div>
</div>
<form><input type="hidden" name="csrf_token" value="front-token"/></form>
"#;

    fn page(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn redirect_to_root() -> String {
        String::from("HTTP/1.1 302 Found\r\nLocation: /\r\nContent-Length: 0\r\n\r\n")
    }

    /// The login form redirects to the front page, like the real site does.
    fn login_site(method: &str, target: &str) -> String {
        match (method, target) {
            ("GET", "/enter?back=%2F") => page(LOGIN_PAGE),
            ("POST", "/enter?back=%2F") => redirect_to_root(),
            ("GET", "/") => page(FRONT_PAGE),
            ("GET", "/group/g/members") => redirect_to_root(),
            _ => String::from("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n"),
        }
    }

    /// Minimal HTTP/1.1 server answering every request with `respond(method, target)`.
    async fn serve_http(listener: TcpListener, respond: fn(&str, &str) -> String) {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let (reader, mut writer) = stream.into_split();
                let mut reader = BufReader::new(reader);
                loop {
                    let mut request_line = String::new();
                    if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
                        break;
                    }
                    let mut length = 0;
                    loop {
                        let mut header = String::new();
                        reader.read_line(&mut header).await.unwrap();
                        let header = header.trim_end();
                        if header.is_empty() {
                            break;
                        }
                        if let Some((name, value)) = header.split_once(':') {
                            if name.eq_ignore_ascii_case("content-length") {
                                length = value.trim().parse().unwrap();
                            }
                        }
                    }
                    let mut body = vec![0; length];
                    reader.read_exact(&mut body).await.unwrap();

                    let mut words = request_line.split_whitespace();
                    let method = words.next().unwrap_or_default();
                    let target = words.next().unwrap_or_default();
                    writer
                        .write_all(respond(method, target).as_bytes())
                        .await
                        .unwrap();
                }
            });
        }
    }

    #[test]
    fn redirect_to_front_page() {
        let session = CfSession::new("https://codeforces.com").unwrap();
        let root = session.url("/").unwrap();

        assert!(!session.is_rejection(&session.url(LOGIN_PATH).unwrap(), &root));
        assert!(session.is_rejection(&session.url("group/g/members").unwrap(), &root));
        assert!(!session.is_rejection(
            &session.url("group/g/members").unwrap(),
            &session.url("group/g/members").unwrap()
        ));
        assert!(!session.is_rejection(&root, &root));
        assert!(!session.is_rejection(
            &session.url("enter?back=%2Fgroup%2Fg").unwrap(),
            &session.url("group/g").unwrap()
        ));
    }

    #[tokio::test]
    async fn login_follows_the_redirect_to_the_front_page() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve_http(listener, login_site));

        let mut session = CfSession::new(&base_url).unwrap();
        session.login("alice", "pw").await.unwrap();

        assert_eq!(session.username(), Some("alice"));
        assert_eq!(session.csrf_token(), Some("front-token"));
        assert!(!session.is_rejection(
            &session.url(LOGIN_PATH).unwrap(),
            &session.url("/").unwrap()
        ));

        // a refused page is still handed back
        let html = session.get("group/g/members").await.unwrap();
        assert!(html.contains("/profile/alice"));
    }

    #[test]
    fn tta_of_empty_cookie() {
        assert_eq!(tta(""), 0);
    }

    #[test]
    fn tta_of_single_character() {
        // (1 * 2 * 97) % 1009 = 194, +1 on index 0, doubled on index 0
        assert_eq!(tta("a"), 390);
    }

    #[test]
    fn tta_stays_in_range() {
        let value = tta("f0e1d2c3b4a5968778695a4b3c2d1e0f");
        assert!((0..1009).contains(&value));
    }

    #[test]
    fn join_paths_against_base_url() {
        let session = CfSession::new("https://codeforces.com").unwrap();
        assert_eq!(
            session.url("/group/abc/members").unwrap().as_str(),
            "https://codeforces.com/group/abc/members"
        );
        assert_eq!(
            session.url(LOGIN_PATH).unwrap().as_str(),
            "https://codeforces.com/enter?back=%2F"
        );
    }

    #[test]
    fn save_and_load_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = CfSession::new("https://codeforces.com").unwrap();
        session
            .jar
            .add_cookie_str("JSESSIONID=abc123", &session.base_url);
        session.jar.add_cookie_str("39ce7=xyz", &session.base_url);
        session.csrf_token = Some(String::from("token"));
        session.username = Some(String::from("alice"));
        session.save(&path).unwrap();

        let loaded = CfSession::load(&path).unwrap();
        assert_eq!(loaded.username(), Some("alice"));
        assert_eq!(loaded.csrf_token(), Some("token"));
        let mut cookies = loaded.cookies();
        cookies.sort();
        assert_eq!(cookies, vec!["39ce7=xyz", "JSESSIONID=abc123"]);
        assert_eq!(loaded.tta(), tta("xyz"));
    }

    #[test]
    fn load_missing_session_is_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CfSession::load(&dir.path().join("session.json"));
        assert!(matches!(result, Err(SessionError::AuthenticationError(_))));
    }

    #[tokio::test]
    #[ignore]
    async fn test_anonymous_session_is_not_logged_in() {
        let session = CfSession::new("https://codeforces.com").unwrap();
        assert_eq!(session.logged_username().await.unwrap(), None);
    }
}
