use super::{MossError, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

pub const DEFAULT_HOST: &str = "moss.stanford.edu";
pub const DEFAULT_PORT: u16 = 7690;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub display_name: String,
    pub content: Vec<u8>,
}

/// A service that compares a set of files and publishes a report.
#[async_trait]
pub trait SimilarityService {
    /// Uploads `files` and returns the report URL.
    async fn submit(&self, language: &str, files: &[UploadFile], comment: &str) -> Result<String>;
    async fn fetch_report(&self, url: &str) -> Result<String>;
}

pub struct MossClient {
    host: String,
    port: u16,
    user_id: u64,
    max_matches: u32,
    show: u32,
    http: reqwest::Client,
}

impl MossClient {
    pub fn new(host: &str, port: u16, user_id: u64) -> Self {
        Self {
            host: String::from(host),
            port,
            user_id,
            max_matches: 10,
            show: 250,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SimilarityService for MossClient {
    async fn submit(&self, language: &str, files: &[UploadFile], comment: &str) -> Result<String> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let header = format!(
            "moss {}\ndirectory 0\nX 0\nmaxmatches {}\nshow {}\nlanguage {}\n",
            self.user_id, self.max_matches, self.show, language
        );
        writer.write_all(header.as_bytes()).await?;

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        if line.trim() != "yes" {
            writer.write_all(b"end\n").await?;
            return Err(MossError::UnsupportedLanguage(String::from(language)));
        }

        // 0 is reserved for base files.
        for (index, file) in files.iter().enumerate() {
            let name = file.display_name.replace(char::is_whitespace, "_");
            tracing::debug!("uploading {}", name);
            writer
                .write_all(
                    format!(
                        "file {} {} {} {}\n",
                        index + 1,
                        language,
                        file.content.len(),
                        name
                    )
                    .as_bytes(),
                )
                .await?;
            writer.write_all(&file.content).await?;
        }

        writer
            .write_all(format!("query 0 {}\n", comment).as_bytes())
            .await?;
        tracing::info!("{} files uploaded, waiting for the report", files.len());

        line.clear();
        reader.read_line(&mut line).await?;
        writer.write_all(b"end\n").await?;

        let url = line.trim();
        if url.starts_with("http") {
            Ok(url.to_string())
        } else {
            Err(MossError::NoReport(url.to_string()))
        }
    }

    async fn fetch_report(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Accepts one connection and answers like the real server.
    ///
    /// Returns the commands it received and the uploaded contents.
    async fn serve_once(
        listener: TcpListener,
        accept_language: bool,
    ) -> (Vec<String>, Vec<Vec<u8>>) {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut commands = Vec::new();
        let mut contents = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            let mut words = line.split(' ');
            match words.next() {
                Some("language") => {
                    let answer: &[u8] = if accept_language { b"yes\n" } else { b"no\n" };
                    writer.write_all(answer).await.unwrap();
                }
                Some("file") => {
                    let size: usize = words.nth(2).unwrap().parse().unwrap();
                    let mut content = vec![0; size];
                    reader.read_exact(&mut content).await.unwrap();
                    contents.push(content);
                }
                Some("query") => {
                    writer
                        .write_all(b"http://moss.stanford.edu/results/1/2345\n")
                        .await
                        .unwrap();
                }
                _ => {}
            }
            let end = line == "end";
            commands.push(line);
            if end {
                break;
            }
        }
        (commands, contents)
    }

    #[tokio::test]
    async fn submit_follows_the_protocol() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, true));

        let client = MossClient::new("127.0.0.1", port, 12345);
        let files = vec![
            UploadFile {
                display_name: String::from("A/1500-2-alice.cpp"),
                content: b"int main() {}\n".to_vec(),
            },
            UploadFile {
                display_name: String::from("A/1500-3-bob smith.cpp"),
                content: b"int main() { return 0; }".to_vec(),
            },
        ];
        let url = client.submit("cc", &files, "contest 1500").await.unwrap();
        assert_eq!(url, "http://moss.stanford.edu/results/1/2345");

        let (commands, contents) = server.await.unwrap();
        assert_eq!(
            commands,
            vec![
                "moss 12345",
                "directory 0",
                "X 0",
                "maxmatches 10",
                "show 250",
                "language cc",
                "file 1 cc 14 A/1500-2-alice.cpp",
                "file 2 cc 24 A/1500-3-bob_smith.cpp",
                "query 0 contest 1500",
                "end",
            ]
        );
        assert_eq!(contents, vec![files[0].content.clone(), files[1].content.clone()]);
    }

    #[tokio::test]
    async fn rejected_language_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, false));

        let client = MossClient::new("127.0.0.1", port, 1);
        let result = client.submit("brainfuck", &[], "").await;
        assert!(matches!(result, Err(MossError::UnsupportedLanguage(_))));

        let (commands, contents) = server.await.unwrap();
        assert_eq!(commands.last().map(String::as_str), Some("end"));
        assert!(contents.is_empty());
    }
}
