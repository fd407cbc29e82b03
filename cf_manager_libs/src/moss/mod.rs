//! Client side of the MOSS similarity service.
//!
//! MOSS speaks a line based text protocol over a plain TCP connection and publishes its
//! result as an HTML page. The submission identity travels through the upload file names,
//! see [`naming::FileNameCodec`].

pub mod client;
pub mod naming;
pub mod report;

pub use client::{MossClient, SimilarityService, UploadFile};
pub use naming::FileNameCodec;
pub use report::{RawMatch, ReportScraper};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MossError>;

#[derive(Debug, Error)]
pub enum MossError {
    #[error("failed to communicate with the moss server")]
    IoError(#[from] std::io::Error),
    #[error("failed to request the moss report")]
    RequestError(#[from] reqwest::Error),
    #[error("invalid transformer expression")]
    RegexError(#[from] regex::Error),
    #[error("language {0} is not supported by moss")]
    UnsupportedLanguage(String),
    #[error("moss did not return a report url, got `{0}`")]
    NoReport(String),
    #[error("unexpected report page shape at {0}")]
    ReportShape(String),
}

/// MOSS language for an extension written by [`crate::crawler::extension_of`].
pub fn language_of(extension: &str) -> &'static str {
    match extension {
        "cpp" => "cc",
        "c" => "c",
        "java" => "java",
        "py" => "python",
        "cs" => "csharp",
        "pas" => "pascal",
        "js" => "javascript",
        _ => "ascii",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crawler::extension_of;

    #[test]
    fn language_of_crawled_sources() {
        let cases = [
            ("GNU C++17", "cc"),
            ("GNU C11", "c"),
            ("Java 11", "java"),
            ("PyPy 3", "python"),
            ("C# 10", "csharp"),
            ("Free Pascal 3.0.2", "pascal"),
            ("Node.js 12.16.3", "javascript"),
            ("Kotlin 1.7", "ascii"),
            ("Rust 2021", "ascii"),
            ("Go 1.19.5", "ascii"),
            ("Brainfuck", "ascii"),
        ];
        for (language, expected) in cases {
            assert_eq!(language_of(extension_of(language)), expected, "{}", language);
        }
    }
}
