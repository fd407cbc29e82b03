pub mod checker;
pub mod config;
pub mod correlator;
pub mod crawler;
pub mod filter;
pub mod models;
pub mod moss;
pub mod scraper;
pub mod session;
pub mod site;
pub mod table;

pub use checker::{SimilarityChecker, Thresholds};
pub use config::{Config, ConfigError};
pub use correlator::{correlate, Correlation, PlagiarismRecord};
pub use crawler::SubmissionCrawler;
pub use filter::UserFilter;
pub use session::{CfSession, SessionError};
pub use site::{CodeforcesSite, ContestSite, SiteError};
pub use table::Table;
