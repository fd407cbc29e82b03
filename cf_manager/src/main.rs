mod cmd;

use crate::cmd::{
    config::{self, ConfigArgs},
    contest::{self, ContestArgs},
    get::{self, GetArgs},
    login::{self, LoginArgs},
    member::{self, MemberArgs},
    plagiarism::{self, PlagiarismArgs},
    Context,
};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{env, str::FromStr};
use tokio::runtime::Builder;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{self, time::OffsetTime},
};

#[derive(Debug, Parser)]
#[command(name = "cf_manager")]
#[command(about = "Codeforces group manager")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Update the config file
    Config(ConfigArgs),
    /// Log in and save the session
    Login(LoginArgs),
    /// Member commands
    Member(MemberArgs),
    /// Contest commands
    Contest(ContestArgs),
    /// Plagiarism commands
    Plagiarism(PlagiarismArgs),
    /// Get commands
    Get(GetArgs),
}

fn main() {
    dotenv().ok();

    let log_level = env::var("RUST_LOG").unwrap_or(String::from("info"));
    let filter = EnvFilter::builder()
        .with_default_directive(
            LevelFilter::from_str(&log_level)
                .unwrap_or(LevelFilter::INFO)
                .into(),
        )
        .from_env_lossy();
    let format = fmt::format()
        .with_level(true)
        .with_target(true)
        .with_ansi(false)
        .with_timer(OffsetTime::local_rfc_3339().expect("couldn't determine the local offset"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(format)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let cli = Cli::parse();
    let runtime = Builder::new_multi_thread().enable_all().build().unwrap();

    let result = Context::load().and_then(|ctx| match cli.command {
        Commands::Config(args) => runtime.block_on(config::run(args, &ctx)),
        Commands::Login(args) => runtime.block_on(login::run(args, &ctx)),
        Commands::Member(args) => runtime.block_on(member::run(args, &ctx)),
        Commands::Contest(args) => runtime.block_on(contest::run(args, &ctx)),
        Commands::Plagiarism(args) => runtime.block_on(plagiarism::run(args, &ctx)),
        Commands::Get(args) => runtime.block_on(get::run(args, &ctx)),
    });

    let code = report(result);
    if code != 0 {
        std::process::exit(code);
    }
}

/// Logs the error chain of a failed command and returns the exit code.
fn report(result: anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("{:#}", e);
            1
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn failed_command_is_reported_once() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();

        let code = tracing::subscriber::with_default(subscriber, || {
            report(Err(anyhow::anyhow!("group-id not found")
                .context("failed to fetch the standings")))
        });

        assert_eq!(code, 1);
        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("group-id not found").count(), 1);
        assert!(output.contains("failed to fetch the standings: group-id not found"));
    }

    #[test]
    fn success_exits_with_zero() {
        assert_eq!(report(Ok(())), 0);
    }
}
