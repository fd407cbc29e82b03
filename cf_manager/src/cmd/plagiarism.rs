use super::{user_filter, Context};
use anyhow::Result;
use cf_manager_libs::{PlagiarismRecord, SimilarityChecker, Table};
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct PlagiarismArgs {
    #[command(subcommand)]
    command: PlagiarismCommands,
}

#[derive(Debug, Subcommand)]
enum PlagiarismCommands {
    /// Check the downloaded submissions of a contest
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[arg(short, long)]
    contest_id: u64,
    /// Output directory of `get submission`
    #[arg(short, long)]
    submission_dir: PathBuf,
    /// Min similar lines between two files
    #[arg(long)]
    min_lines: Option<u32>,
    /// Min percent between two files
    #[arg(long)]
    min_percent: Option<u32>,
    /// User format
    #[arg(short = 'f', long)]
    user_format: Option<String>,
}

pub fn pairs_table(pairs: &[PlagiarismRecord]) -> Table {
    Table {
        header: ["problem", "user 1", "%", "user 2", "%", "lines", "url"]
            .iter()
            .map(|h| h.to_string())
            .collect(),
        rows: pairs
            .iter()
            .map(|pair| {
                vec![
                    pair.problem.clone(),
                    pair.first_user.clone(),
                    pair.first_percent.to_string(),
                    pair.second_user.clone(),
                    pair.second_percent.to_string(),
                    pair.lines.to_string(),
                    pair.url.clone(),
                ]
            })
            .collect(),
    }
}

pub async fn run(args: PlagiarismArgs, ctx: &Context) -> Result<()> {
    match args.command {
        PlagiarismCommands::Check(args) => {
            let moss = ctx.moss()?;
            let codec = ctx.codec(user_filter(args.user_format.as_deref())?)?;
            let thresholds = ctx.thresholds(args.min_lines, args.min_percent);

            println!("Checking plagiarism");
            let checker = SimilarityChecker::new(&moss, codec, thresholds, args.contest_id);
            let matches = checker.check(&args.submission_dir).await?;

            if matches.is_empty() {
                println!("There is no submissions found in plagiarism check.");
            } else {
                let pairs: Vec<PlagiarismRecord> =
                    matches.iter().map(PlagiarismRecord::from).collect();
                println!("{}", pairs_table(&pairs).render());
            }
            println!("Successfully checked plagiarism.");
        }
    }

    Ok(())
}
