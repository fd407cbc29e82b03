use super::plagiarism::pairs_table;
use super::{contest_dir, user_filter, Context};
use anyhow::{Context as _, Result};
use cf_manager_libs::models::{Member, Role, Standings};
use cf_manager_libs::table::write_records;
use cf_manager_libs::{
    correlate, CodeforcesSite, ContestSite, SimilarityChecker, SubmissionCrawler, Table,
    UserFilter,
};
use clap::{Args, Subcommand, ValueEnum};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct GetArgs {
    #[command(subcommand)]
    command: GetCommands,
}

#[derive(Debug, Subcommand)]
enum GetCommands {
    /// Print the logged in username
    Username,
    /// Get members of a group
    Member(MemberArgs),
    /// Get the standings and every submission of a contest
    Contest(ContestArgs),
    /// Get the standings of a contest
    Standings(StandingsArgs),
    /// Get every submission of a contest
    Submission(SubmissionArgs),
    /// Get the standings of a contest with plagiarism applied
    Pstandings(PstandingsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MemberType {
    All,
    Pending,
    Spectator,
    Manager,
    Participant,
}

impl MemberType {
    fn as_str(&self) -> &'static str {
        match self {
            MemberType::All => "all",
            MemberType::Pending => "pending",
            MemberType::Spectator => "spectator",
            MemberType::Manager => "manager",
            MemberType::Participant => "participant",
        }
    }

    fn role(&self) -> Option<Role> {
        match self {
            MemberType::Spectator => Some(Role::Spectator),
            MemberType::Manager => Some(Role::Manager),
            MemberType::Participant => Some(Role::Participant),
            MemberType::All | MemberType::Pending => None,
        }
    }
}

#[derive(Debug, Args)]
struct MemberArgs {
    #[arg(short, long)]
    group_id: Option<String>,
    #[arg(short = 't', long = "type", value_enum, ignore_case = true)]
    types: Vec<MemberType>,
    /// User format
    #[arg(short = 'f', long)]
    user_format: Option<String>,
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ContestArgs {
    #[arg(short, long)]
    group_id: Option<String>,
    #[arg(short, long)]
    contest_id: u64,
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Keep submissions of every verdict
    #[arg(long)]
    all_verdicts: bool,
}

#[derive(Debug, Args)]
struct StandingsArgs {
    #[arg(short, long)]
    group_id: Option<String>,
    #[arg(short, long)]
    contest_id: u64,
    /// User format
    #[arg(short = 'f', long)]
    user_format: Option<String>,
    /// Include participants from outside the group
    #[arg(long)]
    common: bool,
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SubmissionArgs {
    #[arg(short, long)]
    group_id: Option<String>,
    #[arg(short, long)]
    contest_id: u64,
    /// User format
    #[arg(short = 'f', long)]
    user_format: Option<String>,
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Keep submissions of every verdict
    #[arg(long)]
    all_verdicts: bool,
}

#[derive(Debug, Args)]
struct PstandingsArgs {
    #[arg(short, long)]
    group_id: Option<String>,
    #[arg(short, long)]
    contest_id: u64,
    /// Min similar lines between two files
    #[arg(long)]
    min_lines: Option<u32>,
    /// Min percent between two files
    #[arg(long)]
    min_percent: Option<u32>,
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct MemberRecord<'a> {
    username: &'a str,
    role: String,
}

fn select_members(members: Vec<Member>, types: &[MemberType]) -> Vec<Member> {
    if types.is_empty() || types.contains(&MemberType::All) {
        return members;
    }

    let roles: HashSet<Role> = types.iter().filter_map(MemberType::role).collect();
    let pending = types.contains(&MemberType::Pending);
    members
        .into_iter()
        .filter(|member| {
            if member.pending {
                pending
            } else {
                roles.contains(&member.role)
            }
        })
        .collect()
}

fn handles(handle: &str) -> impl Iterator<Item = &str> {
    handle.split(',').map(str::trim)
}

/// Drops rows whose handles are neither listed in `members` nor match `filter`.
fn restrict(
    mut standings: Standings,
    members: Option<&HashSet<String>>,
    filter: Option<&UserFilter>,
) -> Standings {
    if let Some(members) = members {
        standings
            .rows
            .retain(|row| handles(&row.handle).any(|h| members.contains(&h.to_lowercase())));
    }
    if let Some(filter) = filter {
        standings
            .rows
            .retain(|row| handles(&row.handle).any(|h| filter.matches(h)));
    }
    standings
}

/// Whose rows a standings request reads.
#[derive(Debug, PartialEq, Eq)]
enum Scope {
    /// Group standings, limited to confirmed members.
    Members(String),
    /// Group standings including participants from outside the group.
    Group(String),
    /// Public standings of a contest that is not bound to a group.
    Public,
}

impl Scope {
    fn file_name(&self, contest_id: u64) -> String {
        match self {
            Scope::Members(group_id) => format!("standings_{}_{}.csv", group_id, contest_id),
            Scope::Group(_) | Scope::Public => format!("standings_common_{}.csv", contest_id),
        }
    }
}

/// A group id is only required when the rows are limited to its members.
fn standings_scope(ctx: &Context, flag: Option<String>, common: bool) -> Result<Scope> {
    match (ctx.group_id(flag), common) {
        (Ok(group_id), false) => Ok(Scope::Members(group_id)),
        (Ok(group_id), true) => Ok(Scope::Group(group_id)),
        (Err(_), true) => Ok(Scope::Public),
        (Err(e), false) => Err(e.context(
            "Please provide group id, or use `--common` to read the public standings of the contest.",
        )),
    }
}

async fn fetch_standings<S: ContestSite + Sync>(
    site: &S,
    scope: &Scope,
    contest_id: u64,
    filter: Option<&UserFilter>,
) -> Result<Standings> {
    let standings = match scope {
        Scope::Members(group_id) | Scope::Group(group_id) => {
            site.fetch_standings(group_id, contest_id).await
        }
        Scope::Public => site.fetch_common_standings(contest_id).await,
    }
    .with_context(|| format!("failed to fetch the standings of contest {}", contest_id))?;

    match scope {
        Scope::Members(group_id) => {
            let members: HashSet<String> = site
                .fetch_members(group_id)
                .await?
                .into_iter()
                .filter(|member| !member.pending)
                .map(|member| member.username.to_lowercase())
                .collect();
            Ok(restrict(standings, Some(&members), filter))
        }
        Scope::Group(_) | Scope::Public => Ok(restrict(standings, None, filter)),
    }
}

async fn print_or_write(table: &Table, path: Option<PathBuf>, empty: &str) -> Result<()> {
    match path {
        Some(path) => {
            table.write_csv(&path).await?;
            println!("Written to {} successfully", path.display());
        }
        None if table.rows.is_empty() => println!("{}", empty),
        None => println!("{}", table.render()),
    }
    Ok(())
}

async fn crawl(
    site: &CodeforcesSite,
    group_id: &str,
    contest_id: u64,
    filter: Option<UserFilter>,
    all_verdicts: bool,
    dest: &std::path::Path,
) -> Result<()> {
    println!(
        "Getting all submission from contest {} in group {}",
        contest_id, group_id
    );
    let records = SubmissionCrawler::new(site, group_id, contest_id)
        .filter(filter)
        .accepted_only(!all_verdicts)
        .run(dest)
        .await?;
    if records.is_empty() {
        println!("There is no submission in contest {}.", contest_id);
    } else {
        println!(
            "Successfully getting {} submission(s) from contest {} in group {}",
            records.len(),
            contest_id,
            group_id
        );
    }
    Ok(())
}

pub async fn run(args: GetArgs, ctx: &Context) -> Result<()> {
    match args.command {
        GetCommands::Username => {
            let session = ctx.session()?;
            match session.logged_username().await? {
                Some(username) => println!("{}", username),
                None => anyhow::bail!("the saved session is no longer logged in, run `login` again"),
            }
        }
        GetCommands::Member(args) => {
            let group_id = ctx.group_id(args.group_id)?;
            let filter = user_filter(args.user_format.as_deref())?;
            let output_dir = args.output_dir.or_else(|| ctx.config.output_dir.clone());
            let site = ctx.site()?;

            let members = select_members(site.fetch_members(&group_id).await?, &args.types);
            let members = match filter {
                Some(filter) => filter.filter_members(members),
                None => members,
            };

            let types = if args.types.is_empty() {
                String::from("all")
            } else {
                args.types.iter().map(MemberType::as_str).join("_")
            };
            match output_dir {
                Some(dir) => {
                    let path = dir.join(format!("members_{}_{}.csv", group_id, types));
                    let records: Vec<MemberRecord> = members
                        .iter()
                        .map(|member| MemberRecord {
                            username: &member.username,
                            role: member.display_role(),
                        })
                        .collect();
                    write_records(&path, &records).await?;
                    println!("Members was written to {} successfully", path.display());
                }
                None => {
                    let table = Table {
                        header: vec![String::from("username"), String::from("role")],
                        rows: members
                            .iter()
                            .map(|member| vec![member.username.clone(), member.display_role()])
                            .collect(),
                    };
                    print_or_write(&table, None, "There is no members!").await?;
                }
            }
        }
        GetCommands::Contest(args) => {
            let group_id = ctx.group_id(args.group_id)?;
            let output_dir = ctx.output_dir(args.output_dir)?;
            let site = ctx.site()?;

            let scope = Scope::Members(group_id.clone());
            let standings = fetch_standings(&site, &scope, args.contest_id, None).await?;
            let name = site.fetch_contest_name(&group_id, args.contest_id).await?;
            let dir = contest_dir(&output_dir, &group_id, args.contest_id, &name);

            let path = dir.join("standings.csv");
            standings.to_table().write_csv(&path).await?;
            println!("Standings was written to {} successfully", path.display());

            crawl(&site, &group_id, args.contest_id, None, args.all_verdicts, &dir).await?;
        }
        GetCommands::Standings(args) => {
            let scope = standings_scope(ctx, args.group_id, args.common)?;
            let filter = user_filter(args.user_format.as_deref())?;
            let output_dir = args.output_dir.or_else(|| ctx.config.output_dir.clone());
            let site = match scope {
                Scope::Public => ctx.public_site()?,
                Scope::Members(_) | Scope::Group(_) => ctx.site()?,
            };

            let standings =
                fetch_standings(&site, &scope, args.contest_id, filter.as_ref()).await?;

            let path = output_dir.map(|dir| dir.join(scope.file_name(args.contest_id)));
            print_or_write(&standings.to_table(), path, "There is no one in the standings.")
                .await?;
        }
        GetCommands::Submission(args) => {
            let group_id = ctx.group_id(args.group_id)?;
            let output_dir = ctx.output_dir(args.output_dir)?;
            let filter = user_filter(args.user_format.as_deref())?;
            let site = ctx.site()?;

            crawl(
                &site,
                &group_id,
                args.contest_id,
                filter,
                args.all_verdicts,
                &output_dir,
            )
            .await?;
        }
        GetCommands::Pstandings(args) => {
            let group_id = ctx.group_id(args.group_id)?;
            let output_dir = ctx.output_dir(args.output_dir)?;
            let thresholds = ctx.thresholds(args.min_lines, args.min_percent);
            let moss = ctx.moss()?;
            let codec = ctx.codec(None)?;
            let site = ctx.site()?;

            println!(
                "Crawling checked standings from contest {} in group {}",
                args.contest_id, group_id
            );
            let scope = Scope::Members(group_id.clone());
            let standings = fetch_standings(&site, &scope, args.contest_id, None).await?;
            let name = site.fetch_contest_name(&group_id, args.contest_id).await?;
            let dir = contest_dir(&output_dir, &group_id, args.contest_id, &name);
            standings
                .to_table()
                .write_csv(&dir.join("standings.csv"))
                .await?;

            crawl(&site, &group_id, args.contest_id, None, false, &dir).await?;

            let checker = SimilarityChecker::new(&moss, codec, thresholds, args.contest_id);
            let matches = checker.check(&dir).await?;
            let correlation = correlate(&standings, &matches, Some(ctx.config.new_score));

            correlation
                .standings
                .to_table()
                .write_csv(&dir.join("pstandings.csv"))
                .await?;
            write_records(&dir.join("plagiarism.csv"), &correlation.pairs).await?;

            if correlation.pairs.is_empty() {
                println!("There is no submissions found in plagiarism check.");
            } else {
                println!("{}", pairs_table(&correlation.pairs).render());
            }
            println!(
                "Successfully crawling checked standings from contest {} in group {}!",
                args.contest_id, group_id
            );
        }
    }

    Ok(())
}
