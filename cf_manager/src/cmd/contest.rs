use super::Context;
use anyhow::Result;
use cf_manager_libs::models::ContestDigest;
use cf_manager_libs::{ContestSite, Table};
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct ContestArgs {
    #[command(subcommand)]
    command: ContestCommands,
}

#[derive(Debug, Subcommand)]
enum ContestCommands {
    /// List all contests of a group
    Ls(LsArgs),
    /// Turn manager mode on or off for contest(s) in a group
    Manage(ManageArgs),
}

#[derive(Debug, Args)]
struct LsArgs {
    #[arg(short, long)]
    group_id: Option<String>,
}

#[derive(Debug, Args)]
struct ManageArgs {
    #[arg(short, long)]
    group_id: Option<String>,
    /// Only this contest; every contest of the group otherwise
    #[arg(short, long)]
    contest_id: Option<u64>,
    #[arg(short, long, action = clap::ArgAction::Set)]
    mode: bool,
}

fn contest_table(contests: &[ContestDigest]) -> Table {
    Table {
        header: vec![
            String::from("contest id"),
            String::from("contest name"),
            String::from("manager mode"),
        ],
        rows: contests
            .iter()
            .map(|contest| {
                vec![
                    contest.contest_id.to_string(),
                    contest.name.clone(),
                    contest.manager_mode.to_string(),
                ]
            })
            .collect(),
    }
}

/// Contests whose manager mode differs from `mode`.
fn to_toggle(contests: &[ContestDigest], mode: bool) -> Vec<u64> {
    contests
        .iter()
        .filter(|contest| contest.manager_mode != mode)
        .map(|contest| contest.contest_id)
        .collect()
}

pub async fn run(args: ContestArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ContestCommands::Ls(args) => {
            let group_id = ctx.group_id(args.group_id)?;
            let site = ctx.site()?;

            let contests = site.fetch_contests(&group_id).await?;
            if contests.is_empty() {
                println!("There is no contest in group {}.", group_id);
            } else {
                println!("{}", contest_table(&contests).render());
            }
        }
        ContestCommands::Manage(args) => {
            let group_id = ctx.group_id(args.group_id)?;
            let site = ctx.site()?;

            let contest_ids = match args.contest_id {
                Some(contest_id) => vec![contest_id],
                None => to_toggle(&site.fetch_contests(&group_id).await?, args.mode),
            };
            for contest_id in contest_ids {
                site.set_manager_mode(&group_id, contest_id, args.mode)
                    .await?;
                println!(
                    "Successfully changed manager mode at contest {} in group {}.",
                    contest_id, group_id
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn contest(contest_id: u64, manager_mode: bool) -> ContestDigest {
        ContestDigest {
            contest_id,
            name: format!("Round {}", contest_id),
            manager_mode,
        }
    }

    #[test]
    fn only_contests_in_the_other_mode_are_toggled() {
        let contests = vec![contest(1, true), contest(2, false), contest(3, false)];
        assert_eq!(to_toggle(&contests, true), vec![2, 3]);
        assert_eq!(to_toggle(&contests, false), vec![1]);
    }

    #[test]
    fn listing_has_one_row_per_contest() {
        let table = contest_table(&[contest(1, true), contest(2, false)]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["1", "Round 1", "true"]);
    }
}
