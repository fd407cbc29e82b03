use super::{confirm, user_filter, Context};
use anyhow::Result;
use cf_manager_libs::filter::{read_username_list, retain_listed};
use cf_manager_libs::models::{ConfirmAction, Member};
use cf_manager_libs::{ContestSite, UserFilter};
use clap::{Args, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct MemberArgs {
    #[command(subcommand)]
    command: MemberCommands,
}

#[derive(Debug, Subcommand)]
enum MemberCommands {
    /// Check if a user is a manager of the group
    IsManager(IsManagerArgs),
    /// Accept or reject pending members
    Confirm(ConfirmArgs),
    /// Remove members from the group
    Remove(RemoveArgs),
}

#[derive(Debug, Args)]
struct IsManagerArgs {
    #[arg(short, long)]
    group_id: Option<String>,
    #[arg(short, long)]
    username: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    Accept,
    Reject,
}

impl From<Action> for ConfirmAction {
    fn from(action: Action) -> Self {
        match action {
            Action::Accept => ConfirmAction::Accept,
            Action::Reject => ConfirmAction::Reject,
        }
    }
}

#[derive(Debug, Args)]
struct ConfirmArgs {
    #[arg(short, long)]
    group_id: Option<String>,
    #[arg(long, value_enum, ignore_case = true)]
    action: Action,
    /// CSV file with the usernames to act on
    #[arg(short, long)]
    input_file: Option<PathBuf>,
    /// User format
    #[arg(short = 'f', long)]
    user_format: Option<String>,
    /// Don't ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    #[arg(short, long)]
    group_id: Option<String>,
    /// CSV file with the usernames to act on
    #[arg(short, long)]
    input_file: Option<PathBuf>,
    /// User format
    #[arg(short = 'f', long)]
    user_format: Option<String>,
    /// Don't ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

/// Narrows `members` down to the listed usernames and the user format.
async fn select(
    members: Vec<Member>,
    input_file: Option<&Path>,
    filter: Option<&UserFilter>,
) -> Result<Vec<Member>> {
    let members = match input_file {
        Some(path) => retain_listed(members, &read_username_list(path).await?),
        None => members,
    };
    Ok(match filter {
        Some(filter) => filter.filter_members(members),
        None => members,
    })
}

pub async fn run(args: MemberArgs, ctx: &Context) -> Result<()> {
    match args.command {
        MemberCommands::IsManager(args) => {
            let group_id = ctx.group_id(args.group_id)?;
            let site = ctx.site()?;
            println!("{}", site.is_manager(&group_id, &args.username).await?);
        }
        MemberCommands::Confirm(args) => {
            let group_id = ctx.group_id(args.group_id)?;
            let filter = user_filter(args.user_format.as_deref())?;
            let site = ctx.site()?;

            let pending: Vec<Member> = site
                .fetch_members(&group_id)
                .await?
                .into_iter()
                .filter(|member| member.pending)
                .collect();
            if pending.is_empty() {
                println!("There is no pending members to be confirmed.");
                return Ok(());
            }

            let targets = select(pending, args.input_file.as_deref(), filter.as_ref()).await?;
            let question = format!(
                "Do you want to confirm ({}) {} user(s)?",
                ConfirmAction::from(args.action),
                targets.len()
            );
            if !confirm(&question, args.yes)? {
                return Ok(());
            }

            let action = ConfirmAction::from(args.action);
            for member in targets.iter() {
                site.confirm_member(&group_id, member, action).await?;
            }
            println!("Successfully {}ed {} user(s)", action, targets.len());
        }
        MemberCommands::Remove(args) => {
            let group_id = ctx.group_id(args.group_id)?;
            let filter = user_filter(args.user_format.as_deref())?;
            let site = ctx.site()?;

            let members = site.fetch_members(&group_id).await?;
            if members.is_empty() {
                println!("There is no members in the group to be removed.");
                return Ok(());
            }

            let targets = select(members, args.input_file.as_deref(), filter.as_ref()).await?;
            if !confirm(&format!("Do you want to remove {} user(s)?", targets.len()), args.yes)? {
                return Ok(());
            }

            for member in targets.iter() {
                site.remove_member(&group_id, member).await?;
            }
            println!("Successfully removed {} user(s)", targets.len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use cf_manager_libs::models::Role;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn member(username: &str) -> Member {
        Member {
            username: String::from(username),
            role: Role::Participant,
            pending: true,
            form_fields: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn select_by_list_and_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "username").unwrap();
        writeln!(file, "s1alice").unwrap();
        writeln!(file, "bob").unwrap();

        let members = vec![member("s1alice"), member("bob"), member("s2carol")];
        let filter = UserFilter::new("s[0-9]").unwrap();

        let selected = select(members.clone(), Some(file.path()), Some(&filter))
            .await
            .unwrap();
        assert_eq!(selected, vec![member("s1alice")]);

        let everyone = select(members.clone(), None, None).await.unwrap();
        assert_eq!(everyone, members);
    }
}
