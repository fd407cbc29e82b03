use super::Context;
use anyhow::Result;
use cf_manager_libs::Config;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Group id in Codeforces.com
    #[arg(short, long)]
    group_id: Option<String>,
    /// Min similar lines between two files
    #[arg(long)]
    min_lines: Option<u32>,
    /// Min percent between two files
    #[arg(long)]
    min_percent: Option<u32>,
    /// Working directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// MOSS user id
    #[arg(long)]
    moss_user_id: Option<u64>,
    /// Reset the config file to the default values
    #[arg(long)]
    reset: bool,
}

fn apply(mut config: Config, args: ConfigArgs) -> Config {
    if let Some(group_id) = args.group_id {
        config.group_id = Some(group_id);
    }
    if let Some(min_lines) = args.min_lines {
        config.min_lines = min_lines;
    }
    if let Some(min_percent) = args.min_percent {
        config.min_percent = min_percent;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = Some(output_dir);
    }
    if let Some(moss_user_id) = args.moss_user_id {
        config.moss_user_id = Some(moss_user_id);
    }
    config
}

pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let config = if args.reset {
        let config = Config::reset(&ctx.app_dir)?;
        println!("Successfully reset config file.");
        config
    } else {
        ctx.config.clone()
    };

    apply(config, args).save(&ctx.app_dir)?;
    println!("Successfully updated config file.");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_given_fields_change() {
        let args = ConfigArgs {
            group_id: Some(String::from("g1")),
            min_lines: None,
            min_percent: Some(80),
            output_dir: None,
            moss_user_id: None,
            reset: false,
        };
        let before = Config {
            output_dir: Some(PathBuf::from("/work")),
            ..Config::default()
        };

        let after = apply(before.clone(), args);
        assert_eq!(after.group_id.as_deref(), Some("g1"));
        assert_eq!(after.min_percent, 80);
        assert_eq!(after.min_lines, before.min_lines);
        assert_eq!(after.output_dir, before.output_dir);
    }
}
