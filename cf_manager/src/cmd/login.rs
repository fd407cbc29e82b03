use super::Context;
use anyhow::{Context as _, Result};
use cf_manager_libs::CfSession;
use clap::Args;

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username in Codeforces.com
    #[arg(short, long)]
    username: String,
    /// Password in Codeforces.com
    #[arg(short, long, env = "CF_PASSWORD", hide_env_values = true)]
    password: String,
}

pub async fn run(args: LoginArgs, ctx: &Context) -> Result<()> {
    let mut session = CfSession::new(&ctx.config.base_url)?;
    session
        .login(&args.username, &args.password)
        .await
        .context("Login fail! Please try again!")?;

    session.save(&ctx.session_path())?;
    println!(
        "Successfully login with username: {}",
        session.username().unwrap_or(&args.username)
    );
    Ok(())
}
