//! Show who the bot is logged in as and what it may do.

use anyhow::Result;
use wikisweep_client::UserInfo;

use crate::context::Context;

/// Rights the workloads depend on, listed before the rest.
const KEY_RIGHTS: &[&str] = &["edit", "createpage", "move", "delete", "bot", "noratelimit", "apihighlimits"];

pub async fn run(ctx: &Context) -> Result<()> {
    ctx.login().await?;
    let user = ctx.user_info().await?;
    print!("{}", render(&user));
    Ok(())
}

fn render(user: &UserInfo) -> String {
    let mut out = format!("user:   {}\n", user.name);
    out.push_str(&format!("groups: {}\n", user.groups.join(", ")));

    for right in KEY_RIGHTS {
        let mark = if user.has_right(right) { "yes" } else { "no" };
        out.push_str(&format!("  {right:<14} {mark}\n"));
    }

    let mut rest: Vec<&str> =
        user.rights.iter().map(String::as_str).filter(|right| !KEY_RIGHTS.contains(right)).collect();
    if !rest.is_empty() {
        rest.sort_unstable();
        out.push_str(&format!("other rights: {}\n", rest.join(", ")));
    }
    out
}
