//! Routes parsed commands to their handlers.

use anyhow::Result;

use super::args::{Cli, Commands};
use crate::context::AppContext;
use crate::invoke_cmd::{run_endpoints, run_invoke};
use crate::login::{run_handoff, run_login, run_logout, run_status};

pub async fn dispatch_command(cli: Cli) -> Result<()> {
    let ctx = AppContext::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Invoke(args) => run_invoke(&ctx, args).await,
        Commands::Endpoints => run_endpoints(&ctx),
        Commands::Login(args) => run_login(&ctx, args).await,
        Commands::Status => run_status(&ctx).await,
        Commands::Logout => run_logout(&ctx),
        Commands::Handoff(args) => run_handoff(&ctx, args),
    }
}
