//! `enom invoke` and `enom endpoints`.

use anyhow::{Context, Result};
use enom_api::{ApiError, EndpointRegistry, Params};

use crate::cli::args::InvokeArgs;
use crate::context::AppContext;
use crate::styled_output::print_dim;

pub async fn run_invoke(ctx: &AppContext, args: InvokeArgs) -> Result<()> {
    let params: Params = args.parsed_params()?.into_iter().collect();

    ctx.init_session().await;
    let client = ctx.api_client();

    let value = match client.invoke(&args.name, params).await {
        Ok(value) => value,
        Err(ApiError::NotFound(name)) => {
            print_dim("Run `enom endpoints` to list the available names.");
            anyhow::bail!("Unknown endpoint `{name}`");
        }
        Err(e) => return Err(e).with_context(|| format!("Request to `{}` failed", args.name)),
    };

    let out = if args.compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    };
    println!("{out}");
    Ok(())
}

pub fn run_endpoints(ctx: &AppContext) -> Result<()> {
    let registry = EndpointRegistry::builtin(&ctx.config.api);
    for name in registry.names() {
        let spec = registry.resolve(name)?;
        let mut flags = Vec::new();
        if spec.signed {
            flags.push("signed");
        }
        if spec.csrf {
            flags.push("csrf");
        }
        println!("{:<4} {name:<22} {}", spec.method.as_str(), flags.join(","));
    }
    Ok(())
}
