//! Session commands: QR login, status, logout and hand-off import.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use enom_login::{InitOutcome, QrLogin, QrStatus};
use qrcode::QrCode;
use qrcode::render::unicode;
use tokio::time::Instant;
use tracing::debug;

use crate::cli::args::{HandoffArgs, LoginArgs};
use crate::context::AppContext;
use crate::styled_output::{print_dim, print_info, print_success, print_warning};

pub async fn run_login(ctx: &AppContext, args: LoginArgs) -> Result<()> {
    let qr = QrLogin::new(ctx.http.clone(), &ctx.config.api, ctx.store.clone());
    let mut session = qr.generate().await.context("Failed to start QR login")?;

    match render_terminal_qr(&session.login_url) {
        Some(art) => eprintln!("{art}"),
        None => print_dim(&format!("Login URL: {}", session.login_url)),
    }
    print_info("Scan the QR code with the bilibili app and confirm the login.");

    if let Some(path) = &args.qr_out {
        match session.qr_png() {
            Some(png) => {
                std::fs::write(path, png)
                    .with_context(|| format!("Failed to write QR image to {}", path.display()))?;
                print_dim(&format!("QR image written to {}", path.display()));
            }
            None => print_warning("QR image could not be rendered, use the login URL instead."),
        }
    }

    let interval = Duration::from_secs(args.interval.max(1));
    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    let mut last = session.status;

    loop {
        tokio::time::sleep(interval).await;
        let result = qr.poll_session(&mut session).await;
        debug!(status = %result.status, message = %result.message, "Polled QR login");

        if result.status != last && result.status == QrStatus::Scanned {
            print_info("Scanned, waiting for confirmation on the phone...");
        }
        last = result.status;

        match result.status {
            QrStatus::Confirmed => {
                print_success("Logged in.");
                return Ok(());
            }
            QrStatus::Failed => bail!("QR login failed: {}", result.message),
            QrStatus::Pending | QrStatus::Scanned => {}
        }

        if Instant::now() >= deadline {
            bail!("Timed out after {}s waiting for the QR login", args.timeout);
        }
    }
}

pub async fn run_status(ctx: &AppContext) -> Result<()> {
    let outcome = ctx.init_session().await;
    let source = match outcome {
        InitOutcome::Restored => "stored session",
        InitOutcome::Migrated => "migrated legacy session",
        InitOutcome::Guest => "guest session",
        InitOutcome::Empty => "no session",
    };

    let client = ctx.api_client();
    let user = client.current_user().await.context("Failed to query the nav endpoint")?;
    if user.is_login {
        print_success(&format!(
            "Logged in as {} ({source})",
            user.uname.as_deref().unwrap_or("unknown")
        ));
    } else {
        print_info(&format!("Not logged in ({source})"));
    }
    println!("{}", serde_json::to_string_pretty(&user)?);
    Ok(())
}

pub fn run_logout(ctx: &AppContext) -> Result<()> {
    ctx.store.clear();
    print_success("Stored session removed.");
    Ok(())
}

pub fn run_handoff(ctx: &AppContext, args: HandoffArgs) -> Result<()> {
    if ctx.store.apply_handoff(&args.url)? {
        print_success("Session imported from hand-off link.");
    } else {
        print_warning("Hand-off link carried no session, nothing changed.");
    }
    Ok(())
}

fn render_terminal_qr(content: &str) -> Option<String> {
    let code = QrCode::new(content.as_bytes()).ok()?;
    Some(
        code.render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build(),
    )
}
