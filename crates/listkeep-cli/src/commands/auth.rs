//! Authentication commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use listkeep_config::{Config, Paths};
use std::io::{self, Write};

/// Prompt for email on stdin and password without echo.
///
/// Returns `None` after printing an error when either is empty.
fn prompt_credentials(format: &OutputFormat) -> Result<Option<(String, String)>> {
    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();

    if email.is_empty() {
        output::print_error("Email is required", format);
        return Ok(None);
    }

    let password = rpassword::prompt_password("Password: ")?;

    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(None);
    }

    Ok(Some((email, password)))
}

/// Create an account and sign in to it.
pub async fn register(paths: &Paths, config: &Config, format: &OutputFormat) -> Result<()> {
    let ctx = Context::open(paths, config).await?;

    if let Some(user) = ctx.sessions.current().user() {
        output::print_success(&format!("Already logged in as {}", user.email), format);
        return Ok(());
    }

    let Some((email, password)) = prompt_credentials(format)? else {
        return Ok(());
    };

    let user = ctx.sessions.register(&email, &password).await?;
    ctx.items.wait_for_initial_load().await?;
    output::print_success(&format!("Registered and logged in as {}", user.email), format);
    Ok(())
}

/// Login with email and password.
pub async fn login(paths: &Paths, config: &Config, format: &OutputFormat) -> Result<()> {
    let ctx = Context::open(paths, config).await?;

    if let Some(user) = ctx.sessions.current().user() {
        output::print_success(&format!("Already logged in as {}", user.email), format);
        return Ok(());
    }

    let Some((email, password)) = prompt_credentials(format)? else {
        return Ok(());
    };

    let user = ctx.sessions.login(&email, &password).await?;
    ctx.items.wait_for_initial_load().await?;
    output::print_success(&format!("Logged in as {}", user.email), format);
    Ok(())
}

/// Logout and clear the stored session.
pub async fn logout(paths: &Paths, config: &Config, format: &OutputFormat) -> Result<()> {
    let ctx = Context::open(paths, config).await?;

    if !ctx.sessions.current().is_signed_in() {
        output::print_success("Not logged in", format);
        return Ok(());
    }

    ctx.sessions.logout().await?;
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Show the current session.
pub async fn status(paths: &Paths, config: &Config, format: &OutputFormat) -> Result<()> {
    let ctx = Context::open(paths, config).await?;
    println!("{}", output::render_session(&ctx.sessions.current(), format));
    Ok(())
}
