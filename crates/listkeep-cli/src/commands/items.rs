//! Item commands.
//!
//! Each mutation prints the collection as re-fetched after the write.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use listkeep_config::{Config, Paths};

/// Open a context and wait for the signed-in user's collection.
///
/// Returns `None` after printing an error when nobody is signed in.
async fn signed_in(
    paths: &Paths,
    config: &Config,
    format: &OutputFormat,
) -> Result<Option<Context>> {
    let ctx = Context::open(paths, config).await?;

    if !ctx.sessions.current().is_signed_in() {
        output::print_error("Not logged in. Run 'listkeep login' first", format);
        return Ok(None);
    }

    ctx.items.wait_for_initial_load().await?;
    Ok(Some(ctx))
}

/// List the signed-in user's items.
pub async fn items_list(paths: &Paths, config: &Config, format: &OutputFormat) -> Result<()> {
    let Some(ctx) = signed_in(paths, config, format).await? else {
        return Ok(());
    };

    output::print_items(&ctx.items.items(), format);
    Ok(())
}

/// Add an item.
pub async fn items_add(
    paths: &Paths,
    config: &Config,
    name: &str,
    description: &str,
    format: &OutputFormat,
) -> Result<()> {
    let Some(ctx) = signed_in(paths, config, format).await? else {
        return Ok(());
    };

    match ctx.items.create(name, description).await? {
        Some(id) => {
            if *format == OutputFormat::Text {
                output::print_success(&format!("Added item {}", id), format);
            }
            output::print_items(&ctx.items.items(), format);
        }
        None => output::print_error("Session ended before the item was added", format),
    }
    Ok(())
}

/// Replace an item's name and description.
pub async fn items_edit(
    paths: &Paths,
    config: &Config,
    id: &str,
    name: &str,
    description: &str,
    format: &OutputFormat,
) -> Result<()> {
    let Some(ctx) = signed_in(paths, config, format).await? else {
        return Ok(());
    };

    edit(&ctx, id, name, description, format).await
}

/// Update `id` whether or not it is in the local mirror. A missing ID is
/// not an error.
async fn edit(
    ctx: &Context,
    id: &str,
    name: &str,
    description: &str,
    format: &OutputFormat,
) -> Result<()> {
    if ctx.items.update(id, name, description).await? {
        if *format == OutputFormat::Text {
            output::print_success(&format!("Updated item {}", id), format);
        }
        output::print_items(&ctx.items.items(), format);
    } else {
        output::print_error("Session ended before the item was updated", format);
    }
    Ok(())
}

/// Remove an item.
pub async fn items_remove(
    paths: &Paths,
    config: &Config,
    id: &str,
    format: &OutputFormat,
) -> Result<()> {
    let Some(ctx) = signed_in(paths, config, format).await? else {
        return Ok(());
    };

    if ctx.items.delete(id).await? {
        if *format == OutputFormat::Text {
            output::print_success(&format!("Removed item {}", id), format);
        }
        output::print_items(&ctx.items.items(), format);
    } else {
        output::print_error("Session ended before the item was removed", format);
    }
    Ok(())
}
