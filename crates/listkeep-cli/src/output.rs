//! Output formatting for the CLI.

use clap::ValueEnum;
use listkeep_auth::SessionState;
use listkeep_items::Item;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn status_json(status: &str, message: &str) -> String {
    serde_json::json!({ "status": status, "message": message }).to_string()
}

/// Print a success message.
pub fn print_success(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => println!("{}", status_json("success", message)),
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => eprintln!("{}", status_json("error", message)),
    }
}

/// Render a collection as a table (text) or an array (json).
pub fn render_items(items: &[Item], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Text if items.is_empty() => "No items.".to_string(),
        OutputFormat::Text => {
            let id_width = items.iter().map(|item| item.id.len()).max().unwrap_or(2).max(2);
            let name_width = items
                .iter()
                .map(|item| item.name.chars().count())
                .max()
                .unwrap_or(4)
                .max(4);

            let mut lines = vec![format!(
                "{:<id_width$}  {:<name_width$}  DESCRIPTION",
                "ID", "NAME"
            )];
            lines.extend(items.iter().map(|item| {
                format!(
                    "{:<id_width$}  {:<name_width$}  {}",
                    item.id, item.name, item.description
                )
            }));
            lines.join("\n")
        }
        OutputFormat::Json => serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string()),
    }
}

pub fn print_items(items: &[Item], format: &OutputFormat) {
    println!("{}", render_items(items, format));
}

/// Render the session state.
pub fn render_session(state: &SessionState, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Text => match state {
            SessionState::SignedIn(user) => format!(
                "Auth:     logged in\nUser ID:  {}\nEmail:    {}",
                user.user_id, user.email
            ),
            SessionState::SignedOut | SessionState::Unresolved => {
                "Auth:     not logged in".to_string()
            }
        },
        OutputFormat::Json => {
            let json = serde_json::json!({
                "logged_in": state.is_signed_in(),
                "user_id": state.user().map(|user| user.user_id.as_str()),
                "email": state.user().map(|user| user.email.as_str()),
            });
            serde_json::to_string_pretty(&json).unwrap_or_default()
        }
    }
}
