//! Interactive prompts shared by the commands.

use {
    crate::CliError,
    anyhow::Result,
    dialoguer::{Confirm, Error as DialoguerError, Select, theme::ColorfulTheme},
    std::io::IsTerminal,
};

/// Fail with a usage error unless both stdin and stderr are terminals.
pub(crate) fn ensure_interactive_terminal(what: &str) -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(CliError::Usage(format!("{what} requires an interactive terminal")).into())
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("Selection cancelled".to_string()).into()
            } else {
                CliError::Usage(format!("Prompt failed: {io_err}")).into()
            }
        },
    }
}

/// Let the user pick one of `items`; returns its index.
pub(crate) fn select_one(prompt: &str, items: &[String]) -> Result<usize> {
    // Truncate labels to fit terminal width to prevent wrapping in narrow
    // terminals.
    let term_width = console::Term::stderr().size().1 as usize;
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = items
        .iter()
        .map(|n| console::truncate_str(n, max_item_width, "\u{2026}").into_owned())
        .collect();

    Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?
        .ok_or_else(|| CliError::Cancelled("Selection cancelled".to_string()).into())
}

/// Ask a yes/no question, defaulting to no.
pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false))
}
