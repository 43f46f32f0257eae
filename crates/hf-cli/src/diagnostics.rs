//! Diagnostic and error reporting utilities

use crate::{CliError, Result};
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};

/// Set up enhanced error reporting with miette
pub fn setup_error_reporting() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .map_err(|e| CliError::Config(format!("Failed to setup error reporting: {}", e)))?;

    Ok(())
}

/// Render a diagnostic to plain text: message, code and help, no colors.
pub fn render_diagnostic(diagnostic: &dyn Diagnostic) -> String {
    let mut out = String::new();
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    if handler.render_report(&mut out, diagnostic).is_err() {
        return diagnostic.to_string();
    }
    out
}

/// Print engine errors as full diagnostics. Returns false for errors the caller should
/// report itself.
pub fn render_cli_error(error: &CliError) -> bool {
    match error {
        CliError::Hotfix(err) => {
            eprintln!("{}", render_diagnostic(err));
            true
        }
        _ => false,
    }
}
