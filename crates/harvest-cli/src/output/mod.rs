use harvest_auth::{AuthEvent, NoticeLevel, Route};
use serde::Serialize;

use crate::cli::{GlobalFlags, OutputFormat};

/// Render a serializable response to a string in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Raw => Ok(serde_json::to_string(value)?),
    }
}

/// Print a serializable response in the requested format.
pub fn output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render(value, format)?;
    println!("{rendered}");
    Ok(())
}

/// One line per notice, for stderr.
///
/// Error notices are skipped: the failing command returns the same error and
/// `main` prints it.
#[must_use]
pub fn notice_lines(events: &[AuthEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            AuthEvent::Notice {
                level: NoticeLevel::Success,
                message,
            } => Some(format!("ok: {message}")),
            AuthEvent::Notice {
                level: NoticeLevel::Info,
                message,
            } => Some(format!("note: {message}")),
            AuthEvent::Notice {
                level: NoticeLevel::Error,
                ..
            }
            | AuthEvent::Navigate { .. } => None,
        })
        .collect()
}

/// The last navigation request among `events`.
#[must_use]
pub fn last_route(events: &[AuthEvent]) -> Option<Route> {
    events.iter().rev().find_map(|event| match event {
        AuthEvent::Navigate { route } => Some(*route),
        AuthEvent::Notice { .. } => None,
    })
}

/// Print notices to stderr unless `--quiet`.
pub fn notices(events: &[AuthEvent], flags: &GlobalFlags) {
    if flags.quiet {
        return;
    }
    for line in notice_lines(events) {
        eprintln!("{line}");
    }
}
