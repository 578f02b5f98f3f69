//! Panel rendering.
//!
//! Pure mapping from [`TurnState`] to panel text. The start time comes from
//! the state and is emitted as platform time markup, so rendering the same
//! state twice always yields the same bytes.

use crate::slot::TurnState;

/// Prefix of the holder line.
pub const HOLDER_MARKER: &str = "Searching:";

/// Prefix of the queue section.
pub const QUEUE_MARKER: &str = "Queue:";

/// Render the panel text for `state`.
pub fn render(state: &TurnState) -> String {
    let holder = match (state.holder(), state.holder_started_at()) {
        (Some(holder), Some(started)) => {
            format!("{HOLDER_MARKER} <@{holder}> (since <t:{}:R>)", started.as_secs())
        },
        (Some(holder), None) => format!("{HOLDER_MARKER} <@{holder}>"),
        (None, _) => format!("{HOLDER_MARKER} nobody"),
    };

    let queue = if state.queue().is_empty() {
        format!("{QUEUE_MARKER} empty")
    } else {
        let entries: Vec<String> =
            state.queue().iter().enumerate().map(|(i, user)| format!("{}. <@{user}>", i + 1)).collect();
        format!("{QUEUE_MARKER}\n{}", entries.join("\n"))
    };

    format!("{holder}\n\n{queue}")
}

/// Whether `content` carries both panel markers.
pub fn has_panel_markers(content: &str) -> bool {
    content.contains(HOLDER_MARKER) && content.contains(QUEUE_MARKER)
}
