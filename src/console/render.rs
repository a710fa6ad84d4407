//! Text rendering of the session state.
//!
//! Renderers return strings; printing is left to the binary.

use std::fmt::Write as _;

use crate::core::category::Category;
use crate::core::models::Role;
use crate::manager::{Delivery, SessionState, ThreadMessage};

/// Title shown when no conversation is active.
pub const APP_TITLE: &str = "EngiChat";

/// Suggested first messages.
pub const QUICK_PROMPTS: [&str; 4] = [
    "Help me debug this code",
    "Explain this concept",
    "Review my project approach",
    "Practice problems for exam",
];

/// Input hint.
pub const INPUT_HINT: &str = "Ask anything about engineering, coding, or your projects...";

const WELCOME: &str = "\
Welcome to EngiChat
Your AI-powered assistant for engineering challenges

  Coding Help  Get help with debugging, algorithms, and code optimization
  Exam Prep    Study engineering concepts and practice problem-solving
  Projects     Guidance on project planning, architecture, and best practices";

fn marker(category: Category) -> String {
    format!("[{}]", category.short_label())
}

/// Numbered conversation list with the active entry highlighted.
#[must_use]
pub fn render_sidebar(state: &SessionState) -> String {
    if state.conversations.is_empty() {
        return "No conversations yet\nStart a new chat to begin".to_string();
    }
    let active = state.active_id();
    let mut out = String::from("Conversations\n");
    for (index, conversation) in state.conversations.iter().enumerate() {
        let pointer = if Some(conversation.id) == active { '>' } else { ' ' };
        let _ = writeln!(
            out,
            "{pointer} {:>2}. {} {}  ({})",
            index + 1,
            marker(conversation.category),
            conversation.title,
            conversation.created_at.format("%Y-%m-%d"),
        );
    }
    out.trim_end().to_string()
}

/// Title and category of the active conversation.
#[must_use]
pub fn render_header(state: &SessionState) -> String {
    state.active.as_ref().map_or_else(
        || APP_TITLE.to_string(),
        |conversation| format!("{}\n{}", conversation.title, conversation.category.label()),
    )
}

fn render_message(message: &ThreadMessage) -> String {
    let author = match message.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    };
    let mut flags = String::new();
    if message.delivery == Delivery::Unsaved {
        flags.push_str(" (not saved)");
    }
    if message.fallback {
        flags.push_str(" (error)");
    }
    format!(
        "{author} {}{flags}\n{}",
        message.created_at.format("%H:%M:%S"),
        message.content
    )
}

/// Messages of the active conversation, or the welcome panel.
#[must_use]
pub fn render_thread(state: &SessionState) -> String {
    if state.thread.is_empty() && !state.pending {
        return WELCOME.to_string();
    }
    let mut blocks: Vec<String> = state.thread.iter().map(render_message).collect();
    if state.pending {
        blocks.push("Assistant is typing...".to_string());
    }
    blocks.join("\n\n")
}

/// Quick prompts, shown while the input is empty.
#[must_use]
pub fn render_quick_prompts() -> String {
    QUICK_PROMPTS
        .iter()
        .enumerate()
        .map(|(index, prompt)| format!("  {}. {prompt}", index + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full screen: header, error banner, thread and input hint.
#[must_use]
pub fn render_screen(state: &SessionState) -> String {
    let mut out = render_header(state);
    if let Some(error) = &state.last_error {
        let _ = write!(out, "\n! {error} (/dismiss)");
    }
    let _ = write!(out, "\n\n{}\n", render_thread(state));
    if state.thread.is_empty() {
        let _ = write!(out, "\nTry one of:\n{}\n", render_quick_prompts());
    }
    let _ = write!(out, "\n{INPUT_HINT}");
    out
}
