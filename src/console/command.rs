//! Parsing of console input lines into manager intents.

use crate::core::category::Category;

/// One line of console input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Start a conversation in a category.
    New(Category),
    /// Reload the conversation list.
    List,
    /// Select the n-th conversation of the list (1-based).
    Open(usize),
    /// Delete the n-th conversation of the list (1-based).
    Delete(usize),
    /// Clear the error banner.
    Dismiss,
    /// Show usage.
    Help,
    /// Leave the console.
    Quit,
    /// Send a chat message.
    Send(String),
    /// Blank line.
    Empty,
    /// A slash command that could not be parsed.
    Invalid(String),
}

/// Usage text for the slash commands.
pub const HELP: &str = "\
/new [coding|exam|project|general]  start a conversation
/list                               reload conversations
/open <n>                           open conversation n
/delete <n>                         delete conversation n
/dismiss                            clear the error banner
/help                               show this help
/quit                               leave
anything else is sent as a message";

/// Parse one input line.
#[must_use]
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    match name {
        "new" => arg.map_or(Command::New(Category::General), |raw| {
            raw.parse::<Category>()
                .map_or_else(|err| Command::Invalid(err.to_string()), Command::New)
        }),
        "list" => Command::List,
        "open" => index_arg(arg).map_or_else(Command::Invalid, Command::Open),
        "delete" => index_arg(arg).map_or_else(Command::Invalid, Command::Delete),
        "dismiss" => Command::Dismiss,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command: /{other}")),
    }
}

fn index_arg(arg: Option<&str>) -> Result<usize, String> {
    let raw = arg.ok_or_else(|| "missing conversation number".to_string())?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("not a conversation number: {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sent_trimmed() {
        assert_eq!(
            parse_command("  Help me debug this code \n"),
            Command::Send("Help me debug this code".to_string())
        );
        assert_eq!(parse_command("   "), Command::Empty);
    }

    #[test]
    fn test_new_accepts_short_category_names() {
        assert_eq!(parse_command("/new"), Command::New(Category::General));
        assert_eq!(parse_command("/new coding"), Command::New(Category::CodingHelp));
        assert_eq!(parse_command("/new exam"), Command::New(Category::ExamPrep));
        assert_eq!(parse_command("/new project"), Command::New(Category::ProjectGuidance));
        assert!(matches!(parse_command("/new cooking"), Command::Invalid(_)));
    }

    #[test]
    fn test_indexes_are_one_based() {
        assert_eq!(parse_command("/open 2"), Command::Open(2));
        assert_eq!(parse_command("/delete 1"), Command::Delete(1));
        assert!(matches!(parse_command("/open 0"), Command::Invalid(_)));
        assert!(matches!(parse_command("/delete"), Command::Invalid(_)));
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(parse_command("/list"), Command::List);
        assert_eq!(parse_command("/dismiss"), Command::Dismiss);
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert!(matches!(parse_command("/frobnicate"), Command::Invalid(_)));
    }
}
