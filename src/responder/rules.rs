//! Keyword-routed responder with a per-category handler registry.

use std::collections::HashMap;

use tracing::debug;

use crate::core::category::Category;

use super::{ChatReply, ChatRequest, Responder, ResponderFuture};

/// Prefix shared by every canned reply.
pub const REPLY_PREFIX: &str = "I'm your AI assistant for engineering! ";

/// Keyword table, checked in order; the first category with a matching
/// keyword wins.
const KEYWORDS: [(Category, &[&str]); 3] = [
    (Category::CodingHelp, &["code", "debug", "programming"]),
    (Category::ExamPrep, &["exam", "study", "learn"]),
    (Category::ProjectGuidance, &["project", "design", "architecture"]),
];

const CODING_REPLY: &str = "I can help you with coding challenges, debugging, algorithm optimization, and best practices. \
To integrate real AI responses, you'll need to connect to an AI service like OpenAI or Anthropic. \
Add your API key to the edge function environment and make API calls to get intelligent responses.";

const EXAM_REPLY: &str = "I can help you prepare for engineering exams by explaining complex concepts, providing practice problems, and reviewing solutions. \
To enable full AI capabilities, integrate with an AI service provider in this edge function.";

const PROJECT_REPLY: &str = "I can guide you through project planning, system architecture, technology selection, and implementation strategies. \
For advanced AI-powered insights, connect this function to an AI API service.";

const GENERAL_REPLY: &str = "I'm here to help with all your engineering questions! Ask me about:\n\n\
- Coding help and debugging\n\
- Exam preparation and concept explanation\n\
- Project guidance and architecture\n\
- Algorithm optimization\n\
- Best practices and design patterns\n\n\
Note: To enable full AI capabilities, integrate this edge function with an AI service like OpenAI or Anthropic.";

/// Route a message to a category by case-insensitive substring match.
#[must_use]
pub fn classify(message: &str) -> Category {
    let lowered = message.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|word| lowered.contains(word)))
        .map_or(Category::General, |(category, _)| *category)
}

/// Produces the reply text for one category.
pub trait ReplyHandler: Send + Sync {
    /// Reply to a message already routed to this handler.
    fn reply(&self, message: &str) -> String;
}

impl<F> ReplyHandler for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn reply(&self, message: &str) -> String {
        self(message)
    }
}

/// Fixed text behind [`REPLY_PREFIX`].
#[derive(Clone, Debug)]
pub struct CannedReply {
    body: String,
}

impl CannedReply {
    /// Create a canned reply.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

impl ReplyHandler for CannedReply {
    fn reply(&self, _message: &str) -> String {
        format!("{REPLY_PREFIX}{}", self.body)
    }
}

/// Stateless, deterministic responder.
pub struct RuleResponder {
    handlers: HashMap<Category, Box<dyn ReplyHandler>>,
}

impl Default for RuleResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleResponder {
    /// Create a responder with the stock canned replies.
    #[must_use]
    pub fn new() -> Self {
        let mut handlers: HashMap<Category, Box<dyn ReplyHandler>> = HashMap::new();
        handlers.insert(Category::CodingHelp, Box::new(CannedReply::new(CODING_REPLY)));
        handlers.insert(Category::ExamPrep, Box::new(CannedReply::new(EXAM_REPLY)));
        handlers.insert(
            Category::ProjectGuidance,
            Box::new(CannedReply::new(PROJECT_REPLY)),
        );
        handlers.insert(Category::General, Box::new(CannedReply::new(GENERAL_REPLY)));
        Self { handlers }
    }

    /// Replace the handler of one category.
    #[must_use]
    pub fn with_handler(mut self, category: Category, handler: impl ReplyHandler + 'static) -> Self {
        self.handlers.insert(category, Box::new(handler));
        self
    }

    /// Reply synchronously.
    #[must_use]
    pub fn reply(&self, message: &str) -> String {
        let category = classify(message);
        debug!("Routed message to {}", category);
        self.handlers
            .get(&category)
            .or_else(|| self.handlers.get(&Category::General))
            .map_or_else(
                || format!("{REPLY_PREFIX}{GENERAL_REPLY}"),
                |handler| handler.reply(message),
            )
    }
}

impl Responder for RuleResponder {
    fn respond(&self, request: ChatRequest) -> ResponderFuture<'_> {
        Box::pin(async move {
            Ok(ChatReply {
                response: self.reply(&request.message),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::ConversationId;

    #[test]
    fn test_classify_in_table_order() {
        assert_eq!(classify("Help me DEBUG this loop"), Category::CodingHelp);
        assert_eq!(classify("I need to study for my exam"), Category::ExamPrep);
        assert_eq!(classify("Review the architecture"), Category::ProjectGuidance);
        assert_eq!(classify("hello"), Category::General);
        // coding keywords are checked before project ones
        assert_eq!(classify("design some code"), Category::CodingHelp);
    }

    #[test]
    fn test_classify_matches_substrings() {
        assert_eq!(classify("unlearnable"), Category::ExamPrep);
        assert_eq!(classify("decoder ring"), Category::CodingHelp);
    }

    #[test]
    fn test_debug_reply_is_coding_text() {
        let reply = RuleResponder::new().reply("debug");
        assert!(reply.starts_with(REPLY_PREFIX));
        assert!(reply.contains("coding challenges, debugging"));
    }

    #[test]
    fn test_exam_reply_is_exam_text() {
        let reply = RuleResponder::new().reply("When is the exam?");
        assert!(reply.starts_with(REPLY_PREFIX));
        assert!(reply.contains("prepare for engineering exams"));
    }

    #[test]
    fn test_no_match_lists_capabilities() {
        let reply = RuleResponder::new().reply("hello there");
        assert!(reply.starts_with("I'm your AI assistant for engineering! I'm here to help"));
        assert!(reply.contains("- Algorithm optimization\n"));
    }

    #[test]
    fn test_replies_are_deterministic() {
        let responder = RuleResponder::new();
        assert_eq!(responder.reply("project plan"), responder.reply("project plan"));
    }

    #[test]
    fn test_with_handler_replaces_one_category() {
        let responder = RuleResponder::new()
            .with_handler(Category::ExamPrep, |message: &str| format!("echo: {message}"));
        assert_eq!(responder.reply("exam"), "echo: exam");
        assert!(responder.reply("code").starts_with(REPLY_PREFIX));
    }

    #[tokio::test]
    async fn test_respond_wraps_reply() {
        let responder = RuleResponder::new();
        let reply = responder
            .respond(ChatRequest::new("Help me debug this loop", ConversationId::new()))
            .await
            .unwrap();
        assert_eq!(reply.response, responder.reply("Help me debug this loop"));
    }
}
