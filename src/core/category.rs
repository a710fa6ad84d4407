//! Conversation categories and their presentation hints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed set of conversation categories.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Coding challenges and debugging.
    CodingHelp,
    /// Exam preparation and concept explanation.
    ExamPrep,
    /// Project planning and architecture.
    ProjectGuidance,
    /// Anything else.
    #[default]
    General,
}

impl Category {
    /// Every category, in sidebar order.
    pub const ALL: [Self; 4] = [
        Self::CodingHelp,
        Self::ExamPrep,
        Self::ProjectGuidance,
        Self::General,
    ];

    /// Stable string form for storage and the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CodingHelp => "coding_help",
            Self::ExamPrep => "exam_prep",
            Self::ProjectGuidance => "project_guidance",
            Self::General => "general",
        }
    }

    /// Display label used in the conversation header.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CodingHelp => "Coding Help",
            Self::ExamPrep => "Exam Preparation",
            Self::ProjectGuidance => "Project Guidance",
            Self::General => "General Chat",
        }
    }

    /// Short label used on the "new chat" shortcuts.
    #[must_use]
    pub const fn short_label(self) -> &'static str {
        match self {
            Self::CodingHelp => "Coding",
            Self::ExamPrep => "Exam",
            Self::ProjectGuidance => "Project",
            Self::General => "General",
        }
    }

    /// Icon hint.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::CodingHelp => "code",
            Self::ExamPrep => "book-open",
            Self::ProjectGuidance => "folder-kanban",
            Self::General => "zap",
        }
    }

    /// Color hint.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::CodingHelp => "blue",
            Self::ExamPrep => "green",
            Self::ProjectGuidance => "orange",
            Self::General => "gray",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a category string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct CategoryParseError(pub String);

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "coding_help" | "coding" => Ok(Self::CodingHelp),
            "exam_prep" | "exam" => Ok(Self::ExamPrep),
            "project_guidance" | "project" => Ok(Self::ProjectGuidance),
            "general" => Ok(Self::General),
            _ => Err(CategoryParseError(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&Category::ProjectGuidance).unwrap();
        assert_eq!(json, "\"project_guidance\"");
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn test_parse_accepts_hyphens_and_short_names() {
        assert_eq!("exam-prep".parse::<Category>(), Ok(Category::ExamPrep));
        assert_eq!("Coding".parse::<Category>(), Ok(Category::CodingHelp));
        assert!("cooking".parse::<Category>().is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Category::General.label(), "General Chat");
        assert_eq!(Category::default(), Category::General);
        assert_eq!(Category::ExamPrep.icon(), "book-open");
    }
}
