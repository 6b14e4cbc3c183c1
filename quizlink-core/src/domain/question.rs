use serde::{Deserialize, Serialize};

/// Number of answer options per question
pub const OPTION_COUNT: usize = 4;

/// A single trivia question, immutable once loaded.
///
/// The full ordered set for a session is decided once by the host and
/// transmitted verbatim so both sides evaluate identical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: u32,

    text: String,

    /// The four answer options, in display order
    options: [String; OPTION_COUNT],

    /// 1-based index of the correct option (1..=4)
    correct_option: u8,
}

/// Errors that can occur when building a question
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuestionError {
    #[error("correct option must be in 1..=4, got {0}")]
    CorrectOptionOutOfRange(u8),

    #[error("question text must not be empty")]
    EmptyText,
}

impl Question {
    /// Create a question, validating the correct-option index
    pub fn new(
        id: u32,
        text: impl Into<String>,
        options: [String; OPTION_COUNT],
        correct_option: u8,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if correct_option < 1 || correct_option as usize > OPTION_COUNT {
            return Err(QuestionError::CorrectOptionOutOfRange(correct_option));
        }

        Ok(Question {
            id,
            text,
            options,
            correct_option,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    pub fn correct_option(&self) -> u8 {
        self.correct_option
    }

    /// Whether a selection is the correct answer.
    ///
    /// 0 means "no selection before the window elapsed" and is never correct.
    pub fn is_correct(&self, selected_option: u8) -> bool {
        selected_option > 0 && selected_option == self.correct_option
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> [String; OPTION_COUNT] {
        ["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()]
    }

    #[test]
    fn test_create_question() {
        let q = Question::new(1, "Capital of France?", options(), 2).unwrap();

        assert_eq!(q.id(), 1);
        assert_eq!(q.text(), "Capital of France?");
        assert_eq!(q.correct_option(), 2);
    }

    #[test]
    fn test_correct_option_out_of_range() {
        assert_eq!(
            Question::new(1, "Q", options(), 0),
            Err(QuestionError::CorrectOptionOutOfRange(0))
        );
        assert_eq!(
            Question::new(1, "Q", options(), 5),
            Err(QuestionError::CorrectOptionOutOfRange(5))
        );
    }

    #[test]
    fn test_empty_text_rejected() {
        assert_eq!(
            Question::new(1, "  ", options(), 1),
            Err(QuestionError::EmptyText)
        );
    }

    #[test]
    fn test_is_correct() {
        let q = Question::new(7, "Q", options(), 3).unwrap();

        assert!(q.is_correct(3));
        assert!(!q.is_correct(1));
        // 0 is the timeout sentinel, never correct
        assert!(!q.is_correct(0));
    }

    #[test]
    fn test_serialization_round_trip() {
        let q = Question::new(42, "Q", options(), 4).unwrap();

        let json = serde_json::to_string(&q).unwrap();
        let back: Question = serde_json::from_str(&json).unwrap();

        assert_eq!(q, back);
    }
}
