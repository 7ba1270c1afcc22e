use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A single answer value, as sent by the client.
///
/// Text covers free-text, single-choice and date/time/URL answers, numbers
/// cover linear scales and lists cover checkboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Number(i64),
    Text(String),
    Choices(Vec<String>),
}

impl Answer {
    /// Blank text and empty selections count as no answer.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(text) => text.trim().is_empty(),
            Self::Choices(choices) => choices.is_empty(),
        }
    }
}

/// Answers to a form, keyed by question ID.
pub type Answers = HashMap<Id, Answer>;

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::{self, json};

    use super::*;

    #[test]
    fn untagged_values() {
        let answers: Vec<Answer> =
            serde_json::from_value(json!(["hello", 4, ["a", "b"], []])).unwrap();
        assert_eq!(
            answers,
            vec![
                Answer::Text("hello".to_string()),
                Answer::Number(4),
                Answer::Choices(vec!["a".to_string(), "b".to_string()]),
                Answer::Choices(Vec::new()),
            ]
        );
        assert!(serde_json::from_value::<Answer>(json!({"x": 1})).is_err());
    }

    #[test]
    fn emptiness() {
        assert!(Answer::Text("   ".to_string()).is_empty());
        assert!(Answer::Choices(Vec::new()).is_empty());
        assert!(!Answer::Number(0).is_empty());
        assert!(!Answer::Text("a".to_string()).is_empty());
    }
}
