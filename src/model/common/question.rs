use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mongodb::bson::{self, Bson};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use super::answer::Answer;

const DEFAULT_SHORT_TEXT_MAX: u32 = 255;
const DEFAULT_LONG_TEXT_MAX: u32 = 5000;
const DEFAULT_SCALE_MIN: i64 = 1;
const DEFAULT_SCALE_MAX: i64 = 5;

/// The type of a question, each carrying its own configuration schema.
///
/// Serialized adjacently tagged, i.e. `{"type": "LINEAR_SCALE", "config": {...}}`.
/// A missing or null `config` reads as the default configuration of the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "config", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    ShortText(TextConfig),
    LongText(TextConfig),
    MultipleChoice(ChoiceConfig),
    Checkboxes(ChoiceConfig),
    Dropdown(ChoiceConfig),
    LinearScale(ScaleConfig),
    Date(NoConfig),
    Time(NoConfig),
    DateTime(NoConfig),
    Url(NoConfig),
    ContentBlock(NoConfig),
    Radio(ChoiceConfig),
}

/// The `type` tag of a [`QuestionKind`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum QuestionType {
    ShortText,
    LongText,
    MultipleChoice,
    Checkboxes,
    Dropdown,
    LinearScale,
    Date,
    Time,
    DateTime,
    Url,
    ContentBlock,
    Radio,
}

#[derive(Deserialize)]
struct TaggedKind {
    #[serde(rename = "type")]
    kind: QuestionType,
    #[serde(default)]
    config: Option<Bson>,
}

impl<'de> Deserialize<'de> for QuestionKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let TaggedKind { kind, config } = TaggedKind::deserialize(deserializer)?;
        Self::from_parts(kind, config).map_err(serde::de::Error::custom)
    }
}

fn config_or_default<T>(config: Option<Bson>) -> Result<T, bson::de::Error>
where
    T: DeserializeOwned + Default,
{
    match config {
        None | Some(Bson::Null) => Ok(T::default()),
        Some(config) => bson::from_bson(config),
    }
}

/// Length limits for free-text answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// The options offered by a choice question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceConfig {
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub value: String,
}

/// Bounds and labels of a linear scale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_label: Option<String>,
}

impl ScaleConfig {
    pub fn bounds(&self) -> (i64, i64) {
        (
            self.min.unwrap_or(DEFAULT_SCALE_MIN),
            self.max.unwrap_or(DEFAULT_SCALE_MAX),
        )
    }
}

/// Configuration for question types that have none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoConfig {}

impl QuestionKind {
    fn from_parts(kind: QuestionType, config: Option<Bson>) -> Result<Self, bson::de::Error> {
        let kind = match kind {
            QuestionType::ShortText => Self::ShortText(config_or_default(config)?),
            QuestionType::LongText => Self::LongText(config_or_default(config)?),
            QuestionType::MultipleChoice => Self::MultipleChoice(config_or_default(config)?),
            QuestionType::Checkboxes => Self::Checkboxes(config_or_default(config)?),
            QuestionType::Dropdown => Self::Dropdown(config_or_default(config)?),
            QuestionType::LinearScale => Self::LinearScale(config_or_default(config)?),
            QuestionType::Date => Self::Date(config_or_default(config)?),
            QuestionType::Time => Self::Time(config_or_default(config)?),
            QuestionType::DateTime => Self::DateTime(config_or_default(config)?),
            QuestionType::Url => Self::Url(config_or_default(config)?),
            QuestionType::ContentBlock => Self::ContentBlock(config_or_default(config)?),
            QuestionType::Radio => Self::Radio(config_or_default(config)?),
        };
        Ok(kind)
    }

    /// Can this question be answered at all? Content blocks are display-only.
    pub fn is_answerable(&self) -> bool {
        !matches!(self, Self::ContentBlock(_))
    }

    /// Check the configuration is coherent, returning every problem found.
    pub fn config_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        match self {
            Self::ShortText(config) | Self::LongText(config) => {
                let (min, max) = self.text_bounds(config);
                if min > max {
                    problems.push(format!(
                        "min_length ({min}) is greater than max_length ({max})"
                    ));
                }
            }
            Self::MultipleChoice(config)
            | Self::Checkboxes(config)
            | Self::Dropdown(config)
            | Self::Radio(config) => {
                if config.options.is_empty() {
                    problems.push("at least one option is required".to_string());
                }
                let mut seen = HashSet::new();
                for option in &config.options {
                    if option.value.is_empty() {
                        problems.push("option values cannot be empty".to_string());
                    } else if !seen.insert(option.value.as_str()) {
                        problems.push(format!("option value '{}' is repeated", option.value));
                    }
                }
            }
            Self::LinearScale(config) => {
                let (min, max) = config.bounds();
                if min >= max {
                    problems.push(format!("scale min ({min}) must be below max ({max})"));
                }
                if matches!(config.step, Some(step) if step <= 0) {
                    problems.push("scale step must be positive".to_string());
                }
            }
            Self::Date(_) | Self::Time(_) | Self::DateTime(_) | Self::Url(_) => {}
            Self::ContentBlock(_) => {}
        }
        problems
    }

    /// Check a non-empty answer is acceptable for this question.
    pub fn check_answer(&self, answer: &Answer) -> Result<(), String> {
        match (self, answer) {
            (Self::ContentBlock(_), _) => Err("content blocks cannot be answered".to_string()),
            (Self::ShortText(config) | Self::LongText(config), Answer::Text(text)) => {
                let (min, max) = self.text_bounds(config);
                let len = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
                if len < min || len > max {
                    Err(format!("answer must be between {min} and {max} characters"))
                } else {
                    Ok(())
                }
            }
            (
                Self::MultipleChoice(config) | Self::Dropdown(config) | Self::Radio(config),
                Answer::Text(choice),
            ) => {
                if config.has_option(choice) {
                    Ok(())
                } else {
                    Err(format!("'{choice}' is not one of the options"))
                }
            }
            (Self::Checkboxes(config), Answer::Choices(choices)) => {
                let mut seen = HashSet::new();
                for choice in choices {
                    if !config.has_option(choice) {
                        return Err(format!("'{choice}' is not one of the options"));
                    }
                    if !seen.insert(choice) {
                        return Err(format!("'{choice}' is selected more than once"));
                    }
                }
                Ok(())
            }
            (Self::LinearScale(config), Answer::Number(value)) => {
                let (min, max) = config.bounds();
                if !(min..=max).contains(value) {
                    Err(format!("answer must be between {min} and {max}"))
                } else if matches!(config.step, Some(step) if step > 0 && (value - min) % step != 0)
                {
                    Err(format!("answer must be {min} plus a multiple of the step"))
                } else {
                    Ok(())
                }
            }
            (Self::Date(_), Answer::Text(text)) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|_| ())
                .map_err(|_| format!("'{text}' is not a date (YYYY-MM-DD)")),
            (Self::Time(_), Answer::Text(text)) => parse_time(text)
                .map(|_| ())
                .ok_or_else(|| format!("'{text}' is not a time (HH:MM)")),
            (Self::DateTime(_), Answer::Text(text)) => parse_date_time(text)
                .map(|_| ())
                .ok_or_else(|| format!("'{text}' is not a date and time (YYYY-MM-DDTHH:MM)")),
            (Self::Url(_), Answer::Text(text)) => {
                if is_web_url(text) {
                    Ok(())
                } else {
                    Err(format!("'{text}' is not an http(s) URL"))
                }
            }
            _ => Err(format!("expected {}", self.expected_answer())),
        }
    }

    fn text_bounds(&self, config: &TextConfig) -> (u32, u32) {
        let default_max = match self {
            Self::LongText(_) => DEFAULT_LONG_TEXT_MAX,
            _ => DEFAULT_SHORT_TEXT_MAX,
        };
        (
            config.min_length.unwrap_or(1),
            config.max_length.unwrap_or(default_max),
        )
    }

    fn expected_answer(&self) -> &'static str {
        match self {
            Self::Checkboxes(_) => "a list of options",
            Self::LinearScale(_) => "a whole number",
            _ => "a text answer",
        }
    }
}

impl ChoiceConfig {
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|option| option.value == value)
    }
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

fn is_web_url(text: &str) -> bool {
    let rest = text
        .strip_prefix("https://")
        .or_else(|| text.strip_prefix("http://"));
    match rest {
        Some(rest) => !rest.is_empty() && !rest.chars().any(char::is_whitespace),
        None => false,
    }
}
