use chrono::{DateTime, Utc};
use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{question::QuestionKind, section::SectionConfig},
    db::form::{Form, FormEdit, FormMeta, NewForm, Question, Section},
    mongodb::{unique_ids, Id},
};

const MAX_TITLE_LENGTH: usize = 255;

/// Check a required piece of text is between 1 and `max` characters.
pub(crate) fn check_length(field: &str, value: &str, max: usize, problems: &mut Vec<String>) {
    let len = value.trim().chars().count();
    if len == 0 || value.chars().count() > max {
        problems.push(format!("{field} must be between 1 and {max} characters"));
    }
}

/// A request to create a new, empty form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFormRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: Document,
}

impl NewFormRequest {
    /// Validate this request, producing a form owned by the caller.
    pub fn into_form(self, owner: Id) -> Result<NewForm> {
        let mut problems = Vec::new();
        check_length("title", &self.title, MAX_TITLE_LENGTH, &mut problems);
        if !problems.is_empty() {
            return Err(Error::validation(problems));
        }

        let now = Utc::now();
        Ok(NewForm {
            title: self.title,
            description: self.description,
            config: self.config,
            metadata: Document::new(),
            deadline: None,
            created_by: owner,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A request to overwrite a form's metadata and, optionally, its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormEditRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: Document,
    #[serde(default)]
    pub metadata: Document,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// The complete new content. Empty leaves the current content alone.
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
    /// Groups to assign the form to as part of the edit.
    #[serde(default)]
    pub group_ids: Vec<Id>,
}

/// A section and its questions, in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SectionConfig,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub question_text: String,
    #[serde(default)]
    pub question_description: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
}

impl FormEditRequest {
    /// Validate this edit, assigning fresh IDs and positions to its sections
    /// and questions. Every problem is reported at once.
    pub fn into_edit(self, form_id: Id) -> Result<FormEdit> {
        let mut problems = Vec::new();
        check_length("title", &self.title, MAX_TITLE_LENGTH, &mut problems);

        let mut sections = Vec::with_capacity(self.sections.len());
        let mut questions = Vec::new();
        for (order, section) in (1..).zip(self.sections) {
            let label = format!("section {order}");
            check_length(
                &format!("{label}: title"),
                &section.title,
                MAX_TITLE_LENGTH,
                &mut problems,
            );
            problems.extend(
                section
                    .config
                    .problems()
                    .into_iter()
                    .map(|problem| format!("{label}: {problem}")),
            );

            let section_id = Id::new();
            for (question_order, question) in (1..).zip(section.questions) {
                let label = format!("{label}, question {question_order}");
                check_length(
                    &format!("{label}: question_text"),
                    &question.question_text,
                    MAX_TITLE_LENGTH,
                    &mut problems,
                );
                problems.extend(
                    question
                        .kind
                        .config_problems()
                        .into_iter()
                        .map(|problem| format!("{label}: {problem}")),
                );
                questions.push(Question {
                    id: Id::new(),
                    form_id,
                    section_id,
                    question_text: question.question_text,
                    question_description: question.question_description,
                    kind: question.kind,
                    required: question.required,
                    order: question_order,
                });
            }

            sections.push(Section {
                id: section_id,
                form_id,
                title: section.title,
                description: section.description,
                config: section.config,
                order,
            });
        }

        if !problems.is_empty() {
            return Err(Error::validation(problems));
        }

        Ok(FormEdit {
            meta: FormMeta {
                title: self.title,
                description: self.description,
                config: self.config,
                metadata: self.metadata,
                deadline: self.deadline,
            },
            sections,
            questions,
            group_ids: unique_ids(self.group_ids),
        })
    }
}

/// The ID of a newly created entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub id: Id,
}

/// An API-friendly form description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDescription {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub config: Document,
    pub metadata: Document,
    pub deadline: Option<DateTime<Utc>>,
    pub created_by: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Form> for FormDescription {
    fn from(form: Form) -> Self {
        Self {
            id: form.id,
            title: form.form.title,
            description: form.form.description,
            config: form.form.config,
            metadata: form.form.metadata,
            deadline: form.form.deadline.map(bson::DateTime::to_chrono),
            created_by: form.form.created_by,
            created_at: form.form.created_at,
            updated_at: form.form.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDescription {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub config: SectionConfig,
    pub order: u32,
}

impl From<Section> for SectionDescription {
    fn from(section: Section) -> Self {
        Self {
            id: section.id,
            title: section.title,
            description: section.description,
            config: section.config,
            order: section.order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDescription {
    pub id: Id,
    pub section_id: Id,
    pub question_text: String,
    pub question_description: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub required: bool,
    pub order: u32,
}

impl From<Question> for QuestionDescription {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            section_id: question.section_id,
            question_text: question.question_text,
            question_description: question.question_description,
            kind: question.kind,
            required: question.required,
            order: question.order,
        }
    }
}

/// A form with all of its content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDetail {
    pub form: FormDescription,
    pub sections: Vec<SectionDescription>,
    pub questions: Vec<QuestionDescription>,
}

impl FormDetail {
    pub fn new(form: Form, sections: Vec<Section>, questions: Vec<Question>) -> Self {
        Self {
            form: form.into(),
            sections: sections.into_iter().map(Into::into).collect(),
            questions: questions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormList {
    pub forms: Vec<FormDescription>,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use crate::model::common::question::{ChoiceConfig, NoConfig, ScaleConfig, TextConfig};

    use super::*;

    impl NewFormRequest {
        pub fn example() -> Self {
            Self {
                title: "Quiz 1".to_string(),
                description: "Weekly check-in".to_string(),
                config: Document::new(),
            }
        }
    }

    impl FormEditRequest {
        pub fn example() -> Self {
            Self {
                title: "Quiz 1".to_string(),
                description: "Weekly check-in, revised".to_string(),
                config: Document::new(),
                metadata: Document::new(),
                deadline: None,
                sections: vec![SectionSpec::example1(), SectionSpec::example2()],
                group_ids: Vec::new(),
            }
        }
    }

    impl SectionSpec {
        pub fn example1() -> Self {
            Self {
                title: "About you".to_string(),
                description: String::new(),
                config: SectionConfig::default(),
                questions: vec![
                    QuestionSpec {
                        question_text: "Welcome!".to_string(),
                        question_description: None,
                        kind: QuestionKind::ContentBlock(NoConfig {}),
                        required: false,
                    },
                    QuestionSpec {
                        question_text: "Your name".to_string(),
                        question_description: None,
                        kind: QuestionKind::ShortText(TextConfig::default()),
                        required: true,
                    },
                ],
            }
        }

        pub fn example2() -> Self {
            Self {
                title: "Feedback".to_string(),
                description: "How was the week?".to_string(),
                config: SectionConfig::default(),
                questions: vec![
                    QuestionSpec {
                        question_text: "Favourite colour".to_string(),
                        question_description: Some("Pick one".to_string()),
                        kind: QuestionKind::Radio(ChoiceConfig::example()),
                        required: false,
                    },
                    QuestionSpec {
                        question_text: "Rating".to_string(),
                        question_description: None,
                        kind: QuestionKind::LinearScale(ScaleConfig::default()),
                        required: true,
                    },
                ],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::{self, json};

    use crate::model::common::question::{ChoiceConfig, NoConfig, TextConfig};

    use super::*;

    #[test]
    fn new_form_title_is_checked() {
        let owner = Id::new();
        let form = NewFormRequest::example().into_form(owner).unwrap();
        assert_eq!(form.title, "Quiz 1");
        assert_eq!(form.created_by, owner);

        let mut request = NewFormRequest::example();
        request.title = "   ".to_string();
        assert!(request.into_form(owner).is_err());

        let mut request = NewFormRequest::example();
        request.title = "x".repeat(256);
        assert!(request.into_form(owner).is_err());
    }

    #[test]
    fn edit_assigns_positions() {
        let form_id = Id::new();
        let edit = FormEditRequest::example().into_edit(form_id).unwrap();

        assert_eq!(
            edit.sections.iter().map(|s| s.order).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(edit.sections.iter().all(|s| s.form_id == form_id));
        assert_eq!(
            edit.questions.iter().map(|q| q.order).collect::<Vec<_>>(),
            vec![1, 2, 1, 2]
        );
        assert_eq!(edit.questions[1].section_id, edit.sections[0].id);
        assert_eq!(edit.questions[2].section_id, edit.sections[1].id);
    }

    #[test]
    fn edit_reports_every_problem() {
        let mut request = FormEditRequest::example();
        request.title = String::new();
        request.sections[1].title = String::new();
        request.sections[1].questions[0].kind = QuestionKind::Dropdown(ChoiceConfig::default());

        let err = request.into_edit(Id::new()).unwrap_err();
        assert_eq!(
            err.public_message(),
            "title must be between 1 and 255 characters, \
             section 2: title must be between 1 and 255 characters, \
             section 2, question 1: at least one option is required"
        );
    }

    #[test]
    fn edit_request_from_json() {
        let group_id = Id::new();
        let request: FormEditRequest = serde_json::from_value(json!({
            "title": "Survey",
            "deadline": "2030-01-01T00:00:00Z",
            "sections": [{
                "title": "Only",
                "questions": [{
                    "question_text": "When?",
                    "type": "DATE",
                    "config": {},
                    "required": true
                }]
            }],
            "group_ids": [group_id, group_id]
        }))
        .unwrap();

        let edit = request.into_edit(Id::new()).unwrap();
        assert_eq!(edit.meta.description, "");
        assert!(edit.meta.deadline.is_some());
        assert_eq!(edit.questions.len(), 1);
        assert!(edit.questions[0].required);
        assert_eq!(edit.group_ids, vec![group_id]);
    }

    #[test]
    fn questions_without_config() {
        let request: FormEditRequest = serde_json::from_value(json!({
            "title": "Survey",
            "sections": [{
                "title": "Only",
                "questions": [
                    { "question_text": "When?", "type": "DATE", "required": true },
                    { "question_text": "Who?", "type": "SHORT_TEXT" },
                    { "question_text": "Which?", "type": "DROPDOWN" }
                ]
            }]
        }))
        .unwrap();
        assert_eq!(request.sections[0].questions[0].kind, QuestionKind::Date(NoConfig {}));
        assert_eq!(
            request.sections[0].questions[1].kind,
            QuestionKind::ShortText(TextConfig::default())
        );

        // Only the choice question lacks a usable configuration.
        let err = request.into_edit(Id::new()).unwrap_err();
        assert_eq!(
            err.public_message(),
            "section 1, question 3: at least one option is required"
        );
    }
}
