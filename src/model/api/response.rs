use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::answer::Answers,
    db::{form::Form, response::Response},
    mongodb::{serde_string_map, Id},
};

/// The answers submitted with a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRequest {
    #[serde(with = "serde_string_map")]
    pub answers: Answers,
}

/// An API-friendly response description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDescription {
    pub form_id: Id,
    pub responder_id: Id,
    #[serde(with = "serde_string_map")]
    pub answers: Answers,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Response> for ResponseDescription {
    fn from(response: Response) -> Self {
        Self {
            form_id: response.form_id,
            responder_id: response.responder_id,
            answers: response.answers,
            submitted_at: response.submitted_at,
            updated_at: response.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnResponses {
    pub responses: Vec<ResponseDescription>,
}

/// A form on a user's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedForm {
    pub form_id: Id,
    pub form_title: String,
    pub deadline: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl AssignedForm {
    pub fn new(form: Form, submitted_at: Option<DateTime<Utc>>) -> Self {
        Self {
            form_id: form.id,
            form_title: form.form.title,
            deadline: form.form.deadline.map(bson::DateTime::to_chrono),
            submitted_at,
        }
    }

    /// Dashboard order: soonest deadline first, forms without one last,
    /// then by title.
    pub fn dashboard_order(&self, other: &Self) -> Ordering {
        let by_deadline = match (self.deadline, other.deadline) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_deadline
            .then_with(|| self.form_title.cmp(&other.form_title))
            .then_with(|| self.form_id.cmp(&other.form_id))
    }
}
