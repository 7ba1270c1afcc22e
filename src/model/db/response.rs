use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use mongodb::{
    bson::{self, doc, serde_helpers::chrono_datetime_as_bson_datetime},
    Database,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::answer::Answers,
    db::{
        assignment::Assignment,
        form::{Form, Question},
        group::Membership,
    },
    mongodb::{ids_from_bson, is_duplicate_key_error, serde_string_map, Coll, Id},
};

/// A user's answers to a form. At most one per (form, responder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub form_id: Id,
    pub responder_id: Id,
    #[serde(with = "serde_string_map")]
    pub answers: Answers,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// The current time, truncated to the precision the database stores.
fn now_millis() -> DateTime<Utc> {
    bson::DateTime::now().to_chrono()
}

impl Response {
    /// Record a user's first response to a form.
    ///
    /// Uniqueness is enforced by the database, so of two concurrent
    /// submissions exactly one succeeds and the other is a conflict.
    pub async fn submit(
        db: &Database,
        form_id: Id,
        responder_id: Id,
        answers: Answers,
    ) -> Result<Response> {
        let now = now_millis();
        Self::check_against_form(db, form_id, &answers, now).await?;

        let response = Response {
            form_id,
            responder_id,
            answers,
            submitted_at: now,
            updated_at: now,
        };
        match Coll::<Response>::from_db(db).insert_one(&response, None).await {
            Ok(_) => {
                info!("User {responder_id} responded to form {form_id}");
                Ok(response)
            }
            Err(e) if is_duplicate_key_error(&e) => Err(Error::Conflict(format!(
                "User {responder_id} has already responded to form {form_id}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the answers of an existing response.
    pub async fn update(
        db: &Database,
        form_id: Id,
        responder_id: Id,
        answers: Answers,
    ) -> Result<Response> {
        let now = now_millis();
        Self::check_against_form(db, form_id, &answers, now).await?;

        let filter = doc! { "form_id": form_id, "responder_id": responder_id };
        let previous = Coll::<Response>::from_db(db)
            .find_one(filter, None)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!("Response to form {form_id} by user {responder_id}"))
            })?;

        let updated = Self::overwrite(db, previous, answers, now).await?;
        info!("User {responder_id} updated their response to form {form_id}");
        Ok(updated)
    }

    /// Replace the answers of a stored response. NotFound if the response
    /// has gone since it was read, e.g. because its form was deleted.
    async fn overwrite(
        db: &Database,
        previous: Response,
        answers: Answers,
        now: DateTime<Utc>,
    ) -> Result<Response> {
        let (form_id, responder_id) = (previous.form_id, previous.responder_id);
        let filter = doc! { "form_id": form_id, "responder_id": responder_id };
        let updated = Response {
            answers,
            updated_at: next_update_time(previous.updated_at, now),
            ..previous
        };
        Coll::<Response>::from_db(db)
            .find_one_and_replace(filter, &updated, None)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!("Response to form {form_id} by user {responder_id}"))
            })?;
        Ok(updated)
    }

    /// The caller's own responses to a form; there is at most one.
    pub async fn own(db: &Database, form_id: Id, responder_id: Id) -> Result<Vec<Response>> {
        let responses = Coll::<Response>::from_db(db)
            .find(
                doc! { "form_id": form_id, "responder_id": responder_id },
                None,
            )
            .await?
            .try_collect()
            .await?;
        Ok(responses)
    }

    /// Every form assigned to a group the user belongs to, once each, with
    /// the time the user responded to it if they have.
    pub async fn assigned_forms(
        db: &Database,
        user_id: Id,
    ) -> Result<Vec<(Form, Option<DateTime<Utc>>)>> {
        let group_ids = ids_from_bson(
            Coll::<Membership>::from_db(db)
                .distinct("group_id", doc! { "user_id": user_id }, None)
                .await?,
        );
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let form_ids = ids_from_bson(
            Coll::<Assignment>::from_db(db)
                .distinct("form_id", doc! { "group_id": { "$in": group_ids } }, None)
                .await?,
        );
        if form_ids.is_empty() {
            return Ok(Vec::new());
        }

        let forms: Vec<Form> = Coll::<Form>::from_db(db)
            .find(doc! { "_id": { "$in": form_ids.clone() } }, None)
            .await?
            .try_collect()
            .await?;
        let submitted: HashMap<Id, DateTime<Utc>> = Coll::<Response>::from_db(db)
            .find(
                doc! { "responder_id": user_id, "form_id": { "$in": form_ids } },
                None,
            )
            .await?
            .map_ok(|response| (response.form_id, response.submitted_at))
            .try_collect()
            .await?;

        Ok(forms
            .into_iter()
            .map(|form| {
                let submitted_at = submitted.get(&form.id).copied();
                (form, submitted_at)
            })
            .collect())
    }

    /// Check the form exists, is still open, and the answers fit its questions.
    async fn check_against_form(
        db: &Database,
        form_id: Id,
        answers: &Answers,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let form = Form::find(db, form_id).await?;
        if form.is_closed(now) {
            return Err(Error::validation([format!(
                "The deadline for form {form_id} has passed"
            )]));
        }
        let questions: Vec<Question> = Coll::<Question>::from_db(db)
            .find(doc! { "form_id": form_id }, None)
            .await?
            .try_collect()
            .await?;
        check_answers(&questions, answers)
    }
}

/// A timestamp for an update that is strictly later than the previous one,
/// even when both land in the same millisecond.
fn next_update_time(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

/// Check a set of answers against the questions of a form, reporting every
/// problem at once.
pub fn check_answers(questions: &[Question], answers: &Answers) -> Result<()> {
    let mut problems = Vec::new();

    let mut unknown = answers
        .keys()
        .filter(|id| !questions.iter().any(|question| question.id == **id))
        .collect::<Vec<_>>();
    unknown.sort();
    for id in unknown {
        problems.push(format!("question {id} is not part of this form"));
    }

    for question in questions {
        let text = &question.question_text;
        match answers.get(&question.id) {
            Some(_) if !question.kind.is_answerable() => {
                problems.push(format!("'{text}' cannot be answered"));
            }
            Some(answer) if !answer.is_empty() => {
                if let Err(msg) = question.kind.check_answer(answer) {
                    problems.push(format!("'{text}': {msg}"));
                }
            }
            _ => {
                if question.required && question.kind.is_answerable() {
                    problems.push(format!("'{text}' is required"));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(problems))
    }
}
