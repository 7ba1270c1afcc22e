use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{self, doc, serde_helpers::chrono_datetime_as_bson_datetime, Document},
    options::FindOptions,
    Client, Database,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{question::QuestionKind, section::SectionConfig},
    db::{assignment::Assignment, response::Response},
    mongodb::{retry_transient, Coll, Id},
};

/// Core form data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormCore {
    pub title: String,
    pub description: String,
    pub config: Document,
    pub metadata: Document,
    pub deadline: Option<bson::DateTime>,
    pub created_by: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl FormCore {
    /// Has the deadline for responding to this form passed?
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.deadline
            .map_or(false, |deadline| deadline.to_chrono() < now)
    }
}

/// A form without an ID.
pub type NewForm = FormCore;

/// A form from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub form: FormCore,
}

impl Deref for Form {
    type Target = FormCore;

    fn deref(&self) -> &Self::Target {
        &self.form
    }
}

impl DerefMut for Form {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.form
    }
}

/// A titled, ordered part of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "_id")]
    pub id: Id,
    pub form_id: Id,
    pub title: String,
    pub description: String,
    pub config: SectionConfig,
    pub order: u32,
}

/// A question within a section. Carries its form ID too, so a form's
/// questions can be found without going through its sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    pub form_id: Id,
    pub section_id: Id,
    pub question_text: String,
    pub question_description: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub required: bool,
    pub order: u32,
}

/// The editable metadata of a form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormMeta {
    pub title: String,
    pub description: String,
    pub config: Document,
    pub metadata: Document,
    pub deadline: Option<DateTime<Utc>>,
}

/// A validated edit of a form: new metadata, optionally a complete new set
/// of sections and questions, and optionally groups to assign it to.
#[derive(Debug, Clone, PartialEq)]
pub struct FormEdit {
    pub meta: FormMeta,
    pub sections: Vec<Section>,
    pub questions: Vec<Question>,
    pub group_ids: Vec<Id>,
}

impl Form {
    /// Only the creator of a form may change it.
    pub fn owned_by(&self, caller: Id) -> Result<()> {
        if self.created_by == caller {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "Form {} belongs to another user",
                self.id
            )))
        }
    }

    /// Insert a new, empty form.
    pub async fn create(db: &Database, new_form: NewForm) -> Result<Form> {
        let id: Id = Coll::<NewForm>::from_db(db)
            .insert_one(&new_form, None)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB
            .into();
        info!("Created form {id} \"{}\"", new_form.title);
        Ok(Form { id, form: new_form })
    }

    /// Get a form by ID.
    pub async fn find(db: &Database, form_id: Id) -> Result<Form> {
        Coll::<Form>::from_db(db)
            .find_one(form_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Form {form_id}")))
    }

    /// The forms created by the given user, most recently updated first.
    pub async fn list_owned(db: &Database, owner: Id) -> Result<Vec<Form>> {
        let newest_first = FindOptions::builder()
            .sort(doc! { "updated_at": -1, "_id": -1 })
            .build();
        let forms = Coll::<Form>::from_db(db)
            .find(doc! { "created_by": owner }, newest_first)
            .await?
            .try_collect()
            .await?;
        Ok(forms)
    }

    /// The sections of this form in display order, and all their questions,
    /// ordered by section then position within the section.
    pub async fn content(&self, db: &Database) -> Result<(Vec<Section>, Vec<Question>)> {
        let by_order = FindOptions::builder().sort(doc! { "order": 1 }).build();
        let sections: Vec<Section> = Coll::<Section>::from_db(db)
            .find(doc! { "form_id": self.id }, by_order)
            .await?
            .try_collect()
            .await?;

        let mut questions: Vec<Question> = Coll::<Question>::from_db(db)
            .find(doc! { "form_id": self.id }, None)
            .await?
            .try_collect()
            .await?;
        let section_order = |section_id: Id| {
            sections
                .iter()
                .position(|section| section.id == section_id)
                .unwrap_or(usize::MAX)
        };
        questions.sort_by_key(|question| (section_order(question.section_id), question.order));

        Ok((sections, questions))
    }

    /// Overwrite the metadata of a form and, if any are given, replace its
    /// sections and questions wholesale. Optionally assigns the form to
    /// groups as part of the same transaction.
    pub async fn replace_content(
        db: &Database,
        db_client: &Client,
        form_id: Id,
        caller: Id,
        edit: FormEdit,
    ) -> Result<()> {
        let edit = &edit;
        retry_transient("form edit", move || {
            Self::replace_content_once(db, db_client, form_id, caller, edit)
        })
        .await?;
        info!(
            "Updated form {form_id}: {} sections, {} questions, {} groups",
            edit.sections.len(),
            edit.questions.len(),
            edit.group_ids.len()
        );
        Ok(())
    }

    async fn replace_content_once(
        db: &Database,
        db_client: &Client,
        form_id: Id,
        caller: Id,
        edit: &FormEdit,
    ) -> Result<()> {
        let forms = Coll::<Form>::from_db(db);
        let sections = Coll::<Section>::from_db(db);
        let questions = Coll::<Question>::from_db(db);

        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let form = forms
            .find_one_with_session(form_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Form {form_id}")))?;
        form.owned_by(caller)?;

        let meta = &edit.meta;
        let update = doc! {
            "$set": {
                "title": meta.title.as_str(),
                "description": meta.description.as_str(),
                "config": meta.config.clone(),
                "metadata": meta.metadata.clone(),
                "deadline": meta.deadline.map(bson::DateTime::from_chrono),
                "updated_at": bson::DateTime::now(),
            }
        };
        forms
            .update_one_with_session(form_id.as_doc(), update, None, &mut session)
            .await?;

        if !edit.sections.is_empty() {
            let of_form = doc! { "form_id": form_id };
            questions
                .delete_many_with_session(of_form.clone(), None, &mut session)
                .await?;
            sections
                .delete_many_with_session(of_form, None, &mut session)
                .await?;

            sections
                .insert_many_with_session(&edit.sections, None, &mut session)
                .await?;
            if !edit.questions.is_empty() {
                questions
                    .insert_many_with_session(&edit.questions, None, &mut session)
                    .await?;
            }
        }

        if !edit.group_ids.is_empty() {
            Assignment::assign_with_session(db, form_id, &edit.group_ids, &mut session).await?;
        }

        session.commit_transaction().await?;
        Ok(())
    }

    /// Delete a form together with everything that belongs to it.
    pub async fn delete(db: &Database, db_client: &Client, form_id: Id, caller: Id) -> Result<()> {
        let deleted_responses = retry_transient("form deletion", || {
            Self::delete_once(db, db_client, form_id, caller)
        })
        .await?;
        info!("Deleted form {form_id} and {deleted_responses} responses");
        Ok(())
    }

    async fn delete_once(
        db: &Database,
        db_client: &Client,
        form_id: Id,
        caller: Id,
    ) -> Result<u64> {
        let forms = Coll::<Form>::from_db(db);

        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let form = forms
            .find_one_with_session(form_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Form {form_id}")))?;
        form.owned_by(caller)?;

        let of_form = doc! { "form_id": form_id };
        let responses = Coll::<Response>::from_db(db)
            .delete_many_with_session(of_form.clone(), None, &mut session)
            .await?;
        Coll::<Assignment>::from_db(db)
            .delete_many_with_session(of_form.clone(), None, &mut session)
            .await?;
        Coll::<Question>::from_db(db)
            .delete_many_with_session(of_form.clone(), None, &mut session)
            .await?;
        Coll::<Section>::from_db(db)
            .delete_many_with_session(of_form, None, &mut session)
            .await?;
        forms
            .delete_one_with_session(form_id.as_doc(), None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(responses.deleted_count)
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn closed_after_deadline() {
        let now = Utc::now();
        let mut form = FormCore::example(Id::new());
        assert!(!form.is_closed(now));

        form.deadline = Some(bson::DateTime::from_chrono(now + Duration::days(1)));
        assert!(!form.is_closed(now));

        form.deadline = Some(bson::DateTime::from_chrono(now - Duration::minutes(1)));
        assert!(form.is_closed(now));
    }

    #[test]
    fn only_creator_owns() {
        let owner = Id::new();
        let form = Form {
            id: Id::new(),
            form: FormCore::example(owner),
        };
        assert!(form.owned_by(owner).is_ok());
        assert!(matches!(form.owned_by(Id::new()), Err(Error::Forbidden(_))));
    }
}
