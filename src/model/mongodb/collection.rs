use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    assignment::Assignment,
    form::{Form, NewForm, Question, Section},
    group::{Group, Membership, NewGroup},
    response::Response,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Form catalog collections
const FORMS: &str = "forms";
impl MongoCollection for Form {
    const NAME: &'static str = FORMS;
}
impl MongoCollection for NewForm {
    const NAME: &'static str = FORMS;
}

const SECTIONS: &str = "sections";
impl MongoCollection for Section {
    const NAME: &'static str = SECTIONS;
}

const QUESTIONS: &str = "questions";
impl MongoCollection for Question {
    const NAME: &'static str = QUESTIONS;
}

// Group registry collections
const GROUPS: &str = "groups";
impl MongoCollection for Group {
    const NAME: &'static str = GROUPS;
}
impl MongoCollection for NewGroup {
    const NAME: &'static str = GROUPS;
}

const MEMBERSHIPS: &str = "memberships";
impl MongoCollection for Membership {
    const NAME: &'static str = MEMBERSHIPS;
}

// Assignment collection
const ASSIGNMENTS: &str = "assignments";
impl MongoCollection for Assignment {
    const NAME: &'static str = ASSIGNMENTS;
}

// Response collection
const RESPONSES: &str = "responses";
impl MongoCollection for Response {
    const NAME: &'static str = RESPONSES;
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique indexes are what actually enforce one response per responder,
/// one membership per user, and one assignment per group. Creating an index
/// also creates its collection, which transactions need on older servers.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Form collection: "my forms" listing.
    let form_index = IndexModel::builder()
        .keys(doc! {"created_by": 1, "updated_at": -1})
        .build();
    Coll::<Form>::from_db(db)
        .create_index(form_index, None)
        .await?;

    // Section collection: one section per position within a form.
    let section_index = IndexModel::builder()
        .keys(doc! {"form_id": 1, "order": 1})
        .options(unique.clone())
        .build();
    Coll::<Section>::from_db(db)
        .create_index(section_index, None)
        .await?;

    // Question collection: a form's questions, in order.
    let question_index = IndexModel::builder()
        .keys(doc! {"form_id": 1, "section_id": 1, "order": 1})
        .build();
    Coll::<Question>::from_db(db)
        .create_index(question_index, None)
        .await?;

    // Membership collection.
    let membership_index = IndexModel::builder()
        .keys(doc! {"group_id": 1, "user_id": 1})
        .options(unique.clone())
        .build();
    let member_groups_index = IndexModel::builder().keys(doc! {"user_id": 1}).build();
    Coll::<Membership>::from_db(db)
        .create_indexes([membership_index, member_groups_index], None)
        .await?;

    // Assignment collection.
    let assignment_index = IndexModel::builder()
        .keys(doc! {"form_id": 1, "group_id": 1})
        .options(unique.clone())
        .build();
    let group_forms_index = IndexModel::builder().keys(doc! {"group_id": 1}).build();
    Coll::<Assignment>::from_db(db)
        .create_indexes([assignment_index, group_forms_index], None)
        .await?;

    // Response collection.
    let response_index = IndexModel::builder()
        .keys(doc! {"form_id": 1, "responder_id": 1})
        .options(unique)
        .build();
    Coll::<Response>::from_db(db)
        .create_index(response_index, None)
        .await?;

    Ok(())
}
