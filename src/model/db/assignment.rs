use chrono::{DateTime, Utc};
use mongodb::{
    bson::{self, doc, serde_helpers::chrono_datetime_as_bson_datetime},
    options::UpdateOptions,
    Client, ClientSession, Database,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::{form::Form, group::Group},
    mongodb::{ids_from_bson, retry_transient, unique_ids, Coll, Id},
};

/// A form assigned to a group. At most one per (form, group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub form_id: Id,
    pub group_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub assigned_at: DateTime<Utc>,
}

impl Assignment {
    /// Assign a form to groups on behalf of its owner. Groups it is already
    /// assigned to are left alone. Returns the number of distinct groups the
    /// form is now assigned to from the request.
    pub async fn assign(
        db: &Database,
        db_client: &Client,
        form_id: Id,
        caller: Id,
        group_ids: Vec<Id>,
    ) -> Result<u64> {
        if group_ids.is_empty() {
            return Err(Error::validation(["group_ids must not be empty"]));
        }
        let group_ids = &group_ids;
        retry_transient("form assignment", move || {
            Self::assign_once(db, db_client, form_id, caller, group_ids)
        })
        .await
    }

    async fn assign_once(
        db: &Database,
        db_client: &Client,
        form_id: Id,
        caller: Id,
        group_ids: &[Id],
    ) -> Result<u64> {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let form = Coll::<Form>::from_db(db)
            .find_one_with_session(form_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Form {form_id}")))?;
        form.owned_by(caller)?;

        let assigned = Self::assign_with_session(db, form_id, group_ids, &mut session).await?;

        session.commit_transaction().await?;
        Ok(assigned)
    }

    /// Upsert the assignments of a form to the given groups within an open
    /// transaction. Every group must exist.
    pub async fn assign_with_session(
        db: &Database,
        form_id: Id,
        group_ids: &[Id],
        session: &mut ClientSession,
    ) -> Result<u64> {
        let group_ids = unique_ids(group_ids.iter().copied());

        let found = Coll::<Group>::from_db(db)
            .distinct_with_session(
                "_id",
                doc! { "_id": { "$in": group_ids.clone() } },
                None,
                &mut *session,
            )
            .await?;
        let found = ids_from_bson(found);
        let missing = group_ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| format!("Group {id} does not exist"))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(Error::NotFound(missing.join(", ")));
        }

        let assignments = Coll::<Assignment>::from_db(db);
        let upsert = UpdateOptions::builder().upsert(true).build();
        let mut created = 0;
        for group_id in &group_ids {
            let filter = doc! { "form_id": form_id, "group_id": *group_id };
            let update = doc! {
                "$setOnInsert": { "assigned_at": bson::DateTime::now() }
            };
            let result = assignments
                .update_one_with_session(filter, update, upsert.clone(), &mut *session)
                .await?;
            if result.upserted_id.is_some() {
                created += 1;
            }
        }

        info!(
            "Assigned form {form_id} to {} groups ({created} new)",
            group_ids.len()
        );
        Ok(group_ids.len() as u64)
    }

    /// The groups a form is assigned to. Only the form's owner may ask.
    pub async fn group_ids_for(db: &Database, form_id: Id, caller: Id) -> Result<Vec<Id>> {
        Form::find(db, form_id).await?.owned_by(caller)?;
        Self::group_ids_of(db, form_id).await
    }

    /// The groups a form is assigned to, without access checks.
    pub async fn group_ids_of(db: &Database, form_id: Id) -> Result<Vec<Id>> {
        let mut group_ids = ids_from_bson(
            Coll::<Assignment>::from_db(db)
                .distinct("group_id", doc! { "form_id": form_id }, None)
                .await?,
        );
        group_ids.sort();
        Ok(group_ids)
    }
}
