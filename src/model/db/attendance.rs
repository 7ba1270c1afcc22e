use mongodb::{bson::doc, options::FindOptions, Database};
use rocket::futures::TryStreamExt;

use crate::error::Result;
use crate::model::{
    api::attendance::{AttendanceReport, GroupAttendance},
    db::{
        assignment::Assignment,
        form::Form,
        group::{Group, Membership},
        response::Response,
    },
    mongodb::{ids_from_bson, Coll, Id},
};

impl AttendanceReport {
    /// Per-group submission counts for a form, over every group it is
    /// assigned to. Members are counted once per group they belong to.
    pub async fn for_form(db: &Database, form_id: Id) -> Result<AttendanceReport> {
        Form::find(db, form_id).await?;

        let group_ids = Assignment::group_ids_of(db, form_id).await?;
        let by_name = FindOptions::builder()
            .sort(doc! { "name": 1, "_id": 1 })
            .build();
        let groups: Vec<Group> = Coll::<Group>::from_db(db)
            .find(doc! { "_id": { "$in": group_ids } }, by_name)
            .await?
            .try_collect()
            .await?;

        let memberships = Coll::<Membership>::from_db(db);
        let responses = Coll::<Response>::from_db(db);
        let mut rows = Vec::with_capacity(groups.len());
        for group in groups {
            let members = ids_from_bson(
                memberships
                    .distinct("user_id", doc! { "group_id": group.id }, None)
                    .await?,
            );
            let total_assigned = members.len() as u64;
            let submitted = if members.is_empty() {
                0
            } else {
                responses
                    .count_documents(
                        doc! { "form_id": form_id, "responder_id": { "$in": members } },
                        None,
                    )
                    .await?
            };
            rows.push(GroupAttendance::new(
                group.id,
                group.group.name,
                total_assigned,
                submitted,
            ));
        }

        debug!("Computed attendance of form {form_id} over {} groups", rows.len());
        Ok(AttendanceReport::new(rows))
    }
}
