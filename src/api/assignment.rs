use mongodb::{Client, Database};
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            assignment::{AssignRequest, AssignResult, AssignedGroups},
            auth::AuthToken,
        },
        db::assignment::Assignment,
        mongodb::Id,
    },
};

use super::{parse_body, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![assign_form, assigned_group_ids]
}

#[post("/assignments", data = "<request>", format = "json")]
pub async fn assign_form(
    token: AuthToken,
    request: JsonBody<'_, AssignRequest>,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<(Status, Json<AssignResult>)> {
    let request = parse_body(request)?;
    let assigned_count =
        Assignment::assign(db, db_client, request.form_id, token.id, request.group_ids).await?;
    Ok((Status::Created, Json(AssignResult { assigned_count })))
}

#[get("/assignments?<form_id>")]
pub async fn assigned_group_ids(
    token: AuthToken,
    form_id: Option<Id>,
    db: &State<Database>,
) -> Result<Json<AssignedGroups>> {
    let form_id = form_id.ok_or_else(|| Error::validation(["form_id must be a valid ID"]))?;
    let group_ids = Assignment::group_ids_for(db, form_id, token.id).await?;
    Ok(Json(AssignedGroups { group_ids }))
}
