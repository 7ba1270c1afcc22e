use mongodb::Database;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            response::{AssignedForm, OwnResponses, ResponseDescription, ResponseRequest},
        },
        db::response::Response,
        mongodb::Id,
    },
};

use super::{parse_body, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![
        submit_response,
        update_response,
        own_responses,
        assigned_forms,
    ]
}

#[post("/forms/<form_id>/responses", data = "<request>", format = "json")]
pub async fn submit_response(
    token: AuthToken,
    form_id: Id,
    request: JsonBody<'_, ResponseRequest>,
    db: &State<Database>,
) -> Result<(Status, Json<ResponseDescription>)> {
    let answers = parse_body(request)?.answers;
    let response = Response::submit(db, form_id, token.id, answers).await?;
    Ok((Status::Created, Json(response.into())))
}

#[put("/forms/<form_id>/responses", data = "<request>", format = "json")]
pub async fn update_response(
    token: AuthToken,
    form_id: Id,
    request: JsonBody<'_, ResponseRequest>,
    db: &State<Database>,
) -> Result<Json<ResponseDescription>> {
    let answers = parse_body(request)?.answers;
    let response = Response::update(db, form_id, token.id, answers).await?;
    Ok(Json(response.into()))
}

#[get("/forms/<form_id>/responses")]
pub async fn own_responses(
    token: AuthToken,
    form_id: Id,
    db: &State<Database>,
) -> Result<Json<OwnResponses>> {
    let responses = Response::own(db, form_id, token.id).await?;
    Ok(Json(OwnResponses {
        responses: responses.into_iter().map(Into::into).collect(),
    }))
}

#[get("/users/me/forms")]
pub async fn assigned_forms(
    token: AuthToken,
    db: &State<Database>,
) -> Result<Json<Vec<AssignedForm>>> {
    let mut rows = Response::assigned_forms(db, token.id)
        .await?
        .into_iter()
        .map(|(form, submitted_at)| AssignedForm::new(form, submitted_at))
        .collect::<Vec<_>>();
    rows.sort_by(AssignedForm::dashboard_order);
    Ok(Json(rows))
}
