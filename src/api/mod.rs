use rocket::{
    http::Status,
    serde::json::{self, Json},
    Catcher, Request, Route,
};

use crate::error::{Error, ErrorBody, ErrorKind, Result};

mod assignment;
mod attendance;
pub(crate) mod auth;
mod form;
mod group;
mod response;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(form::routes());
    routes.extend(group::routes());
    routes.extend(assignment::routes());
    routes.extend(response::routes());
    routes.extend(attendance::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Render failures that never reached a handler (guard failures, unknown
/// routes) in the same shape as every other error.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let kind = match status.code {
        400 | 422 => ErrorKind::ValidationError,
        401 => ErrorKind::Unauthenticated,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        _ => ErrorKind::Internal,
    };
    let message = match kind {
        ErrorKind::Unauthenticated => "Authentication required".to_string(),
        ErrorKind::Internal => "Internal server error".to_string(),
        _ => status.reason().unwrap_or("Request failed").to_string(),
    };
    (kind.status(), Json(ErrorBody { kind, message }))
}

/// A JSON request body that may have failed to parse.
type JsonBody<'r, T> = std::result::Result<Json<T>, json::Error<'r>>;

/// Unwrap a JSON request body, turning malformed bodies into validation
/// errors.
fn parse_body<T>(body: JsonBody<'_, T>) -> Result<T> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(json::Error::Io(e)) => Err(Error::validation([format!("Unreadable body: {e}")])),
        Err(json::Error::Parse(_, e)) => Err(Error::validation([format!("Invalid body: {e}")])),
    }
}

/// Helpers shared by the endpoint tests.
#[cfg(test)]
pub(crate) mod testing {
    use mongodb::{
        bson::{doc, Document},
        Database,
    };
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };
    use serde::{de::DeserializeOwned, Serialize};

    use crate::model::{
        api::{
            form::{Created, FormEditRequest, NewFormRequest},
            group::NewGroupRequest,
        },
        common::answer::Answers,
        mongodb::{Coll, Id, MongoCollection},
    };

    /// Deserialize the JSON body of a response.
    pub async fn body<T: DeserializeOwned>(response: LocalResponse<'_>) -> T {
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    pub async fn post_json<'c, T: Serialize>(
        client: &'c Client,
        uri: String,
        body: &T,
    ) -> LocalResponse<'c> {
        client
            .post(uri)
            .header(ContentType::JSON)
            .body(serde_json::to_string(body).unwrap())
            .dispatch()
            .await
    }

    pub async fn create_form(client: &Client) -> Id {
        let response = post_json(client, "/forms".to_string(), &NewFormRequest::example()).await;
        assert_eq!(Status::Created, response.status());
        body::<Created>(response).await.id
    }

    pub async fn edit_form(client: &Client, form_id: Id, edit: &FormEditRequest) {
        let response = post_json(client, format!("/forms/{form_id}"), edit).await;
        assert_eq!(Status::Ok, response.status());
    }

    pub async fn create_group(client: &Client, member_ids: Vec<Id>) -> Id {
        let request = NewGroupRequest::example(member_ids);
        let response = post_json(client, "/groups".to_string(), &request).await;
        assert_eq!(Status::Created, response.status());
        body::<Created>(response).await.id
    }

    pub async fn assign(client: &Client, form_id: Id, group_ids: Vec<Id>) {
        let request = serde_json::json!({ "form_id": form_id, "group_ids": group_ids });
        let response = post_json(client, "/assignments".to_string(), &request).await;
        assert_eq!(Status::Created, response.status());
    }

    pub async fn submit_expect_status(
        client: &Client,
        form_id: Id,
        answers: &Answers,
        status: Status,
    ) {
        let request = crate::model::api::response::ResponseRequest {
            answers: answers.clone(),
        };
        let response = post_json(client, format!("/forms/{form_id}/responses"), &request).await;
        assert_eq!(status, response.status());
    }

    pub async fn count_matches<T: MongoCollection>(db: &Database, filter: Document) -> u64 {
        Coll::<T>::from_db(db)
            .count_documents(filter, None)
            .await
            .unwrap()
    }

    pub async fn assert_no_matches<T: MongoCollection>(db: &Database, filter: Document) {
        let matches = count_matches::<T>(db, filter).await;
        assert_eq!(matches, 0);
    }

    /// A filter matching everything belonging to a form.
    pub fn of_form(form_id: Id) -> Document {
        doc! { "form_id": form_id }
    }
}
