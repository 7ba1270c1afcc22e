use mongodb::{Client, Database};
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            form::{Created, FormDetail, FormEditRequest, FormList, NewFormRequest},
        },
        db::form::Form,
        mongodb::Id,
    },
};

use super::{parse_body, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![create_form, list_forms, get_form, edit_form, delete_form]
}

#[post("/forms", data = "<request>", format = "json")]
pub async fn create_form(
    token: AuthToken,
    request: JsonBody<'_, NewFormRequest>,
    db: &State<Database>,
) -> Result<(Status, Json<Created>)> {
    let new_form = parse_body(request)?.into_form(token.id)?;
    let form = Form::create(db, new_form).await?;
    Ok((Status::Created, Json(Created { id: form.id })))
}

#[get("/forms")]
pub async fn list_forms(token: AuthToken, db: &State<Database>) -> Result<Json<FormList>> {
    let forms = Form::list_owned(db, token.id).await?;
    Ok(Json(FormList {
        forms: forms.into_iter().map(Into::into).collect(),
    }))
}

#[get("/forms/<form_id>")]
pub async fn get_form(
    _token: AuthToken,
    form_id: Id,
    db: &State<Database>,
) -> Result<Json<FormDetail>> {
    let form = Form::find(db, form_id).await?;
    let (sections, questions) = form.content(db).await?;
    Ok(Json(FormDetail::new(form, sections, questions)))
}

#[post("/forms/<form_id>", data = "<request>", format = "json")]
pub async fn edit_form(
    token: AuthToken,
    form_id: Id,
    request: JsonBody<'_, FormEditRequest>,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<()> {
    let edit = parse_body(request)?.into_edit(form_id)?;
    Form::replace_content(db, db_client, form_id, token.id, edit).await
}

#[delete("/forms/<form_id>")]
pub async fn delete_form(
    token: AuthToken,
    form_id: Id,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<()> {
    Form::delete(db, db_client, form_id, token.id).await
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use mongodb::bson::doc;
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::api::{
        auth::login_as,
        testing::{
            assert_no_matches, assign, body, count_matches, create_form, create_group, edit_form,
            of_form, post_json, submit_expect_status,
        },
    };
    use crate::error::{ErrorBody, ErrorKind};
    use crate::model::{
        api::{
            auth::Principal,
            form::{FormEditRequest, SectionSpec},
        },
        common::{answer::Answer, question::QuestionKind},
        db::{
            assignment::Assignment,
            form::{Question, Section},
            response::Response,
        },
        mongodb::Coll,
    };

    use super::*;

    #[backend_test(user)]
    async fn create_and_get_form(client: Client, db: Database) {
        let form_id = create_form(&client).await;

        let response = client.get(uri!(get_form(form_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let detail: FormDetail = body(response).await;
        assert_eq!(detail.form.id, form_id);
        assert_eq!(detail.form.title, "Quiz 1");
        assert_eq!(detail.form.created_by, Principal::example().id);
        assert!(detail.sections.is_empty());
        assert!(detail.questions.is_empty());

        // Readable by anyone signed in.
        login_as(&client, Principal::example2()).await;
        let response = client.get(uri!(get_form(form_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        assert_eq!(count_matches::<Form>(&db, doc! {}).await, 1);
    }

    #[backend_test(user)]
    async fn bad_create_form(client: Client, db: Database) {
        // Empty title.
        let response = post_json(&client, "/forms".to_string(), &json!({ "title": "" })).await;
        assert_eq!(Status::BadRequest, response.status());
        let error: ErrorBody = body(response).await;
        assert_eq!(error.kind, ErrorKind::ValidationError);

        // Overlong title.
        let request = json!({ "title": "x".repeat(256) });
        let response = post_json(&client, "/forms".to_string(), &request).await;
        assert_eq!(Status::BadRequest, response.status());

        // Not even JSON.
        let response = client
            .post(uri!(create_form))
            .header(ContentType::JSON)
            .body("{ title")
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        assert_no_matches::<Form>(&db, doc! {}).await;
    }

    #[backend_test]
    async fn create_form_requires_session(client: Client, db: Database) {
        let response = post_json(&client, "/forms".to_string(), &json!({ "title": "Quiz" })).await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_no_matches::<Form>(&db, doc! {}).await;
    }

    #[backend_test(user)]
    async fn list_own_forms(client: Client) {
        let first = create_form(&client).await;
        let second = create_form(&client).await;
        login_as(&client, Principal::example2()).await;
        create_form(&client).await;
        login_as(&client, Principal::example()).await;

        // Edit the first so it becomes the most recently updated.
        edit_form(&client, first, &FormEditRequest::example()).await;

        let response = client.get(uri!(list_forms)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let list: FormList = body(response).await;
        let ids = list.forms.iter().map(|f| f.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![first, second]);
    }

    #[backend_test(user)]
    async fn edit_replaces_content(client: Client, db: Database) {
        let form_id = create_form(&client).await;
        edit_form(&client, form_id, &FormEditRequest::example()).await;

        let detail: FormDetail = body(client.get(uri!(get_form(form_id))).dispatch().await).await;
        assert_eq!(detail.form.description, "Weekly check-in, revised");
        let titles = detail
            .sections
            .iter()
            .map(|s| (s.order, s.title.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(titles, vec![(1, "About you"), (2, "Feedback")]);
        let questions = detail
            .questions
            .iter()
            .map(|q| q.question_text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            questions,
            vec!["Welcome!", "Your name", "Favourite colour", "Rating"]
        );
        assert!(matches!(
            detail.questions[2].kind,
            QuestionKind::Radio(_)
        ));

        // A second edit replaces rather than accumulates.
        let mut edit = FormEditRequest::example();
        edit.sections = vec![SectionSpec::example2()];
        edit_form(&client, form_id, &edit).await;
        assert_eq!(count_matches::<Section>(&db, of_form(form_id)).await, 1);
        assert_eq!(count_matches::<Question>(&db, of_form(form_id)).await, 2);

        // No sections leaves the content alone but still updates metadata.
        let mut edit = FormEditRequest::example();
        edit.title = "Quiz 1 (final)".to_string();
        edit.sections = Vec::new();
        edit_form(&client, form_id, &edit).await;
        let detail: FormDetail = body(client.get(uri!(get_form(form_id))).dispatch().await).await;
        assert_eq!(detail.form.title, "Quiz 1 (final)");
        assert_eq!(detail.sections.len(), 1);
        assert_eq!(detail.sections[0].title, "Feedback");
        assert_eq!(detail.questions.len(), 2);
    }

    #[backend_test(user)]
    async fn edit_with_groups(client: Client, db: Database) {
        let form_id = create_form(&client).await;
        let group_id = create_group(&client, Vec::new()).await;

        let mut edit = FormEditRequest::example();
        edit.group_ids = vec![group_id, group_id];
        edit_form(&client, form_id, &edit).await;
        assert_eq!(count_matches::<Assignment>(&db, of_form(form_id)).await, 1);

        // An unknown group aborts the whole edit.
        let mut edit = FormEditRequest::example();
        edit.description = "Never saved".to_string();
        edit.group_ids = vec![Id::new()];
        let response = post_json(&client, format!("/forms/{form_id}"), &edit).await;
        assert_eq!(Status::NotFound, response.status());
        let form = Form::find(&db, form_id).await.unwrap();
        assert_eq!(form.description, "Weekly check-in, revised");
    }

    #[backend_test(user)]
    async fn bad_edit(client: Client, db: Database) {
        let form_id = create_form(&client).await;

        let mut edit = FormEditRequest::example();
        edit.sections[0].title = String::new();
        let response = post_json(&client, format!("/forms/{form_id}"), &edit).await;
        assert_eq!(Status::BadRequest, response.status());
        let error: ErrorBody = body(response).await;
        assert_eq!(
            error.message,
            "section 1: title must be between 1 and 255 characters"
        );

        // Unknown question type.
        let request = json!({
            "title": "Quiz 1",
            "sections": [{
                "title": "Only",
                "questions": [{ "question_text": "?", "type": "SLIDER", "config": {} }]
            }]
        });
        let response = post_json(&client, format!("/forms/{form_id}"), &request).await;
        assert_eq!(Status::BadRequest, response.status());

        assert_no_matches::<Section>(&db, of_form(form_id)).await;
    }

    #[backend_test(user)]
    async fn only_owner_may_change(client: Client, db: Database) {
        let form_id = create_form(&client).await;

        login_as(&client, Principal::example2()).await;
        let response =
            post_json(&client, format!("/forms/{form_id}"), &FormEditRequest::example()).await;
        assert_eq!(Status::Forbidden, response.status());
        let response = client.delete(uri!(delete_form(form_id))).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());

        assert_no_matches::<Section>(&db, of_form(form_id)).await;
        assert_eq!(count_matches::<Form>(&db, form_id.as_doc()).await, 1);
    }

    #[backend_test(user)]
    async fn missing_form(client: Client) {
        let missing = Id::new();
        let response = client.get(uri!(get_form(missing))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let error: ErrorBody = body(response).await;
        assert_eq!(error.kind, ErrorKind::NotFound);

        let response =
            post_json(&client, format!("/forms/{missing}"), &FormEditRequest::example()).await;
        assert_eq!(Status::NotFound, response.status());
        let response = client.delete(uri!(delete_form(missing))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(user)]
    async fn delete_cascades(client: Client, db: Database) {
        let form_id = create_form(&client).await;
        edit_form(&client, form_id, &FormEditRequest::example()).await;
        let group_id = create_group(&client, vec![Principal::example().id]).await;
        assign(&client, form_id, vec![group_id]).await;

        let name_question = Coll::<Question>::from_db(&db)
            .find_one(doc! { "question_text": "Your name" }, None)
            .await
            .unwrap()
            .unwrap();
        let rating_question = Coll::<Question>::from_db(&db)
            .find_one(doc! { "question_text": "Rating" }, None)
            .await
            .unwrap()
            .unwrap();
        let answers = HashMap::from([
            (name_question.id, Answer::Text("Ada".to_string())),
            (rating_question.id, Answer::Number(5)),
        ]);
        submit_expect_status(&client, form_id, &answers, Status::Created).await;

        let response = client.delete(uri!(delete_form(form_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        assert_no_matches::<Form>(&db, form_id.as_doc()).await;
        assert_no_matches::<Section>(&db, of_form(form_id)).await;
        assert_no_matches::<Question>(&db, of_form(form_id)).await;
        assert_no_matches::<Assignment>(&db, of_form(form_id)).await;
        assert_no_matches::<Response>(&db, of_form(form_id)).await;

        // The group itself survives.
        let response = client.get(format!("/groups/{group_id}")).dispatch().await;
        assert_eq!(Status::Ok, response.status());
    }
}
