use mongodb::Database;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{api::attendance::AttendanceReport, api::auth::AuthToken, mongodb::Id},
};

pub fn routes() -> Vec<Route> {
    routes![form_attendance]
}

#[get("/forms/<form_id>/attendance")]
pub async fn form_attendance(
    _token: AuthToken,
    form_id: Id,
    db: &State<Database>,
) -> Result<Json<AttendanceReport>> {
    Ok(Json(AttendanceReport::for_form(db, form_id).await?))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rocket::{http::Status, local::asynchronous::Client};

    use crate::api::{
        auth::login_as,
        testing::{assign, body, create_form, create_group, edit_form, submit_expect_status},
    };
    use crate::model::{
        api::{auth::Principal, form::FormEditRequest},
        common::answer::Answer,
        db::form::Form,
    };

    use super::*;

    #[backend_test(user)]
    async fn one_of_three_submitted(client: Client, db: Database) {
        // "Quiz 1" assigned to "Class A" of three members, one of whom responds.
        let form_id = create_form(&client).await;
        edit_form(&client, form_id, &FormEditRequest::example()).await;
        let members = vec![
            Principal::example().id,
            Principal::example2().id,
            Principal::example3().id,
        ];
        let group_id = create_group(&client, members).await;
        assign(&client, form_id, vec![group_id]).await;

        login_as(&client, Principal::example2()).await;
        let (_, questions) = Form::find(&db, form_id)
            .await
            .unwrap()
            .content(&db)
            .await
            .unwrap();
        let answers = questions
            .iter()
            .filter(|q| q.required)
            .map(|q| match q.question_text.as_str() {
                "Rating" => (q.id, Answer::Number(3)),
                _ => (q.id, Answer::Text("Grace".to_string())),
            })
            .collect::<HashMap<_, _>>();
        submit_expect_status(&client, form_id, &answers, Status::Created).await;

        let report = get_report(&client, form_id).await;
        assert_eq!(report.group_attendance.len(), 1);
        let class_a = &report.group_attendance[0];
        assert_eq!(class_a.group_id, group_id);
        assert_eq!(class_a.group_name, "Class A");
        assert_eq!(class_a.total_assigned, 3);
        assert_eq!(class_a.submitted, 1);
        assert_eq!(class_a.attendance_ratio, 1.0 / 3.0);
        assert_eq!(report.summary.total_users, 3);
        assert_eq!(report.summary.total_submitted, 1);
        assert_eq!(report.summary.overall_ratio, 1.0 / 3.0);
    }

    #[backend_test(user)]
    async fn membership_scoped_counting(client: Client, db: Database) {
        let form_id = create_form(&client).await;
        edit_form(&client, form_id, &FormEditRequest::example()).await;
        let me = Principal::example().id;
        let both = create_group(&client, vec![me, Id::new()]).await;
        let also = create_group(&client, vec![me]).await;
        let empty = create_group(&client, Vec::new()).await;
        assign(&client, form_id, vec![both, also, empty]).await;

        let (_, questions) = Form::find(&db, form_id)
            .await
            .unwrap()
            .content(&db)
            .await
            .unwrap();
        let answers = questions
            .iter()
            .filter(|q| q.required)
            .map(|q| match q.question_text.as_str() {
                "Rating" => (q.id, Answer::Number(5)),
                _ => (q.id, Answer::Text("Ada".to_string())),
            })
            .collect::<HashMap<_, _>>();
        submit_expect_status(&client, form_id, &answers, Status::Created).await;

        let report = get_report(&client, form_id).await;
        let by_group = report
            .group_attendance
            .iter()
            .map(|g| (g.group_id, (g.total_assigned, g.submitted, g.attendance_ratio)))
            .collect::<HashMap<_, _>>();
        assert_eq!(by_group[&both], (2, 1, 0.5));
        assert_eq!(by_group[&also], (1, 1, 1.0));
        assert_eq!(by_group[&empty], (0, 0, 0.0));
        assert_eq!(report.summary.total_users, 3);
        assert_eq!(report.summary.total_submitted, 2);
    }

    #[backend_test(user)]
    async fn unassigned_and_missing_forms(client: Client) {
        let form_id = create_form(&client).await;
        let report = get_report(&client, form_id).await;
        assert!(report.group_attendance.is_empty());
        assert_eq!(report.summary.overall_ratio, 0.0);

        let response = client
            .get(uri!(form_attendance(Id::new())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    async fn get_report(client: &Client, form_id: Id) -> AttendanceReport {
        let response = client.get(uri!(form_attendance(form_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        body(response).await
    }
}
