use mongodb::{Client, Database};
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            form::Created,
            group::{
                AddMembersRequest, GroupDetail, GroupList, MembersAdded, NewGroupRequest,
                RemoveMemberRequest,
            },
        },
        db::group::Group,
        mongodb::Id,
    },
};

use super::{parse_body, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![
        create_group,
        list_groups,
        get_group,
        add_members,
        remove_member,
    ]
}

#[post("/groups", data = "<request>", format = "json")]
pub async fn create_group(
    token: AuthToken,
    request: JsonBody<'_, NewGroupRequest>,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<(Status, Json<Created>)> {
    let (new_group, member_ids) = parse_body(request)?.into_group(token.id)?;
    let group = Group::create_with_members(db, db_client, new_group, member_ids).await?;
    Ok((Status::Created, Json(Created { id: group.id })))
}

#[get("/groups")]
pub async fn list_groups(_token: AuthToken, db: &State<Database>) -> Result<Json<GroupList>> {
    let groups = Group::list(db).await?;
    Ok(Json(GroupList {
        groups: groups.into_iter().map(Into::into).collect(),
    }))
}

#[get("/groups/<group_id>")]
pub async fn get_group(
    _token: AuthToken,
    group_id: Id,
    db: &State<Database>,
) -> Result<Json<GroupDetail>> {
    let group = Group::find(db, group_id).await?;
    let members = group.members(db).await?;
    Ok(Json(GroupDetail {
        group: group.into(),
        members: members.into_iter().map(Into::into).collect(),
    }))
}

#[post("/groups/<group_id>/members", data = "<request>", format = "json")]
pub async fn add_members(
    _token: AuthToken,
    group_id: Id,
    request: JsonBody<'_, AddMembersRequest>,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<Json<MembersAdded>> {
    let request = parse_body(request)?;
    if request.user_ids.is_empty() {
        return Err(Error::validation(["user_ids must not be empty"]));
    }
    let role = request.role.unwrap_or_default();
    let added = Group::add_members(db, db_client, group_id, request.user_ids, role).await?;
    Ok(Json(MembersAdded { added }))
}

#[delete("/groups/<group_id>/members", data = "<request>", format = "json")]
pub async fn remove_member(
    _token: AuthToken,
    group_id: Id,
    request: JsonBody<'_, RemoveMemberRequest>,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<()> {
    let request = parse_body(request)?;
    Group::remove_member(db, db_client, group_id, request.user_id).await
}
