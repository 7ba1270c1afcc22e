use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::Result,
    model::api::auth::{AuthToken, Principal, SessionRequest, AUTH_TOKEN_COOKIE},
};

use super::{parse_body, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![open_session, whoami, logout]
}

/// Exchange a token from the identity provider for a session cookie.
#[post("/auth/session", data = "<request>", format = "json")]
pub async fn open_session(
    request: JsonBody<'_, SessionRequest>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
) -> Result<Json<Principal>> {
    let request = parse_body(request)?;
    let (token, not_after) = AuthToken::verify(&request.token, config)?;
    info!("Opened session for user {} ({})", token.id, token.role);

    let principal = token.principal.clone();
    cookies.add_private(token.into_cookie(config, not_after));
    Ok(Json(principal))
}

#[get("/auth/me")]
pub fn whoami(token: AuthToken) -> Json<Principal> {
    Json(token.principal)
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove_private(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

/// Open a session on the test client as the given user, replacing any
/// previous one.
#[cfg(test)]
pub(crate) async fn login_as(client: &rocket::local::asynchronous::Client, principal: Principal) {
    let config = client.rocket().state::<Config>().unwrap();
    let request = SessionRequest {
        token: AuthToken::new(principal).encode(config),
    };
    let response = client
        .post(uri!(open_session))
        .header(rocket::http::ContentType::JSON)
        .body(rocket::serde::json::serde_json::to_string(&request).unwrap())
        .dispatch()
        .await;
    assert_eq!(Status::Ok, response.status());
}
