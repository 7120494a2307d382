use super::response::{FormOrJson, MutationReply, ResponseMode};
use super::{ApiError, AppState};
use crate::accounts::{LoginInput, ProfileUpdate, RegisterInput};
use crate::database::models::UserRecord;
use crate::error::ServiceError;
use crate::session::token_from_cookie_header;
use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// The signed-in user. Rejects with 401 for JSON clients and a redirect to
/// `/login` for browsers.
pub struct CurrentUser(pub UserRecord);

/// The signed-in user, if any. Never rejects on a missing session.
pub struct MaybeUser(pub Option<UserRecord>);

fn session_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header)
}

fn lookup_user(parts: &Parts, state: &AppState) -> Result<Option<UserRecord>, ApiError> {
    let token = session_token(parts);
    match state
        .sessions
        .resolve_user(&state.accounts(), token.as_deref())
    {
        Ok(user) => Ok(Some(user)),
        Err(ServiceError::Unauthorized) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match lookup_user(parts, state)? {
            Some(user) => Ok(CurrentUser(user)),
            None => match ResponseMode::from_headers(&parts.headers) {
                ResponseMode::Json => Err(ApiError::Unauthorized),
                ResponseMode::Redirect => Err(ApiError::LoginRequired),
            },
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(lookup_user(parts, state)?))
    }
}

pub(crate) async fn register(
    State(state): State<AppState>,
    mode: ResponseMode,
    FormOrJson(input): FormOrJson<RegisterInput>,
) -> Result<MutationReply, ApiError> {
    let user = state.accounts().register(input)?;
    Ok(mode.reply(
        "/login",
        json!({ "id": user.id, "username": user.username }),
    ))
}

pub(crate) async fn login(
    State(state): State<AppState>,
    mode: ResponseMode,
    FormOrJson(input): FormOrJson<LoginInput>,
) -> Result<Response, ApiError> {
    let user = match state.accounts().login(input) {
        Ok(user) => user,
        Err(ServiceError::Unauthorized) if mode == ResponseMode::Redirect => {
            return Ok(MutationReply::Redirect("/login?error=1".into()).into_response());
        }
        Err(err) => return Err(err.into()),
    };
    let cookie = state
        .sessions
        .session_cookie(state.sessions.issue(user.id));
    tracing::info!(user_id = user.id, "user logged in");
    let reply = mode.reply(
        "/",
        json!({ "status": "ok", "id": user.id, "username": user.username }),
    );
    Ok(([(SET_COOKIE, cookie.to_string())], reply).into_response())
}

pub(crate) async fn logout(State(state): State<AppState>, mode: ResponseMode) -> Response {
    let cookie = state.sessions.removal_cookie();
    let reply = mode.reply("/", json!({ "status": "ok" }));
    ([(SET_COOKIE, cookie.to_string())], reply).into_response()
}

pub(crate) async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    FormOrJson(update): FormOrJson<ProfileUpdate>,
) -> Result<MutationReply, ApiError> {
    let updated = state.accounts().update_profile(user.id, update)?;
    Ok(mode.reply(
        "/profile",
        json!({
            "id": updated.id,
            "username": updated.username,
            "email": updated.email,
            "updated_at": updated.updated_at,
        }),
    ))
}
