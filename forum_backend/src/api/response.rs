//! How mutation endpoints answer: a small JSON body for API clients, a
//! `303 See Other` back to a page for browsers.

use super::ApiError;
use axum::async_trait;
use axum::extract::{Form, FromRequest, FromRequestParts, Request};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use std::convert::Infallible;

const SEC_FETCH_SITE: &str = "sec-fetch-site";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Json,
    Redirect,
}

impl ResponseMode {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let wants_json = headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.contains("application/json"));
        if wants_json {
            ResponseMode::Json
        } else {
            ResponseMode::Redirect
        }
    }

    /// Picks between redirecting to `location` and returning `body`.
    pub fn reply(self, location: impl Into<String>, body: serde_json::Value) -> MutationReply {
        match self {
            ResponseMode::Json => MutationReply::Json(body),
            ResponseMode::Redirect => MutationReply::Redirect(location.into()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ResponseMode
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ResponseMode::from_headers(&parts.headers))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationReply {
    Redirect(String),
    Json(serde_json::Value),
}

impl IntoResponse for MutationReply {
    fn into_response(self) -> Response {
        match self {
            MutationReply::Redirect(location) => Redirect::to(&location).into_response(),
            MutationReply::Json(body) => Json(body).into_response(),
        }
    }
}

/// Guard for state-changing GET links. Refuses requests the browser marks
/// as started by another site (`Sec-Fetch-Site: cross-site`); a Lax session
/// cookie still rides along on such top-level navigations.
pub struct SameSiteNavigation;

#[async_trait]
impl<S> FromRequestParts<S> for SameSiteNavigation
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if is_cross_site(&parts.headers) {
            tracing::warn!(uri = %parts.uri, "refused cross-site vote link");
            return Err(ApiError::Forbidden("cross-site request refused".into()));
        }
        Ok(SameSiteNavigation)
    }
}

pub(crate) fn is_cross_site(headers: &HeaderMap) -> bool {
    headers
        .get(SEC_FETCH_SITE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().eq_ignore_ascii_case("cross-site"))
        .unwrap_or(false)
}

/// Deserializes the body as JSON when the request says so, otherwise as an
/// urlencoded form.
pub struct FormOrJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_json_request(req.headers()) {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|rej| body_rejection(rej.status(), rej.body_text()))?;
            Ok(FormOrJson(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rej| body_rejection(rej.status(), rej.body_text()))?;
            Ok(FormOrJson(value))
        }
    }
}

pub(crate) fn is_json_request(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().starts_with("application/json"))
        .unwrap_or(false)
}

pub(crate) fn is_multipart_request(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

pub(crate) fn body_rejection(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(text)
    } else {
        ApiError::BadRequest(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(accept: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_str(accept).unwrap());
        headers
    }

    #[test]
    fn json_accept_selects_json_mode() {
        assert_eq!(
            ResponseMode::from_headers(&headers("application/json")),
            ResponseMode::Json
        );
        assert_eq!(
            ResponseMode::from_headers(&headers("text/html, application/json;q=0.9")),
            ResponseMode::Json
        );
        assert_eq!(
            ResponseMode::from_headers(&headers("text/html,*/*")),
            ResponseMode::Redirect
        );
        assert_eq!(ResponseMode::from_headers(&HeaderMap::new()), ResponseMode::Redirect);
    }

    #[test]
    fn reply_follows_mode() {
        let body = json!({"likes": 1, "dislikes": 0});
        assert_eq!(
            ResponseMode::Json.reply("/post/1", body.clone()),
            MutationReply::Json(body.clone())
        );
        assert_eq!(
            ResponseMode::Redirect.reply("/post/1", body),
            MutationReply::Redirect("/post/1".into())
        );
    }

    #[test]
    fn redirect_reply_is_see_other() {
        let response = MutationReply::Redirect("/post/3".into()).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/post/3");
    }

    #[test]
    fn cross_site_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_cross_site(&headers));
        headers.insert(SEC_FETCH_SITE, HeaderValue::from_static("same-origin"));
        assert!(!is_cross_site(&headers));
        headers.insert(SEC_FETCH_SITE, HeaderValue::from_static("none"));
        assert!(!is_cross_site(&headers));
        headers.insert(SEC_FETCH_SITE, HeaderValue::from_static("cross-site"));
        assert!(is_cross_site(&headers));
    }

    #[test]
    fn content_type_detection() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json_request(&headers));
        assert!(!is_multipart_request(&headers));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=x"),
        );
        assert!(is_multipart_request(&headers));
        assert!(!is_json_request(&HeaderMap::new()));
    }
}
