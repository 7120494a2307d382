use super::response::{
    body_rejection, is_multipart_request, FormOrJson, MutationReply, ResponseMode,
    SameSiteNavigation,
};
use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::database::models::{PostRecord, TalliedPost};
use crate::posts::{PostDetails, PostInput, DEFAULT_RECENT_LIMIT};
use crate::votes::{VoteTally, VoteValue};
use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::extract::multipart::MultipartError;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub(crate) struct ListPostsParams {
    #[serde(default)]
    limit: Option<usize>,
    /// Board slug to restrict the listing to.
    #[serde(default)]
    board: Option<String>,
}

/// Post fields as submitted by a form, JSON body or multipart upload.
/// Absent fields are `None` so edits can keep stored values.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PostFields {
    #[serde(default)]
    board_id: Option<i64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    link_url: Option<String>,
}

impl PostFields {
    fn into_new_post(self, image_data: Option<Vec<u8>>) -> Result<PostInput, ApiError> {
        let board_id = self
            .board_id
            .ok_or_else(|| ApiError::BadRequest("board_id is required".into()))?;
        Ok(PostInput {
            board_id,
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            image_url: self.image_url,
            link_url: self.link_url,
            image_data,
        })
    }

    /// Blank or missing fields fall back to the stored post.
    fn merge_into(self, existing: &PostRecord, image_data: Option<Vec<u8>>) -> PostInput {
        fn keep(new: Option<String>, old: &str) -> String {
            new.filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| old.to_string())
        }
        fn keep_opt(new: Option<String>, old: &Option<String>) -> Option<String> {
            new.filter(|value| !value.trim().is_empty())
                .or_else(|| old.clone())
        }
        PostInput {
            board_id: self.board_id.unwrap_or(existing.board_id),
            title: keep(self.title, &existing.title),
            content: keep(self.content, &existing.content),
            image_url: keep_opt(self.image_url, &existing.image_url),
            link_url: keep_opt(self.link_url, &existing.link_url),
            image_data,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VoteBody {
    value: i64,
}

fn multipart_error(err: MultipartError) -> ApiError {
    body_rejection(err.status(), err.body_text())
}

/// Reads a post submission. Multipart bodies may carry the image bytes in
/// an `image` part; other bodies are JSON or urlencoded forms.
async fn read_submission(
    state: &AppState,
    req: Request,
) -> Result<(PostFields, Option<Vec<u8>>), ApiError> {
    if !is_multipart_request(req.headers()) {
        let FormOrJson(fields) = FormOrJson::<PostFields>::from_request(req, state).await?;
        return Ok((fields, None));
    }

    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|rej| body_rejection(rej.status(), rej.body_text()))?;
    let mut fields = PostFields::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let data = field.bytes().await.map_err(multipart_error)?;
                if !data.is_empty() {
                    tracing::debug!(size = data.len(), "post image received");
                    image = Some(data.to_vec());
                }
            }
            "board_id" => {
                let raw = field.text().await.map_err(multipart_error)?;
                let board_id = raw
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("invalid board_id {raw:?}")))?;
                fields.board_id = Some(board_id);
            }
            "title" => fields.title = Some(field.text().await.map_err(multipart_error)?),
            "content" => fields.content = Some(field.text().await.map_err(multipart_error)?),
            "image_url" => fields.image_url = Some(field.text().await.map_err(multipart_error)?),
            "link_url" => fields.link_url = Some(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!(field = other, "ignored field in post submission"),
        }
    }
    Ok((fields, image))
}

fn tally_body(tally: VoteTally) -> serde_json::Value {
    json!({ "likes": tally.likes, "dislikes": tally.dislikes })
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListPostsParams>,
) -> ApiResult<Vec<TalliedPost>> {
    let posts = state.posts();
    let listed = match params.board.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => {
            let board = state.boards().get_by_slug(slug)?;
            posts.list_for_board(board.id)?
        }
        None => posts.list_recent(params.limit.unwrap_or(DEFAULT_RECENT_LIMIT))?,
    };
    Ok(Json(listed))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> ApiResult<PostDetails> {
    Ok(Json(state.posts().details(post_id, None)?))
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    req: Request,
) -> Result<MutationReply, ApiError> {
    let (fields, image) = read_submission(&state, req).await?;
    let input = fields.into_new_post(image)?;
    let post = state.posts().create(user.id, input)?;
    Ok(mode.reply(format!("/post/{}", post.id), json!({ "id": post.id })))
}

pub(crate) async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
    FormOrJson(fields): FormOrJson<PostFields>,
) -> ApiResult<PostRecord> {
    let posts = state.posts();
    let existing = posts.get(post_id)?;
    let input = fields.merge_into(&existing, None);
    Ok(Json(posts.update(user.id, post_id, input)?))
}

pub(crate) async fn edit_post_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    Path(post_id): Path<i64>,
    req: Request,
) -> Result<MutationReply, ApiError> {
    let (fields, image) = read_submission(&state, req).await?;
    let posts = state.posts();
    let existing = posts.get(post_id)?;
    let updated = posts.update(user.id, post_id, fields.merge_into(&existing, image))?;
    Ok(mode.reply(format!("/post/{}", updated.id), json!({ "id": updated.id })))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.posts().delete(user.id, post_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn vote(
    state: &AppState,
    user_id: i64,
    mode: ResponseMode,
    post_id: i64,
    value: VoteValue,
) -> Result<MutationReply, ApiError> {
    let tally = state.posts().vote(post_id, user_id, value)?;
    Ok(mode.reply(format!("/post/{post_id}"), tally_body(tally)))
}

pub(crate) async fn like_post(
    State(state): State<AppState>,
    _guard: SameSiteNavigation,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    Path(post_id): Path<i64>,
) -> Result<MutationReply, ApiError> {
    vote(&state, user.id, mode, post_id, VoteValue::Like).await
}

pub(crate) async fn dislike_post(
    State(state): State<AppState>,
    _guard: SameSiteNavigation,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    Path(post_id): Path<i64>,
) -> Result<MutationReply, ApiError> {
    vote(&state, user.id, mode, post_id, VoteValue::Dislike).await
}

pub(crate) async fn vote_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    Path(post_id): Path<i64>,
    FormOrJson(body): FormOrJson<VoteBody>,
) -> Result<MutationReply, ApiError> {
    let value = VoteValue::try_from(body.value)?;
    vote(&state, user.id, mode, post_id, value).await
}

pub(crate) async fn post_image(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Response, ApiError> {
    let image = state.posts().image(post_id)?;
    Ok(([(CONTENT_TYPE, image.mime)], image.bytes).into_response())
}
