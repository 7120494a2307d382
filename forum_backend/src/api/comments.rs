use super::response::{FormOrJson, MutationReply, ResponseMode, SameSiteNavigation};
use super::{ApiError, ApiResult, AppState, CurrentUser};
use crate::comments::CommentInput;
use crate::database::models::TalliedComment;
use crate::votes::VoteValue;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub(crate) struct VoteLinkParams {
    /// Page to return to after a browser vote.
    #[serde(default)]
    post_id: Option<i64>,
}

/// A `post_id` sent alongside is ignored; authorization always looks at the
/// comment's own post.
#[derive(Debug, Deserialize)]
pub(crate) struct DeleteCommentBody {
    comment_id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VoteBody {
    value: i64,
}

async fn vote(
    state: &AppState,
    user_id: i64,
    mode: ResponseMode,
    comment_id: i64,
    return_to: Option<i64>,
    value: VoteValue,
) -> Result<MutationReply, ApiError> {
    let comments = state.comments();
    let tally = comments.vote(comment_id, user_id, value)?;
    let post_id = match return_to {
        Some(post_id) => post_id,
        None => comments.get(comment_id)?.post_id,
    };
    Ok(mode.reply(
        format!("/post/{post_id}"),
        json!({ "likes": tally.likes, "dislikes": tally.dislikes }),
    ))
}

pub(crate) async fn like_comment(
    State(state): State<AppState>,
    _guard: SameSiteNavigation,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    Path(comment_id): Path<i64>,
    Query(params): Query<VoteLinkParams>,
) -> Result<MutationReply, ApiError> {
    vote(&state, user.id, mode, comment_id, params.post_id, VoteValue::Like).await
}

pub(crate) async fn dislike_comment(
    State(state): State<AppState>,
    _guard: SameSiteNavigation,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    Path(comment_id): Path<i64>,
    Query(params): Query<VoteLinkParams>,
) -> Result<MutationReply, ApiError> {
    vote(&state, user.id, mode, comment_id, params.post_id, VoteValue::Dislike).await
}

pub(crate) async fn vote_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    Path(comment_id): Path<i64>,
    FormOrJson(body): FormOrJson<VoteBody>,
) -> Result<MutationReply, ApiError> {
    let value = VoteValue::try_from(body.value)?;
    vote(&state, user.id, mode, comment_id, None, value).await
}

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> ApiResult<Vec<TalliedComment>> {
    Ok(Json(state.comments().list_for_post(post_id)?))
}

pub(crate) async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    FormOrJson(input): FormOrJson<CommentInput>,
) -> Result<MutationReply, ApiError> {
    let comment = state.comments().create(user.id, input)?;
    Ok(mode.reply(
        format!("/post/{}", comment.post_id),
        json!({ "id": comment.id }),
    ))
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mode: ResponseMode,
    FormOrJson(body): FormOrJson<DeleteCommentBody>,
) -> Result<MutationReply, ApiError> {
    let removed = state.comments().delete(user.id, body.comment_id)?;
    Ok(mode.reply(
        format!("/post/{}", removed.post_id),
        json!({ "deleted": true, "id": removed.id }),
    ))
}
