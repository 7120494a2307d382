//! Server-rendered HTML pages.

use super::search::{BoardFilterParams, SearchParams};
use super::{ApiError, AppState, CurrentUser, MaybeUser};
use crate::comments::can_delete;
use crate::database::models::{BoardRecord, PostRecord, TalliedComment, TalliedPost, UserRecord};
use crate::markdown::render_markdown;
use crate::posts::DEFAULT_RECENT_LIMIT;
use crate::search::{search, DEFAULT_SEARCH_LIMIT};
use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::Html;
use serde::Deserialize;

type PageResult = Result<Html<String>, ApiError>;

fn render<T: Template>(template: T) -> PageResult {
    template
        .render()
        .map(Html)
        .map_err(|err| ApiError::Internal(anyhow::Error::new(err)))
}

/// Header state shared by every page.
pub(crate) struct Nav {
    pub signed_in: bool,
    pub user_id: i64,
    pub username: String,
}

impl Nav {
    fn from_user(user: Option<&UserRecord>) -> Self {
        match user {
            Some(user) => Nav {
                signed_in: true,
                user_id: user.id,
                username: user.username.clone(),
            },
            None => Nav {
                signed_in: false,
                user_id: 0,
                username: String::new(),
            },
        }
    }
}

pub(crate) struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub body_html: String,
    pub created_at: String,
    pub likes: i64,
    pub dislikes: i64,
    pub can_delete: bool,
}

impl CommentView {
    fn build(tallied: TalliedComment, post: &PostRecord, viewer: Option<i64>) -> Self {
        let comment = tallied.comment;
        let deletable = viewer
            .map(|viewer| can_delete(viewer, &comment, post))
            .unwrap_or(false);
        CommentView {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_name: comment.author_name,
            body_html: render_markdown(&comment.content),
            created_at: comment.created_at,
            likes: tallied.tally.likes,
            dislikes: tallied.tally.dislikes,
            can_delete: deletable,
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub(crate) struct HomePage {
    pub nav: Nav,
    pub boards: Vec<BoardRecord>,
    pub posts: Vec<TalliedPost>,
}

#[derive(Template)]
#[template(path = "boards.html")]
pub(crate) struct BoardsPage {
    pub nav: Nav,
    pub query: String,
    pub boards: Vec<BoardRecord>,
}

#[derive(Template)]
#[template(path = "board.html")]
pub(crate) struct BoardPage {
    pub nav: Nav,
    pub board: BoardRecord,
    pub posts: Vec<TalliedPost>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub(crate) struct PostPage {
    pub nav: Nav,
    pub post: PostRecord,
    pub board: BoardRecord,
    pub body_html: String,
    pub has_link: bool,
    pub link_url: String,
    pub has_image_url: bool,
    pub image_url: String,
    pub likes: i64,
    pub dislikes: i64,
    pub views: i64,
    pub is_author: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Template)]
#[template(path = "edit_post.html")]
pub(crate) struct EditPostPage {
    pub nav: Nav,
    pub post: PostRecord,
    pub boards: Vec<BoardRecord>,
    pub image_url: String,
    pub link_url: String,
}

#[derive(Template)]
#[template(path = "create_post.html")]
pub(crate) struct CreatePostPage {
    pub nav: Nav,
    pub boards: Vec<BoardRecord>,
    pub selected_board: i64,
}

#[derive(Template)]
#[template(path = "login.html")]
pub(crate) struct LoginPage {
    pub nav: Nav,
    pub has_error: bool,
}

#[derive(Template)]
#[template(path = "register.html")]
pub(crate) struct RegisterPage {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "search.html")]
pub(crate) struct SearchPage {
    pub nav: Nav,
    pub query: String,
    pub searched: bool,
    pub posts: Vec<PostRecord>,
    pub boards: Vec<BoardRecord>,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub(crate) struct ProfilePage {
    pub nav: Nav,
    pub profile: UserRecord,
    pub is_self: bool,
    pub posts: Vec<TalliedPost>,
}

pub(crate) async fn home_page(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> PageResult {
    render(HomePage {
        nav: Nav::from_user(user.as_ref()),
        boards: state.boards().list()?,
        posts: state.posts().list_recent(DEFAULT_RECENT_LIMIT)?,
    })
}

pub(crate) async fn boards_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(params): Query<BoardFilterParams>,
) -> PageResult {
    let boards = state.boards().filter(params.q.as_deref())?;
    render(BoardsPage {
        nav: Nav::from_user(user.as_ref()),
        query: params.q.unwrap_or_default(),
        boards,
    })
}

pub(crate) async fn board_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
) -> PageResult {
    let board = state.boards().get_by_slug(&slug)?;
    let posts = state.posts().list_for_board(board.id)?;
    render(BoardPage {
        nav: Nav::from_user(user.as_ref()),
        board,
        posts,
    })
}

pub(crate) async fn post_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(post_id): Path<i64>,
) -> PageResult {
    let viewer = user.as_ref().map(|user| user.id);
    let details = state.posts().details(post_id, viewer)?;
    let post = details.post.post;
    let comments = details
        .comments
        .into_iter()
        .map(|comment| CommentView::build(comment, &post, viewer))
        .collect();
    render(PostPage {
        nav: Nav::from_user(user.as_ref()),
        body_html: render_markdown(&post.content),
        has_link: post.link_url.is_some(),
        link_url: post.link_url.clone().unwrap_or_default(),
        has_image_url: post.image_url.is_some(),
        image_url: post.image_url.clone().unwrap_or_default(),
        likes: details.post.tally.likes,
        dislikes: details.post.tally.dislikes,
        views: details.views,
        is_author: viewer == Some(post.author_id),
        board: details.board,
        comments,
        post,
    })
}

pub(crate) async fn edit_post_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
) -> PageResult {
    let post = state.posts().get(post_id)?;
    if post.author_id != user.id {
        return Err(ApiError::Forbidden(
            "only the author may edit this post".into(),
        ));
    }
    render(EditPostPage {
        nav: Nav::from_user(Some(&user)),
        boards: state.boards().list()?,
        image_url: post.image_url.clone().unwrap_or_default(),
        link_url: post.link_url.clone().unwrap_or_default(),
        post,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginParams {
    #[serde(default)]
    error: Option<String>,
}

pub(crate) async fn login_page(
    MaybeUser(user): MaybeUser,
    Query(params): Query<LoginParams>,
) -> PageResult {
    render(LoginPage {
        nav: Nav::from_user(user.as_ref()),
        has_error: params.error.is_some(),
    })
}

pub(crate) async fn register_page(MaybeUser(user): MaybeUser) -> PageResult {
    render(RegisterPage {
        nav: Nav::from_user(user.as_ref()),
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePostParams {
    #[serde(default)]
    board: Option<String>,
}

pub(crate) async fn create_post_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<CreatePostParams>,
) -> PageResult {
    let boards = state.boards().list()?;
    let selected_board = params
        .board
        .as_deref()
        .and_then(|slug| boards.iter().find(|board| board.slug == slug))
        .map(|board| board.id)
        .unwrap_or(0);
    render(CreatePostPage {
        nav: Nav::from_user(Some(&user)),
        boards,
        selected_board,
    })
}

pub(crate) async fn search_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(params): Query<SearchParams>,
) -> PageResult {
    let results = search(
        &state.database,
        &params.q,
        params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
    )?;
    render(SearchPage {
        nav: Nav::from_user(user.as_ref()),
        searched: !results.query.is_empty(),
        query: params.q.trim().to_string(),
        posts: results.posts,
        boards: results.boards,
    })
}

pub(crate) async fn own_profile_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> PageResult {
    let posts = state.posts().list_for_author(user.id)?;
    render(ProfilePage {
        nav: Nav::from_user(Some(&user)),
        is_self: true,
        profile: user,
        posts,
    })
}

pub(crate) async fn profile_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(profile_id): Path<i64>,
) -> PageResult {
    let profile = state.accounts().get(profile_id)?;
    let posts = state.posts().list_for_author(profile.id)?;
    render(ProfilePage {
        nav: Nav::from_user(user.as_ref()),
        is_self: user.as_ref().map(|user| user.id) == Some(profile.id),
        profile,
        posts,
    })
}
