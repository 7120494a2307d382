use super::{ApiResult, AppState};
use crate::database::models::{BoardRecord, SearchResults};
use crate::search::{search, DEFAULT_SEARCH_LIMIT};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    pub(crate) q: String,
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResults> {
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    Ok(Json(search(&state.database, &params.q, limit)?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoardFilterParams {
    #[serde(default)]
    pub(crate) q: Option<String>,
}

pub(crate) async fn list_boards(
    State(state): State<AppState>,
    Query(params): Query<BoardFilterParams>,
) -> ApiResult<Vec<BoardRecord>> {
    Ok(Json(state.boards().filter(params.q.as_deref())?))
}
