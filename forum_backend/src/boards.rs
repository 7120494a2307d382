use crate::database::models::BoardRecord;
use crate::database::repositories::{BoardRepository, SearchRepository};
use crate::database::Database;
use crate::error::{is_constraint_violation, ServiceError, ServiceResult};
use anyhow::anyhow;

#[derive(Clone)]
pub struct BoardService {
    database: Database,
}

impl BoardService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn list(&self) -> ServiceResult<Vec<BoardRecord>> {
        Ok(self.database.with_repositories(|repos| repos.boards().list())?)
    }

    /// Boards whose title or description contains `query`; all boards when
    /// the query is blank.
    pub fn filter(&self, query: Option<&str>) -> ServiceResult<Vec<BoardRecord>> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => Ok(self
                .database
                .with_repositories(|repos| repos.search().boards(query))?),
            None => self.list(),
        }
    }

    pub fn get_by_slug(&self, slug: &str) -> ServiceResult<BoardRecord> {
        self.database
            .with_repositories(|repos| repos.boards().get_by_slug(slug))?
            .ok_or_else(|| ServiceError::not_found(format!("board {slug:?} not found")))
    }

    pub fn create(&self, slug: &str, title: &str, description: &str) -> ServiceResult<BoardRecord> {
        let slug = slug.trim().to_ascii_lowercase();
        let title = title.trim();
        if slug.is_empty()
            || !slug
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(ServiceError::invalid(
                "board slug must be non-empty and use only a-z, 0-9, '-' and '_'",
            ));
        }
        if title.is_empty() {
            return Err(ServiceError::invalid("board title may not be empty"));
        }

        let created = self.database.with_repositories(|repos| {
            let boards = repos.boards();
            let id = boards.create(&slug, title, description.trim())?;
            boards
                .get(id)?
                .ok_or_else(|| anyhow!("board creation lost newly inserted record"))
        });
        match created {
            Ok(board) => {
                tracing::info!(board_id = board.id, slug = %board.slug, "board created");
                Ok(board)
            }
            Err(err) if is_constraint_violation(&err) => Err(ServiceError::Conflict(format!(
                "board {slug:?} already exists"
            ))),
            Err(err) => Err(err.into()),
        }
    }
}
