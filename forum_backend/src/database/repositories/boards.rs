use crate::database::models::BoardRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteBoardRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

pub(super) fn map_board(row: &Row<'_>) -> rusqlite::Result<BoardRecord> {
    Ok(BoardRecord {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
    })
}

impl<'conn> super::BoardRepository for SqliteBoardRepository<'conn> {
    fn create(&self, slug: &str, title: &str, description: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO boards (slug, title, description) VALUES (?1, ?2, ?3)",
            params![slug, title, description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<BoardRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, slug, title, description FROM boards WHERE id = ?1",
                params![id],
                map_board,
            )
            .optional()?)
    }

    fn get_by_slug(&self, slug: &str) -> Result<Option<BoardRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, slug, title, description FROM boards WHERE slug = ?1",
                params![slug],
                map_board,
            )
            .optional()?)
    }

    fn list(&self) -> Result<Vec<BoardRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, slug, title, description FROM boards ORDER BY title ASC")?;
        let rows = stmt.query_map([], map_board)?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row?);
        }
        Ok(boards)
    }
}
