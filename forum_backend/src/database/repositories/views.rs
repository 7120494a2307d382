use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteViewRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::ViewRepository for SqliteViewRepository<'conn> {
    fn record(&self, post_id: i64, user_id: i64, viewed_at: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO post_views (post_id, user_id, viewed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(post_id, user_id) DO NOTHING
            "#,
            params![post_id, user_id, viewed_at],
        )?;
        Ok(())
    }

    fn count(&self, post_id: i64) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM post_views WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?)
    }
}
