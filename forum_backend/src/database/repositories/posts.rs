use crate::database::models::{NewPost, PostChanges, PostRecord, TalliedPost};
use crate::votes::VoteTally;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

/// Column list shared by every post query; `map_post` reads it positionally.
pub(super) const POST_COLUMNS: &str = r#"
    p.id, p.board_id, p.author_id, u.username, p.title, p.content,
    p.image_url, p.link_url, p.image_data IS NOT NULL, p.created_at, p.updated_at
"#;

pub(super) fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        board_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        title: row.get(4)?,
        content: row.get(5)?,
        image_url: row.get(6)?,
        link_url: row.get(7)?,
        has_image: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_tallied_post(row: &Row<'_>) -> rusqlite::Result<TalliedPost> {
    Ok(TalliedPost {
        post: map_post(row)?,
        tally: VoteTally {
            likes: row.get(11)?,
            dislikes: row.get(12)?,
        },
    })
}

impl<'conn> SqlitePostRepository<'conn> {
    /// `limit` is bound after `args`; a negative value means no limit.
    fn list_tallied(&self, filter: &str, args: &[&dyn ToSql], limit: i64) -> Result<Vec<TalliedPost>> {
        let limit_index = args.len() + 1;
        let sql = format!(
            r#"
            SELECT {POST_COLUMNS},
                COALESCE(SUM(CASE WHEN v.value = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN v.value = -1 THEN 1 ELSE 0 END), 0)
            FROM posts p
            JOIN users u ON u.id = p.author_id
            LEFT JOIN post_votes v ON v.post_id = p.id
            {filter}
            GROUP BY p.id
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT ?{limit_index}
            "#
        );
        let mut bound: Vec<&dyn ToSql> = args.to_vec();
        bound.push(&limit);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(bound.as_slice(), map_tallied_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &NewPost) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO posts (board_id, title, content, author_id, image_url, link_url, image_data, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
            params![
                record.board_id,
                record.title,
                record.content,
                record.author_id,
                record.image_url,
                record.link_url,
                record.image_data,
                record.created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<PostRecord>> {
        let sql = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE p.id = ?1
            "#
        );
        Ok(self
            .conn
            .query_row(&sql, params![id], map_post)
            .optional()?)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<TalliedPost>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.list_tallied("", params![], limit)
    }

    fn list_for_board(&self, board_id: i64) -> Result<Vec<TalliedPost>> {
        self.list_tallied("WHERE p.board_id = ?1", params![board_id], -1)
    }

    fn list_for_author(&self, author_id: i64) -> Result<Vec<TalliedPost>> {
        self.list_tallied("WHERE p.author_id = ?1", params![author_id], -1)
    }

    fn update(&self, id: i64, changes: &PostChanges) -> Result<bool> {
        let updated = self.conn.execute(
            r#"
            UPDATE posts
            SET board_id = ?2,
                title = ?3,
                content = ?4,
                image_url = ?5,
                link_url = ?6,
                image_data = COALESCE(?7, image_data),
                updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                id,
                changes.board_id,
                changes.title,
                changes.content,
                changes.image_url,
                changes.link_url,
                changes.image_data,
                changes.updated_at
            ],
        )?;
        Ok(updated > 0)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn image_data(&self, id: i64) -> Result<Option<Vec<u8>>> {
        let data: Option<Option<Vec<u8>>> = self
            .conn
            .query_row(
                "SELECT image_data FROM posts WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data.flatten())
    }
}
