use crate::database::models::{CommentRecord, NewComment, TalliedComment};
use crate::votes::VoteTally;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &NewComment) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO comments (post_id, author_id, content, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            params![
                record.post_id,
                record.author_id,
                record.content,
                record.created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<CommentRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT c.id, c.post_id, c.author_id, u.username, c.content, c.created_at, c.updated_at
                FROM comments c
                JOIN users u ON u.id = c.author_id
                WHERE c.id = ?1
                "#,
                params![id],
                map_comment,
            )
            .optional()?)
    }

    fn list_for_post(&self, post_id: i64) -> Result<Vec<TalliedComment>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.post_id, c.author_id, u.username, c.content, c.created_at, c.updated_at,
                COALESCE(SUM(CASE WHEN v.value = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN v.value = -1 THEN 1 ELSE 0 END), 0)
            FROM comments c
            JOIN users u ON u.id = c.author_id
            LEFT JOIN comment_votes v ON v.comment_id = c.id
            WHERE c.post_id = ?1
            GROUP BY c.id
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| {
            Ok(TalliedComment {
                comment: map_comment(row)?,
                tally: VoteTally {
                    likes: row.get(7)?,
                    dislikes: row.get(8)?,
                },
            })
        })?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}
