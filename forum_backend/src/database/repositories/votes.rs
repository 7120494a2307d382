use crate::votes::{VoteSubject, VoteTally, VoteValue};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Vote storage for one subject kind. Table and column names come from
/// `VoteSubject`, never from callers, so interpolating them is safe.
pub(super) struct SqliteVoteRepository<'conn> {
    pub(super) conn: &'conn Connection,
    pub(super) subject: VoteSubject,
}

impl<'conn> super::VoteRepository for SqliteVoteRepository<'conn> {
    fn subject_exists(&self, subject_id: i64) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)",
            self.subject.subject_table()
        );
        let exists: bool = self.conn.query_row(&sql, params![subject_id], |row| row.get(0))?;
        Ok(exists)
    }

    fn set(&self, subject_id: i64, user_id: i64, value: VoteValue) -> Result<()> {
        let table = self.subject.vote_table();
        let column = self.subject.subject_column();
        let sql = format!(
            r#"
            INSERT INTO {table} ({column}, user_id, value)
            VALUES (?1, ?2, ?3)
            ON CONFLICT({column}, user_id) DO UPDATE SET value = excluded.value
            "#
        );
        self.conn
            .execute(&sql, params![subject_id, user_id, value.as_i64()])?;
        Ok(())
    }

    fn tally(&self, subject_id: i64) -> Result<VoteTally> {
        let sql = format!(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN value = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN value = -1 THEN 1 ELSE 0 END), 0)
            FROM {}
            WHERE {} = ?1
            "#,
            self.subject.vote_table(),
            self.subject.subject_column()
        );
        Ok(self.conn.query_row(&sql, params![subject_id], |row| {
            Ok(VoteTally {
                likes: row.get(0)?,
                dislikes: row.get(1)?,
            })
        })?)
    }

    fn value_for(&self, subject_id: i64, user_id: i64) -> Result<Option<VoteValue>> {
        let sql = format!(
            "SELECT value FROM {} WHERE {} = ?1 AND user_id = ?2",
            self.subject.vote_table(),
            self.subject.subject_column()
        );
        let raw: Option<i64> = self
            .conn
            .query_row(&sql, params![subject_id, user_id], |row| row.get(0))
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(VoteValue::try_from(raw)?)),
            None => Ok(None),
        }
    }
}
