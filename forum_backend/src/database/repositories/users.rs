use crate::database::models::{NewUser, UserRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, record: &NewUser) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO users (username, email, password, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            params![
                record.username,
                record.email,
                record.password_hash,
                record.created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, username, email, password, created_at, updated_at
                FROM users
                WHERE id = ?1
                "#,
                params![id],
                map_user,
            )
            .optional()?)
    }

    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, username, email, password, created_at, updated_at
                FROM users
                WHERE username = ?1
                "#,
                params![username],
                map_user,
            )
            .optional()?)
    }

    fn update_credentials(
        &self,
        id: i64,
        email: &str,
        password_hash: &str,
        updated_at: &str,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE users
            SET email = ?2, password = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
            params![id, email, password_hash, updated_at],
        )?;
        Ok(())
    }
}
