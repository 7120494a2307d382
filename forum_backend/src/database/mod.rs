pub mod models;
pub mod repositories;

use crate::config::ForumPaths;
use anyhow::{anyhow, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL DEFAULT '',
        password TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS boards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        slug TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        board_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        author_id INTEGER NOT NULL,
        image_url TEXT,
        link_url TEXT,
        image_data BLOB,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (board_id) REFERENCES boards(id) ON DELETE CASCADE,
        FOREIGN KEY (author_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL,
        author_id INTEGER NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
        FOREIGN KEY (author_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS post_votes (
        post_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        value INTEGER NOT NULL CHECK (value IN (-1, 1)),
        UNIQUE (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS comment_votes (
        comment_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        value INTEGER NOT NULL CHECK (value IN (-1, 1)),
        UNIQUE (comment_id, user_id),
        FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS post_views (
        post_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        viewed_at TEXT NOT NULL,
        UNIQUE (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id)
    );

    CREATE INDEX IF NOT EXISTS idx_posts_board ON posts(board_id);
    CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
    CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);

    INSERT OR IGNORE INTO boards (slug, title, description) VALUES
        ('schedule', 'Schedule', 'Discussing this year''s schedule'),
        ('games', 'Games', 'Video games, consoles and PC'),
        ('offtopic', 'Off-topic', 'Free talk about anything'),
        ('news', 'News', 'Discussion of the latest news'),
        ('reviews', 'Reviews', 'Your reviews of films, games and books');
"#;

/// Shared handle to the forum database. Cloning is cheap; all clones share
/// one connection guarded by a mutex.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &ForumPaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn, newly_created)
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Result<Self> {
        register_functions(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        })
    }

    /// Opens a migrated in-memory database. Intended for tests and tooling.
    pub fn open_in_memory() -> Result<Self> {
        let db = Self::from_connection(Connection::open_in_memory()?, true)?;
        db.ensure_migrations()?;
        Ok(db)
    }

    /// Applies the schema. Returns whether the database file was new.
    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    pub fn with_repositories<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }
}

/// `lower_u(text)`: Unicode-aware lowercase. SQLite's built-in `lower` and
/// `LIKE` only fold ASCII letters.
pub(crate) fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "lower_u",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent_and_seed_boards() {
        let db = Database::open_in_memory().expect("in-memory db");
        db.ensure_migrations().expect("second run");
        let count: i64 = db
            .with_repositories(|repos| {
                Ok(repos
                    .conn()
                    .query_row("SELECT COUNT(*) FROM boards", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn lower_u_folds_cyrillic() {
        let db = Database::open_in_memory().unwrap();
        let lowered: String = db
            .with_repositories(|repos| {
                Ok(repos
                    .conn()
                    .query_row("SELECT lower_u('Новые ИГРЫ')", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(lowered, "новые игры");
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Database::open_in_memory().unwrap();
        let result = db.with_repositories(|repos| {
            repos.conn().execute(
                "INSERT INTO comments (post_id, author_id, content, created_at, updated_at)
                 VALUES (999, 999, 'orphan', 'now', 'now')",
                [],
            )?;
            Ok(())
        });
        assert!(result.is_err());
    }
}
