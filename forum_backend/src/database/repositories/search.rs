use super::boards::map_board;
use super::posts::{map_post, POST_COLUMNS};
use crate::database::models::{BoardRecord, PostRecord};
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteSearchRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

/// Wraps `query` for a `LIKE ... ESCAPE '\'` substring match, escaping the
/// wildcard characters so they match literally. The pattern is lowercased to
/// pair with `lower_u` on the column side.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

impl<'conn> super::SearchRepository for SqliteSearchRepository<'conn> {
    fn posts(&self, query: &str, limit: usize) -> Result<Vec<PostRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE lower_u(p.title) LIKE ?1 ESCAPE '\'
               OR lower_u(p.content) LIKE ?1 ESCAPE '\'
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT ?2
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![like_pattern(query), limit as i64], map_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn boards(&self, query: &str) -> Result<Vec<BoardRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, slug, title, description
            FROM boards
            WHERE lower_u(title) LIKE ?1 ESCAPE '\'
               OR lower_u(description) LIKE ?1 ESCAPE '\'
            ORDER BY title ASC
            "#,
        )?;
        let rows = stmt.query_map(params![like_pattern(query)], map_board)?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row?);
        }
        Ok(boards)
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\"), "%c:\\\\%");
        assert_eq!(like_pattern("ИГРЫ"), "%игры%");
    }
}
