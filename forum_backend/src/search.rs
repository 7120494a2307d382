use crate::database::models::SearchResults;
use crate::database::repositories::SearchRepository;
use crate::database::Database;
use crate::error::ServiceResult;

pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const MAX_SEARCH_LIMIT: usize = 200;

/// Substring search over post titles and bodies plus board titles and
/// descriptions. A blank query matches nothing.
pub fn search(database: &Database, query: &str, limit: usize) -> ServiceResult<SearchResults> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(SearchResults {
            query: String::new(),
            posts: Vec::new(),
            boards: Vec::new(),
        });
    }
    let limit = limit.clamp(1, MAX_SEARCH_LIMIT);
    let (posts, boards) = database.with_repositories(|repos| {
        let search = repos.search();
        Ok((search.posts(query, limit)?, search.boards(query)?))
    })?;
    tracing::debug!(query, posts = posts.len(), boards = boards.len(), "search");
    Ok(SearchResults {
        query: query.to_string(),
        posts,
        boards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_post, seed_user};

    #[test]
    fn finds_posts_and_boards() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice");
        seed_post(&db, alice, "Best games of the year");
        seed_post(&db, alice, "Weather");

        let results = search(&db, "  games ", 10).unwrap();
        assert_eq!(results.query, "games");
        assert_eq!(results.posts.len(), 1);
        assert_eq!(results.posts[0].title, "Best games of the year");
        let slugs: Vec<&str> = results.boards.iter().map(|b| b.slug.as_str()).collect();
        assert!(slugs.contains(&"games"));
    }

    #[test]
    fn matching_ignores_case_beyond_ascii() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice");
        seed_post(&db, alice, "Новые Игры");
        seed_post(&db, alice, "Погода");

        let results = search(&db, "игры", 10).unwrap();
        assert_eq!(results.posts.len(), 1);
        assert_eq!(results.posts[0].title, "Новые Игры");
        assert_eq!(search(&db, "НОВЫЕ", 10).unwrap().posts.len(), 1);
        assert_eq!(search(&db, "GAMES", 10).unwrap().boards.len(), 2);
    }

    #[test]
    fn blank_query_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let results = search(&db, "   ", 10).unwrap();
        assert!(results.posts.is_empty());
        assert!(results.boards.is_empty());
    }

    #[test]
    fn limit_caps_post_hits() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice");
        for n in 0..5 {
            seed_post(&db, alice, &format!("topic {n}"));
        }
        assert_eq!(search(&db, "topic", 3).unwrap().posts.len(), 3);
        assert_eq!(search(&db, "topic", 0).unwrap().posts.len(), 1);
    }
}
