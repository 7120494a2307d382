pub mod accounts;
pub mod api;
pub mod boards;
pub mod bootstrap;
pub mod comments;
pub mod config;
pub mod database;
pub mod error;
pub mod markdown;
pub mod posts;
pub mod search;
pub mod session;
pub mod telemetry;
pub mod utils;
pub mod votes;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::database::models::{NewPost, NewUser};
    use crate::database::repositories::{BoardRepository, PostRepository, UserRepository};
    use crate::database::Database;
    use crate::utils::now_utc_iso;

    pub fn seed_user(database: &Database, username: &str) -> i64 {
        database
            .with_repositories(|repos| {
                repos.users().create(&NewUser {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    password_hash: "not-a-real-hash".into(),
                    created_at: now_utc_iso(),
                })
            })
            .expect("seed user")
    }

    /// Creates a post on the seeded `games` board.
    pub fn seed_post(database: &Database, author_id: i64, title: &str) -> i64 {
        database
            .with_repositories(|repos| {
                let board = repos
                    .boards()
                    .get_by_slug("games")?
                    .ok_or_else(|| anyhow::anyhow!("games board missing"))?;
                repos.posts().create(&NewPost {
                    board_id: board.id,
                    author_id,
                    title: title.to_string(),
                    content: format!("{title} body"),
                    image_url: None,
                    link_url: None,
                    image_data: None,
                    created_at: now_utc_iso(),
                })
            })
            .expect("seed post")
    }
}
