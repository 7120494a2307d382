use crate::votes::VoteTally;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the process.
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRecord {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: i64,
    pub board_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    /// Whether image bytes are stored for the post; served at `/post/{id}/image`.
    pub has_image: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub board_id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub created_at: String,
}

/// Column values written by an edit. `image_data: None` keeps the stored image.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub board_id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TalliedPost {
    #[serde(flatten)]
    pub post: PostRecord,
    #[serde(flatten)]
    pub tally: VoteTally,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TalliedComment {
    #[serde(flatten)]
    pub comment: CommentRecord,
    #[serde(flatten)]
    pub tally: VoteTally,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub posts: Vec<PostRecord>,
    pub boards: Vec<BoardRecord>,
}
