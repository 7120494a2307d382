mod boards;
mod comments;
mod posts;
mod search;
mod users;
mod views;
mod votes;

use super::models::{
    BoardRecord, CommentRecord, NewComment, NewPost, NewUser, PostChanges, PostRecord,
    TalliedComment, TalliedPost, UserRecord,
};
use crate::votes::{VoteSubject, VoteTally, VoteValue};
use anyhow::Result;
use rusqlite::Connection;

pub trait UserRepository {
    fn create(&self, record: &NewUser) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<UserRecord>>;
    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    fn update_credentials(
        &self,
        id: i64,
        email: &str,
        password_hash: &str,
        updated_at: &str,
    ) -> Result<()>;
}

pub trait BoardRepository {
    fn create(&self, slug: &str, title: &str, description: &str) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<BoardRecord>>;
    fn get_by_slug(&self, slug: &str) -> Result<Option<BoardRecord>>;
    fn list(&self) -> Result<Vec<BoardRecord>>;
}

pub trait PostRepository {
    fn create(&self, record: &NewPost) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<PostRecord>>;
    fn list_recent(&self, limit: usize) -> Result<Vec<TalliedPost>>;
    fn list_for_board(&self, board_id: i64) -> Result<Vec<TalliedPost>>;
    fn list_for_author(&self, author_id: i64) -> Result<Vec<TalliedPost>>;
    fn update(&self, id: i64, changes: &PostChanges) -> Result<bool>;
    fn delete(&self, id: i64) -> Result<bool>;
    /// Raw image bytes, `None` when the post is missing or has no image.
    fn image_data(&self, id: i64) -> Result<Option<Vec<u8>>>;
}

pub trait CommentRepository {
    fn create(&self, record: &NewComment) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<CommentRecord>>;
    /// Comments of a post in creation order, each with its vote tally.
    fn list_for_post(&self, post_id: i64) -> Result<Vec<TalliedComment>>;
    fn delete(&self, id: i64) -> Result<bool>;
}

pub trait VoteRepository {
    fn subject_exists(&self, subject_id: i64) -> Result<bool>;
    fn set(&self, subject_id: i64, user_id: i64, value: VoteValue) -> Result<()>;
    fn tally(&self, subject_id: i64) -> Result<VoteTally>;
    fn value_for(&self, subject_id: i64, user_id: i64) -> Result<Option<VoteValue>>;
}

pub trait ViewRepository {
    fn record(&self, post_id: i64, user_id: i64, viewed_at: &str) -> Result<()>;
    fn count(&self, post_id: i64) -> Result<i64>;
}

pub trait SearchRepository {
    fn posts(&self, query: &str, limit: usize) -> Result<Vec<PostRecord>>;
    fn boards(&self, query: &str) -> Result<Vec<BoardRecord>>;
}

/// Borrowed view over one connection handing out the rusqlite-backed
/// repository implementations.
pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn boards(&self) -> impl BoardRepository + '_ {
        boards::SqliteBoardRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn votes(&self, subject: VoteSubject) -> impl VoteRepository + '_ {
        votes::SqliteVoteRepository {
            conn: self.conn,
            subject,
        }
    }

    pub fn views(&self) -> impl ViewRepository + '_ {
        views::SqliteViewRepository { conn: self.conn }
    }

    pub fn search(&self) -> impl SearchRepository + '_ {
        search::SqliteSearchRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}
