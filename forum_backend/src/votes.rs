//! Like/dislike voting shared by posts and comments.
//!
//! A user holds at most one vote per subject. Casting a vote upserts the
//! `(subject, user)` row, so a changed mind replaces the old value instead of
//! adding a second row. Tallies are recomputed from the vote table on every
//! read.

use crate::database::repositories::VoteRepository;
use crate::database::Database;
use crate::error::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteValue {
    Like,
    Dislike,
}

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        match self {
            VoteValue::Like => 1,
            VoteValue::Dislike => -1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = ServiceError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(VoteValue::Like),
            -1 => Ok(VoteValue::Dislike),
            other => Err(ServiceError::invalid(format!(
                "vote value must be 1 or -1, got {other}"
            ))),
        }
    }
}

/// What is being voted on. Selects the junction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteSubject {
    Post,
    Comment,
}

impl VoteSubject {
    pub(crate) fn vote_table(self) -> &'static str {
        match self {
            VoteSubject::Post => "post_votes",
            VoteSubject::Comment => "comment_votes",
        }
    }

    pub(crate) fn subject_column(self) -> &'static str {
        match self {
            VoteSubject::Post => "post_id",
            VoteSubject::Comment => "comment_id",
        }
    }

    pub(crate) fn subject_table(self) -> &'static str {
        match self {
            VoteSubject::Post => "posts",
            VoteSubject::Comment => "comments",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VoteSubject::Post => "post",
            VoteSubject::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub likes: i64,
    pub dislikes: i64,
}

/// Records `user_id`'s vote on a subject and returns the fresh tally.
pub fn cast_vote(
    database: &Database,
    subject: VoteSubject,
    subject_id: i64,
    user_id: i64,
    value: VoteValue,
) -> ServiceResult<VoteTally> {
    let tally = database.with_repositories(|repos| {
        let votes = repos.votes(subject);
        if !votes.subject_exists(subject_id)? {
            return Ok(None);
        }
        votes.set(subject_id, user_id, value)?;
        Ok(Some(votes.tally(subject_id)?))
    })?;
    let tally = tally.ok_or_else(|| {
        ServiceError::not_found(format!("{} {subject_id} not found", subject.label()))
    })?;
    tracing::debug!(
        subject = subject.label(),
        subject_id,
        user_id,
        value = value.as_i64(),
        likes = tally.likes,
        dislikes = tally.dislikes,
        "vote recorded"
    );
    Ok(tally)
}

pub fn tally(database: &Database, subject: VoteSubject, subject_id: i64) -> ServiceResult<VoteTally> {
    Ok(database.with_repositories(|repos| repos.votes(subject).tally(subject_id))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_post, seed_user};

    #[test]
    fn vote_value_accepts_only_plus_or_minus_one() {
        assert_eq!(VoteValue::try_from(1).unwrap(), VoteValue::Like);
        assert_eq!(VoteValue::try_from(-1).unwrap(), VoteValue::Dislike);
        for bad in [0, 2, -2, 100] {
            assert!(matches!(
                VoteValue::try_from(bad),
                Err(ServiceError::Invalid(_))
            ));
        }
    }

    #[test]
    fn revote_replaces_previous_value() {
        let db = Database::open_in_memory().unwrap();
        let author = seed_user(&db, "alice");
        let voter = seed_user(&db, "carol");
        let post = seed_post(&db, author, "hello");

        let after_like = cast_vote(&db, VoteSubject::Post, post, voter, VoteValue::Like).unwrap();
        assert_eq!(after_like, VoteTally { likes: 1, dislikes: 0 });

        let after_flip =
            cast_vote(&db, VoteSubject::Post, post, voter, VoteValue::Dislike).unwrap();
        assert_eq!(after_flip, VoteTally { likes: 0, dislikes: 1 });

        let rows: i64 = db
            .with_repositories(|repos| {
                Ok(repos.conn().query_row(
                    "SELECT COUNT(*) FROM post_votes WHERE post_id = ?1 AND user_id = ?2",
                    rusqlite::params![post, voter],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn repeated_identical_vote_is_a_no_op() {
        let db = Database::open_in_memory().unwrap();
        let author = seed_user(&db, "alice");
        let post = seed_post(&db, author, "hello");
        cast_vote(&db, VoteSubject::Post, post, author, VoteValue::Like).unwrap();
        let tally = cast_vote(&db, VoteSubject::Post, post, author, VoteValue::Like).unwrap();
        assert_eq!(tally, VoteTally { likes: 1, dislikes: 0 });
    }

    #[test]
    fn tally_without_votes_is_zero() {
        let db = Database::open_in_memory().unwrap();
        let author = seed_user(&db, "alice");
        let post = seed_post(&db, author, "quiet");
        assert_eq!(tally(&db, VoteSubject::Post, post).unwrap(), VoteTally::default());
        assert_eq!(tally(&db, VoteSubject::Comment, 12345).unwrap(), VoteTally::default());
    }

    #[test]
    fn voting_on_missing_subject_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let voter = seed_user(&db, "carol");
        let err = cast_vote(&db, VoteSubject::Comment, 77, voter, VoteValue::Like).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn votes_from_several_users_are_counted_separately() {
        let db = Database::open_in_memory().unwrap();
        let author = seed_user(&db, "alice");
        let post = seed_post(&db, author, "popular");
        let users: Vec<i64> = ["b", "c", "d"].iter().map(|n| seed_user(&db, n)).collect();
        cast_vote(&db, VoteSubject::Post, post, users[0], VoteValue::Like).unwrap();
        cast_vote(&db, VoteSubject::Post, post, users[1], VoteValue::Like).unwrap();
        let tally = cast_vote(&db, VoteSubject::Post, post, users[2], VoteValue::Dislike).unwrap();
        assert_eq!(tally, VoteTally { likes: 2, dislikes: 1 });
    }
}
