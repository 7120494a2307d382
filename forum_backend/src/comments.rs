//! Comments on posts, their votes, and who may remove them.

use crate::database::models::{CommentRecord, NewComment, PostRecord, TalliedComment};
use crate::database::repositories::{CommentRepository, PostRepository};
use crate::database::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::now_utc_iso;
use crate::votes::{self, VoteSubject, VoteTally, VoteValue};
use anyhow::anyhow;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub post_id: i64,
    pub content: String,
}

/// A comment may be removed by its own author or by the author of the post
/// it sits under.
pub fn can_delete(requester_id: i64, comment: &CommentRecord, post: &PostRecord) -> bool {
    comment.author_id == requester_id || post.author_id == requester_id
}

#[derive(Clone)]
pub struct CommentService {
    database: Database,
}

impl CommentService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create(&self, author_id: i64, input: CommentInput) -> ServiceResult<CommentRecord> {
        if input.content.trim().is_empty() {
            return Err(ServiceError::invalid("comment may not be empty"));
        }
        let record = NewComment {
            post_id: input.post_id,
            author_id,
            content: input.content,
            created_at: now_utc_iso(),
        };
        let created = self.database.with_repositories(|repos| {
            if repos.posts().get(record.post_id)?.is_none() {
                return Ok(None);
            }
            let comments = repos.comments();
            let id = comments.create(&record)?;
            let comment = comments
                .get(id)?
                .ok_or_else(|| anyhow!("comment creation lost newly inserted record"))?;
            Ok(Some(comment))
        })?;
        let comment = created.ok_or_else(|| {
            ServiceError::not_found(format!("post {} not found", record.post_id))
        })?;
        tracing::info!(comment_id = comment.id, post_id = comment.post_id, author_id, "comment created");
        Ok(comment)
    }

    pub fn list_for_post(&self, post_id: i64) -> ServiceResult<Vec<TalliedComment>> {
        let comments = self.database.with_repositories(|repos| {
            if repos.posts().get(post_id)?.is_none() {
                return Ok(None);
            }
            Ok(Some(repos.comments().list_for_post(post_id)?))
        })?;
        comments.ok_or_else(|| ServiceError::not_found(format!("post {post_id} not found")))
    }

    pub fn get(&self, comment_id: i64) -> ServiceResult<CommentRecord> {
        self.database
            .with_repositories(|repos| repos.comments().get(comment_id))?
            .ok_or_else(|| comment_not_found(comment_id))
    }

    /// Deletes a comment after checking `can_delete` against the comment's
    /// own parent post. Returns the deleted comment.
    pub fn delete(&self, requester_id: i64, comment_id: i64) -> ServiceResult<CommentRecord> {
        let found = self.database.with_repositories(|repos| {
            let Some(comment) = repos.comments().get(comment_id)? else {
                return Ok(None);
            };
            let post = repos
                .posts()
                .get(comment.post_id)?
                .ok_or_else(|| anyhow!("comment {comment_id} references missing post"))?;
            Ok(Some((comment, post)))
        })?;
        let (comment, post) = found.ok_or_else(|| comment_not_found(comment_id))?;

        if !can_delete(requester_id, &comment, &post) {
            tracing::debug!(comment_id, requester_id, "comment delete refused");
            return Err(ServiceError::forbidden(
                "only the comment author or the post author may delete this comment",
            ));
        }

        let deleted = self
            .database
            .with_repositories(|repos| repos.comments().delete(comment_id))?;
        if !deleted {
            return Err(comment_not_found(comment_id));
        }
        tracing::info!(comment_id, post_id = comment.post_id, requester_id, "comment deleted");
        Ok(comment)
    }

    pub fn vote(&self, comment_id: i64, user_id: i64, value: VoteValue) -> ServiceResult<VoteTally> {
        votes::cast_vote(&self.database, VoteSubject::Comment, comment_id, user_id, value)
    }

    pub fn tally(&self, comment_id: i64) -> ServiceResult<VoteTally> {
        votes::tally(&self.database, VoteSubject::Comment, comment_id)
    }
}

fn comment_not_found(comment_id: i64) -> ServiceError {
    ServiceError::not_found(format!("comment {comment_id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_post, seed_user};

    fn comment(service: &CommentService, author: i64, post: i64, text: &str) -> CommentRecord {
        service
            .create(
                author,
                CommentInput {
                    post_id: post,
                    content: text.into(),
                },
            )
            .unwrap()
    }

    #[test]
    fn can_delete_allows_comment_author_and_post_author_only() {
        let db = Database::open_in_memory().unwrap();
        let service = CommentService::new(db.clone());
        let alice = seed_user(&db, "alice");
        let dave = seed_user(&db, "dave");
        let erin = seed_user(&db, "erin");
        let post_id = seed_post(&db, alice, "thread");
        let by_dave = comment(&service, dave, post_id, "hi");
        let post = db
            .with_repositories(|repos| repos.posts().get(post_id))
            .unwrap()
            .unwrap();

        assert!(can_delete(dave, &by_dave, &post));
        assert!(can_delete(alice, &by_dave, &post));
        assert!(!can_delete(erin, &by_dave, &post));
    }

    #[test]
    fn delete_scenario_matches_ownership_rules() {
        let db = Database::open_in_memory().unwrap();
        let service = CommentService::new(db.clone());
        let alice = seed_user(&db, "alice");
        let dave = seed_user(&db, "dave");
        let post = seed_post(&db, alice, "thread");

        let from_alice = comment(&service, alice, post, "mine");
        let from_dave = comment(&service, dave, post, "dave's");

        // dave is unrelated to alice's comment on alice's post
        assert!(matches!(
            service.delete(dave, from_alice.id),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(service.get(from_alice.id).is_ok());

        service.delete(alice, from_alice.id).unwrap();
        // alice owns the post, so she may remove dave's comment too
        let removed = service.delete(alice, from_dave.id).unwrap();
        assert_eq!(removed.id, from_dave.id);
        assert!(service.list_for_post(post).unwrap().is_empty());

        assert!(matches!(
            service.delete(alice, from_dave.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn post_owner_check_uses_the_comments_own_post() {
        let db = Database::open_in_memory().unwrap();
        let service = CommentService::new(db.clone());
        let alice = seed_user(&db, "alice");
        let dave = seed_user(&db, "dave");
        let _alices_post = seed_post(&db, alice, "alice's");
        let daves_post = seed_post(&db, dave, "dave's");
        let on_daves = comment(&service, dave, daves_post, "reply");

        // owning some other post grants nothing
        assert!(matches!(
            service.delete(alice, on_daves.id),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn create_validates_content_and_post() {
        let db = Database::open_in_memory().unwrap();
        let service = CommentService::new(db.clone());
        let alice = seed_user(&db, "alice");
        let post = seed_post(&db, alice, "thread");

        assert!(matches!(
            service.create(
                alice,
                CommentInput {
                    post_id: post,
                    content: "  ".into()
                }
            ),
            Err(ServiceError::Invalid(_))
        ));
        assert!(matches!(
            service.create(
                alice,
                CommentInput {
                    post_id: post + 10,
                    content: "hello".into()
                }
            ),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.list_for_post(post + 10),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn comment_votes_flip_and_tally() {
        let db = Database::open_in_memory().unwrap();
        let service = CommentService::new(db.clone());
        let alice = seed_user(&db, "alice");
        let carol = seed_user(&db, "carol");
        let post = seed_post(&db, alice, "thread");
        let c = comment(&service, alice, post, "vote on me");

        assert_eq!(
            service.vote(c.id, carol, VoteValue::Like).unwrap(),
            VoteTally { likes: 1, dislikes: 0 }
        );
        assert_eq!(
            service.vote(c.id, carol, VoteValue::Dislike).unwrap(),
            VoteTally { likes: 0, dislikes: 1 }
        );
        assert_eq!(service.tally(c.id).unwrap(), VoteTally { likes: 0, dislikes: 1 });

        let listed = service.list_for_post(post).unwrap();
        assert_eq!(listed[0].tally, VoteTally { likes: 0, dislikes: 1 });
    }
}
