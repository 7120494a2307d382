use crate::database::models::{
    BoardRecord, NewPost, PostChanges, PostRecord, TalliedComment, TalliedPost,
};
use crate::database::repositories::{
    BoardRepository, CommentRepository, PostRepository, ViewRepository, VoteRepository,
};
use crate::database::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::{non_empty, now_utc_iso};
use crate::votes::{self, VoteSubject, VoteTally, VoteValue};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECENT_LIMIT: usize = 50;
pub const MAX_RECENT_LIMIT: usize = 200;

/// Fields submitted when creating or editing a post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    pub board_id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(skip)]
    pub image_data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetails {
    #[serde(flatten)]
    pub post: TalliedPost,
    pub board: BoardRecord,
    pub views: i64,
    pub comments: Vec<TalliedComment>,
    /// The viewer's own vote, when a signed-in user asked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_vote: Option<i64>,
}

pub struct PostImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[derive(Clone)]
pub struct PostService {
    database: Database,
}

impl PostService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Newest posts first. `limit` is clamped to `1..=MAX_RECENT_LIMIT`.
    pub fn list_recent(&self, limit: usize) -> ServiceResult<Vec<TalliedPost>> {
        let limit = limit.clamp(1, MAX_RECENT_LIMIT);
        Ok(self
            .database
            .with_repositories(|repos| repos.posts().list_recent(limit))?)
    }

    pub fn list_for_board(&self, board_id: i64) -> ServiceResult<Vec<TalliedPost>> {
        Ok(self
            .database
            .with_repositories(|repos| repos.posts().list_for_board(board_id))?)
    }

    pub fn list_for_author(&self, author_id: i64) -> ServiceResult<Vec<TalliedPost>> {
        Ok(self
            .database
            .with_repositories(|repos| repos.posts().list_for_author(author_id))?)
    }

    pub fn get(&self, post_id: i64) -> ServiceResult<PostRecord> {
        self.database
            .with_repositories(|repos| repos.posts().get(post_id))?
            .ok_or_else(|| post_not_found(post_id))
    }

    /// Loads a post with its board, comments and counters. A signed-in
    /// `viewer` is recorded as having seen the post.
    pub fn details(&self, post_id: i64, viewer: Option<i64>) -> ServiceResult<PostDetails> {
        let details = self.database.with_repositories(|repos| {
            let Some(post) = repos.posts().get(post_id)? else {
                return Ok(None);
            };
            if let Some(viewer) = viewer {
                repos.views().record(post_id, viewer, &now_utc_iso())?;
            }
            let board = repos
                .boards()
                .get(post.board_id)?
                .ok_or_else(|| anyhow!("post {post_id} references missing board"))?;
            let post_votes = repos.votes(VoteSubject::Post);
            let tally = post_votes.tally(post_id)?;
            let viewer_vote = match viewer {
                Some(viewer) => post_votes.value_for(post_id, viewer)?.map(VoteValue::as_i64),
                None => None,
            };
            Ok(Some(PostDetails {
                post: TalliedPost { post, tally },
                board,
                views: repos.views().count(post_id)?,
                comments: repos.comments().list_for_post(post_id)?,
                viewer_vote,
            }))
        })?;
        details.ok_or_else(|| post_not_found(post_id))
    }

    pub fn create(&self, author_id: i64, input: PostInput) -> ServiceResult<PostRecord> {
        let input = validate(input)?;
        let record = NewPost {
            board_id: input.board_id,
            author_id,
            title: input.title,
            content: input.content,
            image_url: input.image_url,
            link_url: input.link_url,
            image_data: input.image_data,
            created_at: now_utc_iso(),
        };

        let created = self.database.with_repositories(|repos| {
            if repos.boards().get(record.board_id)?.is_none() {
                return Ok(None);
            }
            let posts = repos.posts();
            let id = posts.create(&record)?;
            let post = posts
                .get(id)?
                .ok_or_else(|| anyhow!("post creation lost newly inserted record"))?;
            Ok(Some(post))
        })?;
        let post = created.ok_or_else(|| {
            ServiceError::invalid(format!("board {} does not exist", record.board_id))
        })?;
        tracing::info!(
            post_id = post.id,
            board_id = post.board_id,
            author_id,
            has_image = post.has_image,
            "post created"
        );
        Ok(post)
    }

    /// Replaces the editable fields of a post. Only the author may edit.
    /// Without new image bytes the stored image is kept.
    pub fn update(&self, requester_id: i64, post_id: i64, input: PostInput) -> ServiceResult<PostRecord> {
        let existing = self.get(post_id)?;
        ensure_author(requester_id, &existing)?;
        let input = validate(input)?;
        let changes = PostChanges {
            board_id: input.board_id,
            title: input.title,
            content: input.content,
            image_url: input.image_url,
            link_url: input.link_url,
            image_data: input.image_data,
            updated_at: now_utc_iso(),
        };

        let board_exists = self.database.with_repositories(|repos| {
            if repos.boards().get(changes.board_id)?.is_none() {
                return Ok(false);
            }
            repos.posts().update(post_id, &changes)?;
            Ok(true)
        })?;
        if !board_exists {
            return Err(ServiceError::invalid(format!(
                "board {} does not exist",
                changes.board_id
            )));
        }
        tracing::info!(post_id, requester_id, "post updated");
        self.get(post_id)
    }

    pub fn delete(&self, requester_id: i64, post_id: i64) -> ServiceResult<()> {
        let existing = self.get(post_id)?;
        ensure_author(requester_id, &existing)?;
        let deleted = self
            .database
            .with_repositories(|repos| repos.posts().delete(post_id))?;
        if !deleted {
            return Err(post_not_found(post_id));
        }
        tracing::info!(post_id, requester_id, "post deleted");
        Ok(())
    }

    pub fn vote(&self, post_id: i64, user_id: i64, value: VoteValue) -> ServiceResult<VoteTally> {
        votes::cast_vote(&self.database, VoteSubject::Post, post_id, user_id, value)
    }

    pub fn tally(&self, post_id: i64) -> ServiceResult<VoteTally> {
        votes::tally(&self.database, VoteSubject::Post, post_id)
    }

    /// Stored image bytes with a content type sniffed from the data.
    pub fn image(&self, post_id: i64) -> ServiceResult<PostImage> {
        let bytes = self
            .database
            .with_repositories(|repos| repos.posts().image_data(post_id))?
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| ServiceError::not_found(format!("post {post_id} has no image")))?;
        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(PostImage { bytes, mime })
    }
}

fn post_not_found(post_id: i64) -> ServiceError {
    ServiceError::not_found(format!("post {post_id} not found"))
}

fn ensure_author(requester_id: i64, post: &PostRecord) -> ServiceResult<()> {
    if post.author_id != requester_id {
        return Err(ServiceError::forbidden(
            "only the author may change this post",
        ));
    }
    Ok(())
}

fn validate(input: PostInput) -> ServiceResult<PostInput> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::invalid("post title may not be empty"));
    }
    if input.content.trim().is_empty() {
        return Err(ServiceError::invalid("post content may not be empty"));
    }
    let link_url = non_empty(input.link_url);
    if link_url.as_deref().is_some_and(|link| !is_web_url(link)) {
        return Err(ServiceError::invalid(
            "link must start with http:// or https://",
        ));
    }
    let image_url = non_empty(input.image_url);
    if image_url.as_deref().is_some_and(|url| !is_web_url(url)) {
        return Err(ServiceError::invalid(
            "image URL must start with http:// or https://",
        ));
    }
    let image_data = input.image_data.filter(|bytes| !bytes.is_empty());
    if let Some(bytes) = &image_data {
        if !infer::is_image(bytes) {
            return Err(ServiceError::invalid("uploaded file is not a recognised image"));
        }
    }
    Ok(PostInput {
        board_id: input.board_id,
        title,
        content: input.content,
        image_url,
        link_url,
        image_data,
    })
}

fn is_web_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seed_user;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn input(title: &str) -> PostInput {
        PostInput {
            board_id: 1,
            title: title.into(),
            content: "some **markdown** body".into(),
            ..PostInput::default()
        }
    }

    #[test]
    fn create_and_fetch_details() {
        let db = Database::open_in_memory().unwrap();
        let service = PostService::new(db.clone());
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");

        let post = service.create(alice, input("  Hello  ")).unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.author_name, "alice");

        service.vote(post.id, bob, VoteValue::Like).unwrap();
        assert_eq!(service.tally(post.id).unwrap(), VoteTally { likes: 1, dislikes: 0 });
        let details = service.details(post.id, Some(bob)).unwrap();
        assert_eq!(details.post.tally, VoteTally { likes: 1, dislikes: 0 });
        assert_eq!(details.views, 1);
        assert_eq!(details.viewer_vote, Some(1));
        assert_eq!(details.board.id, 1);
        assert!(details.comments.is_empty());

        // anonymous views are not counted
        let anonymous = service.details(post.id, None).unwrap();
        assert_eq!(anonymous.views, 1);
        assert_eq!(anonymous.viewer_vote, None);
    }

    #[test]
    fn create_rejects_bad_input() {
        let db = Database::open_in_memory().unwrap();
        let service = PostService::new(db.clone());
        let alice = seed_user(&db, "alice");

        let mut missing_board = input("x");
        missing_board.board_id = 999;
        let mut bad_link = input("x");
        bad_link.link_url = Some("javascript:alert(1)".into());
        let mut bad_image_url = input("x");
        bad_image_url.image_url = Some("data:image/svg+xml,<svg onload=alert(1)>".into());
        let mut empty_body = input("x");
        empty_body.content = "   ".into();
        let mut not_an_image = input("x");
        not_an_image.image_data = Some(b"plain text, not pixels".to_vec());

        for bad in [
            input(" "),
            missing_board,
            bad_link,
            bad_image_url,
            empty_body,
            not_an_image,
        ] {
            assert!(matches!(
                service.create(alice, bad),
                Err(ServiceError::Invalid(_))
            ));
        }
        assert!(service.list_recent(10).unwrap().is_empty());
    }

    #[test]
    fn only_author_updates_and_deletes() {
        let db = Database::open_in_memory().unwrap();
        let service = PostService::new(db.clone());
        let alice = seed_user(&db, "alice");
        let mallory = seed_user(&db, "mallory");
        let post = service.create(alice, input("Original")).unwrap();

        assert!(matches!(
            service.update(mallory, post.id, input("Hijacked")),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete(mallory, post.id),
            Err(ServiceError::Forbidden(_))
        ));

        let mut edit = input("Edited");
        edit.link_url = Some("https://example.com".into());
        let updated = service.update(alice, post.id, edit).unwrap();
        assert_eq!(updated.title, "Edited");
        assert_eq!(updated.link_url.as_deref(), Some("https://example.com"));

        service.delete(alice, post.id).unwrap();
        assert!(matches!(service.get(post.id), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            service.delete(alice, post.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn image_is_served_with_sniffed_type() {
        let db = Database::open_in_memory().unwrap();
        let service = PostService::new(db.clone());
        let alice = seed_user(&db, "alice");

        let mut with_image = input("Picture");
        let mut bytes = PNG_HEADER.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        with_image.image_data = Some(bytes.clone());
        let post = service.create(alice, with_image).unwrap();
        assert!(post.has_image);

        let image = service.image(post.id).unwrap();
        assert_eq!(image.mime, "image/png");
        assert_eq!(image.bytes, bytes);

        // editing without new bytes keeps the image
        service.update(alice, post.id, input("Picture v2")).unwrap();
        assert_eq!(service.image(post.id).unwrap().bytes, bytes);

        let plain = service.create(alice, input("No picture")).unwrap();
        assert!(!plain.has_image);
        assert!(matches!(service.image(plain.id), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn lists_filter_by_board_and_author() {
        let db = Database::open_in_memory().unwrap();
        let service = PostService::new(db.clone());
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");

        service.create(alice, input("a1")).unwrap();
        let mut other_board = input("b1");
        other_board.board_id = 2;
        service.create(bob, other_board).unwrap();

        assert_eq!(service.list_for_board(1).unwrap().len(), 1);
        assert_eq!(service.list_for_board(2).unwrap().len(), 1);
        let bobs = service.list_for_author(bob).unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].post.title, "b1");
        assert_eq!(service.list_recent(DEFAULT_RECENT_LIMIT).unwrap().len(), 2);
    }

    #[test]
    fn recent_limit_is_clamped() {
        let db = Database::open_in_memory().unwrap();
        let service = PostService::new(db.clone());
        let alice = seed_user(&db, "alice");
        for n in 0..3 {
            service.create(alice, input(&format!("p{n}"))).unwrap();
        }

        assert_eq!(service.list_recent(0).unwrap().len(), 1);
        assert_eq!(service.list_recent(usize::MAX).unwrap().len(), 3);
    }

    #[test]
    fn missing_post_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let service = PostService::new(db.clone());
        let voter = seed_user(&db, "carol");
        assert!(matches!(service.details(5, None), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            service.vote(5, voter, VoteValue::Like),
            Err(ServiceError::NotFound(_))
        ));
    }
}
