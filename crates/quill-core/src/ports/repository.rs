use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Choice, Comment, Post, PostStatus, Question, Tag, User};
use crate::error::RepoError;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Save an entity (create or update).
    async fn save(&self, entity: T) -> Result<T, RepoError>;
}

/// Thresholds applied to full-text search results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchPolicy {
    /// Title trigram similarity must be strictly greater than this.
    pub min_similarity: f64,
    /// Minimum rank, when set. Disabled in the default policy.
    pub min_rank: Option<f64>,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            min_similarity: 0.1,
            min_rank: None,
        }
    }
}

/// A post matched by search, with its scores.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub post: Post,
    pub rank: f64,
    pub similarity: f64,
}

/// A post sharing tags with another post.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarPost {
    pub post: Post,
    pub same_tags: u64,
}

/// A post annotated with its total number of comments.
#[derive(Debug, Clone, Serialize)]
pub struct CommentedPost {
    pub post: Post,
    pub total_comments: u64,
}

/// Staff-side post listing filter.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    /// Case-insensitive substring matched against title and body.
    pub search: Option<String>,
}

/// User repository with domain-specific methods.
#[async_trait]
pub trait UserRepository: BaseRepository<User, Uuid> {
    /// Find a user by their login name.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
}

/// Post repository. Every `*_published` method only ever sees PUBLISHED posts
/// and orders by publish date, newest first, unless stated otherwise.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    async fn find_published(&self, id: Uuid) -> Result<Option<Post>, RepoError>;

    /// Published post with `slug` whose publish timestamp falls on `date` (UTC).
    async fn find_published_on(
        &self,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Post>, RepoError>;

    /// Count published posts, optionally restricted to those carrying `tag_id`.
    async fn count_published(&self, tag_id: Option<Uuid>) -> Result<u64, RepoError>;

    async fn list_published(
        &self,
        tag_id: Option<Uuid>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Post>, RepoError>;

    /// Ranked search: title weighted above body, filtered by title similarity,
    /// ordered by rank descending.
    async fn search_published(
        &self,
        query: &str,
        policy: &SearchPolicy,
    ) -> Result<Vec<SearchHit>, RepoError>;

    /// Posts sharing at least one tag with `post_id`, excluding it, ordered by
    /// shared tag count then publish date.
    async fn similar_published(
        &self,
        post_id: Uuid,
        limit: u64,
    ) -> Result<Vec<SimilarPost>, RepoError>;

    /// Published posts ordered by their total comment count.
    async fn most_commented(&self, limit: u64) -> Result<Vec<CommentedPost>, RepoError>;

    /// All posts regardless of status, ordered by status then publish date.
    async fn list_all(&self, filter: &PostFilter) -> Result<Vec<Post>, RepoError>;

    /// Whether another post already uses `slug` on `date`.
    async fn slug_taken(
        &self,
        date: NaiveDate,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError>;
}

/// Tag repository.
#[async_trait]
pub trait TagRepository: BaseRepository<Tag, Uuid> {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError>;

    /// Tags of each given post. Posts without tags may be absent from the map.
    async fn tags_for_posts(&self, post_ids: &[Uuid])
    -> Result<HashMap<Uuid, Vec<Tag>>, RepoError>;

    /// Replace the tag set of a post.
    async fn set_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError>;
}

/// Comment repository.
#[async_trait]
pub trait CommentRepository: BaseRepository<Comment, Uuid> {
    /// Active comments of a post, oldest first.
    async fn active_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError>;

    /// All comments, optionally filtered by `active`, newest first.
    async fn list(&self, active: Option<bool>) -> Result<Vec<Comment>, RepoError>;
}

/// Poll question repository.
#[async_trait]
pub trait QuestionRepository: BaseRepository<Question, Uuid> {
    /// Questions with `pub_date <= now`, newest first.
    async fn latest(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<Question>, RepoError>;

    async fn choices_for(&self, question_id: Uuid) -> Result<Vec<Choice>, RepoError>;

    async fn save_choice(&self, choice: Choice) -> Result<Choice, RepoError>;

    /// Atomically add one vote. Returns `false` when the choice does not
    /// belong to the question.
    async fn increment_votes(&self, question_id: Uuid, choice_id: Uuid)
    -> Result<bool, RepoError>;
}
