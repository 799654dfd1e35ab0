//! Content query service: search, listing, detail, comments and sharing of
//! published blog posts.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{Comment, Post, Tag};
use crate::error::DomainError;
use crate::forms::{CommentForm, EmailPostForm};
use crate::pagination::{Page, resolve_page};
use crate::ports::{
    CommentRepository, CommentedPost, MailMessage, Mailer, PostRepository, SearchHit,
    SearchPolicy, SimilarPost, TagRepository,
};

/// Tunables of the content service.
#[derive(Debug, Clone)]
pub struct ContentSettings {
    /// Posts per listing page.
    pub page_size: u64,
    /// Maximum number of similar posts shown with a post.
    pub similar_limit: u64,
    pub search: SearchPolicy,
    /// Sender address of share emails.
    pub mail_from: String,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            page_size: 3,
            similar_limit: 4,
            search: SearchPolicy::default(),
            mail_from: "webmaster@localhost".to_string(),
        }
    }
}

/// A post together with its tags.
#[derive(Debug, Clone)]
pub struct TaggedPost {
    pub post: Post,
    pub tags: Vec<Tag>,
}

/// A search hit with the post's tags.
#[derive(Debug, Clone)]
pub struct RankedPost {
    pub post: Post,
    pub tags: Vec<Tag>,
    pub rank: f64,
    pub similarity: f64,
}

/// One page of published posts, optionally narrowed to a tag.
#[derive(Debug, Clone)]
pub struct PostListing {
    pub page: Page<TaggedPost>,
    pub tag: Option<Tag>,
}

/// A published post with everything shown alongside it.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    pub tags: Vec<Tag>,
    pub comments: Vec<Comment>,
    pub similar_posts: Vec<SimilarPost>,
}

pub struct ContentService {
    posts: Arc<dyn PostRepository>,
    tags: Arc<dyn TagRepository>,
    comments: Arc<dyn CommentRepository>,
    mailer: Arc<dyn Mailer>,
    settings: ContentSettings,
}

impl ContentService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        tags: Arc<dyn TagRepository>,
        comments: Arc<dyn CommentRepository>,
        mailer: Arc<dyn Mailer>,
        settings: ContentSettings,
    ) -> Self {
        Self {
            posts,
            tags,
            comments,
            mailer,
            settings,
        }
    }

    /// Ranked search over published posts.
    ///
    /// A missing or blank query yields no results without touching the store.
    pub async fn search(&self, query: Option<&str>) -> Result<Vec<RankedPost>, DomainError> {
        let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            return Ok(Vec::new());
        };

        let hits = self
            .posts
            .search_published(query, &self.settings.search)
            .await?;

        tracing::debug!(query = %query, hits = hits.len(), "Post search");

        let ids: Vec<Uuid> = hits.iter().map(|h| h.post.id).collect();
        let mut tags = self.tags.tags_for_posts(&ids).await?;
        Ok(hits
            .into_iter()
            .map(|hit: SearchHit| RankedPost {
                tags: tags.remove(&hit.post.id).unwrap_or_default(),
                post: hit.post,
                rank: hit.rank,
                similarity: hit.similarity,
            })
            .collect())
    }

    /// Page through published posts, optionally filtered by tag slug.
    pub async fn list_published(
        &self,
        tag_slug: Option<&str>,
        page: Option<&str>,
    ) -> Result<PostListing, DomainError> {
        let tag = match tag_slug {
            Some(slug) => Some(
                self.tags
                    .find_by_slug(slug)
                    .await?
                    .ok_or_else(|| DomainError::not_found("Tag", slug))?,
            ),
            None => None,
        };
        let tag_id = tag.as_ref().map(|t| t.id);

        let count = self.posts.count_published(tag_id).await?;
        let window = resolve_page(page, count, self.settings.page_size);
        let posts = self
            .posts
            .list_published(tag_id, window.offset, window.limit)
            .await?;

        Ok(PostListing {
            page: Page {
                items: self.with_tags(posts).await?,
                number: window.number,
                num_pages: window.num_pages,
                count,
                per_page: window.limit,
            },
            tag,
        })
    }

    /// Published post by its canonical date and slug.
    pub async fn get_published_detail(
        &self,
        year: i32,
        month: u32,
        day: u32,
        slug: &str,
    ) -> Result<PostDetail, DomainError> {
        let key = format!("{}/{}/{}/{}", year, month, day, slug);
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| DomainError::not_found("Post", &key))?;

        let post = self
            .posts
            .find_published_on(date, slug)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", &key))?;

        let tags = self.tags_of(post.id).await?;
        let comments = self.comments.active_for_post(post.id).await?;
        let similar_posts = self
            .posts
            .similar_published(post.id, self.settings.similar_limit)
            .await?;

        Ok(PostDetail {
            post,
            tags,
            comments,
            similar_posts,
        })
    }

    /// Published post by id.
    pub async fn published_post(&self, post_id: Uuid) -> Result<Post, DomainError> {
        self.posts
            .find_published(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", post_id))
    }

    /// Attach a reader comment to a published post.
    pub async fn submit_comment(
        &self,
        post_id: Uuid,
        form: CommentForm,
    ) -> Result<Comment, DomainError> {
        let post = self.published_post(post_id).await?;
        let clean = form.clean().map_err(DomainError::Validation)?;

        let comment = Comment::new(post.id, clean.name, clean.email, clean.body);
        let saved = self.comments.save(comment).await?;

        tracing::info!(post_id = %post.id, comment_id = %saved.id, "Comment added");
        Ok(saved)
    }

    /// Email a recommendation of a published post.
    ///
    /// `base_url` is the scheme and host the canonical path is appended to.
    pub async fn share_by_email(
        &self,
        post_id: Uuid,
        form: EmailPostForm,
        base_url: &str,
    ) -> Result<bool, DomainError> {
        let post = self.published_post(post_id).await?;
        let clean = form.clean().map_err(DomainError::Validation)?;

        let post_url = format!("{}{}", base_url.trim_end_matches('/'), post.canonical_url());
        let message = MailMessage {
            from: self.settings.mail_from.clone(),
            to: vec![clean.to],
            subject: format!(
                "{} ({}) recommends you read {}",
                clean.name, clean.email, post.title
            ),
            text: format!(
                "Read {} at {}\n\n{}'s comments: {}",
                post.title, post_url, clean.name, clean.comments
            ),
        };

        self.mailer
            .send(message)
            .await
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        tracing::info!(post_id = %post.id, "Post shared by email");
        Ok(true)
    }

    /// Number of published posts.
    pub async fn total_posts(&self) -> Result<u64, DomainError> {
        Ok(self.posts.count_published(None).await?)
    }

    /// Newest published posts.
    pub async fn latest_posts(&self, count: u64) -> Result<Vec<Post>, DomainError> {
        Ok(self.posts.list_published(None, 0, count).await?)
    }

    pub async fn most_commented_posts(
        &self,
        count: u64,
    ) -> Result<Vec<CommentedPost>, DomainError> {
        Ok(self.posts.most_commented(count).await?)
    }

    async fn tags_of(&self, post_id: Uuid) -> Result<Vec<Tag>, DomainError> {
        let mut tags = self.tags.tags_for_posts(&[post_id]).await?;
        Ok(tags.remove(&post_id).unwrap_or_default())
    }

    async fn with_tags(&self, posts: Vec<Post>) -> Result<Vec<TaggedPost>, DomainError> {
        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let mut tags = self.tags.tags_for_posts(&ids).await?;

        Ok(posts
            .into_iter()
            .map(|post| {
                let tags = tags.remove(&post.id).unwrap_or_default();
                TaggedPost { post, tags }
            })
            .collect())
    }
}
