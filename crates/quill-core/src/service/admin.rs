//! Staff-only CRUD over posts, comments and poll questions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{Choice, Comment, Post, PostStatus, Question, Tag, User, slugify};
use crate::error::{DomainError, FieldErrors};
use crate::ports::{
    CommentRepository, PasswordService, PostFilter, PostRepository, QuestionRepository,
    TagRepository, TokenService, UserRepository,
};

const MAX_TITLE: usize = 250;
const MAX_QUESTION: usize = 200;

/// Post fields submitted by staff. Absent fields keep their current value on
/// update and take defaults on create.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub body: Option<String>,
    pub status: Option<PostStatus>,
    pub publish: Option<DateTime<Utc>>,
    /// Tag names; replaces the post's tag set when present.
    pub tags: Option<Vec<String>>,
}

/// New poll question with inline choices.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionInput {
    pub question_text: String,
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub choices: Vec<String>,
}

/// Issued admin token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_in: i64,
}

/// Dependencies of [`AdminService`].
#[derive(Clone)]
pub struct AdminDeps {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub passwords: Arc<dyn PasswordService>,
    pub tokens: Arc<dyn TokenService>,
}

pub struct AdminService {
    deps: AdminDeps,
}

impl AdminService {
    pub fn new(deps: AdminDeps) -> Self {
        Self { deps }
    }

    /// Exchange staff credentials for a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken, DomainError> {
        let user = self
            .deps
            .users
            .find_by_username(username)
            .await?
            .filter(|u| u.is_staff)
            .ok_or(DomainError::Unauthorized)?;

        let valid = self
            .deps
            .passwords
            .verify(password, &user.password_hash)
            .unwrap_or(false);
        if !valid {
            tracing::warn!(username = %username, "Rejected admin login");
            return Err(DomainError::Unauthorized);
        }

        let token = self
            .deps
            .tokens
            .generate_token(user.id, &user.username, user.is_staff)
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        Ok(AccessToken {
            token,
            expires_in: self.deps.tokens.expiration_seconds(),
        })
    }

    /// Create the staff account if no user has that name yet.
    pub async fn ensure_staff_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, DomainError> {
        if let Some(existing) = self.deps.users.find_by_username(username).await? {
            return Ok(existing);
        }

        let hash = self
            .deps
            .passwords
            .hash(password)
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        let user = User::new(username.to_string(), email.to_string(), hash).staff();
        let saved = self.deps.users.save(user).await?;

        tracing::info!(username = %saved.username, "Staff user created");
        Ok(saved)
    }

    pub async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, DomainError> {
        Ok(self.deps.posts.list_all(&filter).await?)
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        input: PostInput,
    ) -> Result<(Post, Vec<Tag>), DomainError> {
        let mut errors = FieldErrors::new();
        let title = required(&mut errors, "title", input.title.clone());
        let body = required(&mut errors, "body", input.body.clone());
        if !errors.is_empty() {
            return Err(DomainError::Validation(errors));
        }

        let mut post = Post::new(author_id, title, String::new(), body);
        post.status = input.status.unwrap_or_default();
        if let Some(publish) = input.publish {
            post.publish = publish;
        }
        post.slug = input
            .slug
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&post.title));

        self.store_post(post, input.tags).await
    }

    pub async fn update_post(
        &self,
        post_id: Uuid,
        input: PostInput,
    ) -> Result<(Post, Vec<Tag>), DomainError> {
        let mut post = self
            .deps
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", post_id))?;

        let mut errors = FieldErrors::new();
        if input.title.is_some() {
            post.title = required(&mut errors, "title", input.title);
        }
        if input.body.is_some() {
            post.body = required(&mut errors, "body", input.body);
        }
        if !errors.is_empty() {
            return Err(DomainError::Validation(errors));
        }
        if let Some(slug) = input.slug.as_deref().map(slugify).filter(|s| !s.is_empty()) {
            post.slug = slug;
        }
        if let Some(status) = input.status {
            post.status = status;
        }
        if let Some(publish) = input.publish {
            post.publish = publish;
        }
        post.updated = Utc::now();

        self.store_post(post, input.tags).await
    }

    pub async fn list_comments(&self, active: Option<bool>) -> Result<Vec<Comment>, DomainError> {
        Ok(self.deps.comments.list(active).await?)
    }

    /// Show or hide a comment.
    pub async fn set_comment_active(
        &self,
        comment_id: Uuid,
        active: bool,
    ) -> Result<Comment, DomainError> {
        let mut comment = self
            .deps
            .comments
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", comment_id))?;

        comment.active = active;
        comment.updated = Utc::now();
        let saved = self.deps.comments.save(comment).await?;

        tracing::info!(comment_id = %saved.id, active, "Comment moderated");
        Ok(saved)
    }

    pub async fn create_question(
        &self,
        input: QuestionInput,
    ) -> Result<(Question, Vec<Choice>), DomainError> {
        let mut errors = FieldErrors::new();
        let text = required(&mut errors, "question_text", Some(input.question_text));
        if text.chars().count() > MAX_QUESTION {
            errors.add("question_text", "Ensure this value has at most 200 characters.");
        }
        for (i, choice) in input.choices.iter().enumerate() {
            if choice.trim().is_empty() || choice.trim().chars().count() > MAX_QUESTION {
                errors.add(format!("choices.{}", i), "Enter a choice of 1 to 200 characters.");
            }
        }
        if !errors.is_empty() {
            return Err(DomainError::Validation(errors));
        }

        let question = Question::new(text, input.pub_date.unwrap_or_else(Utc::now));
        let question = self.deps.questions.save(question).await?;

        let mut choices = Vec::with_capacity(input.choices.len());
        for text in input.choices {
            let choice = Choice::new(question.id, text.trim().to_string());
            choices.push(self.deps.questions.save_choice(choice).await?);
        }

        tracing::info!(question_id = %question.id, choices = choices.len(), "Question created");
        Ok((question, choices))
    }

    async fn store_post(
        &self,
        post: Post,
        tag_names: Option<Vec<String>>,
    ) -> Result<(Post, Vec<Tag>), DomainError> {
        let mut errors = FieldErrors::new();
        if post.title.chars().count() > MAX_TITLE {
            errors.add("title", "Ensure this value has at most 250 characters.");
        }
        if post.slug.is_empty() {
            errors.add("slug", "This field is required.");
        } else if post.slug.chars().count() > MAX_TITLE {
            errors.add("slug", "Ensure this value has at most 250 characters.");
        } else if self
            .deps
            .posts
            .slug_taken(post.publish_date(), &post.slug, Some(post.id))
            .await?
        {
            errors.add("slug", "Slug must be unique for the publish date.");
        }
        if !errors.is_empty() {
            return Err(DomainError::Validation(errors));
        }

        let saved = self.deps.posts.save(post).await?;

        let tags = match tag_names {
            Some(names) => {
                let tags = self.resolve_tags(names).await?;
                let ids: Vec<Uuid> = tags.iter().map(|t| t.id).collect();
                self.deps.tags.set_post_tags(saved.id, &ids).await?;
                tags
            }
            None => self
                .deps
                .tags
                .tags_for_posts(&[saved.id])
                .await?
                .remove(&saved.id)
                .unwrap_or_default(),
        };

        tracing::info!(post_id = %saved.id, status = saved.status.code(), "Post saved");
        Ok((saved, tags))
    }

    /// Look up tags by name, creating the missing ones.
    async fn resolve_tags(&self, names: Vec<String>) -> Result<Vec<Tag>, DomainError> {
        let mut tags: Vec<Tag> = Vec::new();
        for name in names {
            let name = name.trim();
            let slug = slugify(name);
            if slug.is_empty() || tags.iter().any(|t| t.slug == slug) {
                continue;
            }
            let tag = match self.deps.tags.find_by_slug(&slug).await? {
                Some(tag) => tag,
                None => self.deps.tags.save(Tag::new(name)).await?,
            };
            tags.push(tag);
        }
        Ok(tags)
    }
}

/// Take a trimmed non-blank value, recording an error when it is missing.
fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            errors.add(field, "This field is required.");
            String::new()
        }
    }
}
