//! In-memory content store - used when no database is configured, and by tests.
//!
//! Implements every repository port over plain maps behind one async RwLock.
//! Note: Data is lost on process restart.

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Choice, Comment, Post, PostStatus, Question, Tag, User};
use quill_core::error::RepoError;
use quill_core::ports::{
    BaseRepository, CommentRepository, CommentedPost, PostFilter, PostRepository,
    QuestionRepository, SearchHit, SearchPolicy, SimilarPost, TagRepository, UserRepository,
};

use crate::search;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
    tags: HashMap<Uuid, Tag>,
    /// (post_id, tag_id) pairs.
    post_tags: Vec<(Uuid, Uuid)>,
    comments: HashMap<Uuid, Comment>,
    questions: HashMap<Uuid, Question>,
    choices: HashMap<Uuid, Choice>,
}

impl Tables {
    /// Published posts in default order: newest publish date first.
    fn published(&self) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self.posts.values().filter(|p| p.is_published()).collect();
        posts.sort_by_key(|p| (Reverse(p.publish), p.id));
        posts
    }

    fn has_tag(&self, post_id: Uuid, tag_id: Uuid) -> bool {
        self.post_tags
            .iter()
            .any(|&(p, t)| p == post_id && t == tag_id)
    }

    fn tag_ids_of(&self, post_id: Uuid) -> Vec<Uuid> {
        self.post_tags
            .iter()
            .filter(|(p, _)| *p == post_id)
            .map(|(_, t)| *t)
            .collect()
    }

    fn published_tagged(&self, tag_id: Option<Uuid>) -> Vec<&Post> {
        self.published()
            .into_iter()
            .filter(|p| tag_id.is_none_or(|t| self.has_tag(p.id, t)))
            .collect()
    }
}

/// In-memory implementation of all repository ports.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Number of stored comments, active or not.
    pub async fn comment_count(&self) -> usize {
        self.tables.read().await.comments.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn save(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.username == user.username && u.id != user.id)
        {
            return Err(RepoError::Constraint("Username already exists".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn save(&self, post: Post) -> Result<Post, RepoError> {
        self.tables.write().await.posts.insert(post.id, post.clone());
        Ok(post)
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn find_published(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&id).filter(|p| p.is_published()).cloned())
    }

    async fn find_published_on(
        &self,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .published()
            .into_iter()
            .find(|p| p.slug == slug && p.publish_date() == date)
            .cloned())
    }

    async fn count_published(&self, tag_id: Option<Uuid>) -> Result<u64, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.published_tagged(tag_id).len() as u64)
    }

    async fn list_published(
        &self,
        tag_id: Option<Uuid>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .published_tagged(tag_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn search_published(
        &self,
        query: &str,
        policy: &SearchPolicy,
    ) -> Result<Vec<SearchHit>, RepoError> {
        let tables = self.tables.read().await;

        let mut hits: Vec<SearchHit> = tables
            .published()
            .into_iter()
            .map(|post| SearchHit {
                post: post.clone(),
                rank: search::rank(&post.title, &post.body, query),
                similarity: search::similarity(&post.title, query),
            })
            .filter(|hit| hit.similarity > policy.min_similarity)
            .filter(|hit| policy.min_rank.is_none_or(|min| hit.rank >= min))
            .collect();

        // Stable sort keeps store order among equal ranks.
        hits.sort_by(|a, b| b.rank.total_cmp(&a.rank));
        Ok(hits)
    }

    async fn similar_published(
        &self,
        post_id: Uuid,
        limit: u64,
    ) -> Result<Vec<SimilarPost>, RepoError> {
        let tables = self.tables.read().await;
        let own_tags = tables.tag_ids_of(post_id);

        let mut similar: Vec<SimilarPost> = tables
            .published()
            .into_iter()
            .filter(|p| p.id != post_id)
            .filter_map(|p| {
                let same_tags = own_tags
                    .iter()
                    .filter(|t| tables.has_tag(p.id, **t))
                    .count() as u64;
                (same_tags > 0).then(|| SimilarPost {
                    post: p.clone(),
                    same_tags,
                })
            })
            .collect();

        similar.sort_by_key(|s| (Reverse(s.same_tags), Reverse(s.post.publish)));
        similar.truncate(limit as usize);
        Ok(similar)
    }

    async fn most_commented(&self, limit: u64) -> Result<Vec<CommentedPost>, RepoError> {
        let tables = self.tables.read().await;

        let mut counted: Vec<CommentedPost> = tables
            .published()
            .into_iter()
            .map(|p| CommentedPost {
                post: p.clone(),
                total_comments: tables
                    .comments
                    .values()
                    .filter(|c| c.post_id == p.id)
                    .count() as u64,
            })
            .collect();

        counted.sort_by_key(|c| Reverse(c.total_comments));
        counted.truncate(limit as usize);
        Ok(counted)
    }

    async fn list_all(&self, filter: &PostFilter) -> Result<Vec<Post>, RepoError> {
        let tables = self.tables.read().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);

        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| filter.status.is_none_or(|s| p.status == s))
            .filter(|p| {
                needle.as_deref().is_none_or(|n| {
                    p.title.to_lowercase().contains(n) || p.body.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();

        posts.sort_by_key(|p| (status_order(p.status), p.publish));
        Ok(posts)
    }

    async fn slug_taken(
        &self,
        date: NaiveDate,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.values().any(|p| {
            p.slug == slug && p.publish_date() == date && Some(p.id) != exclude
        }))
    }
}

/// Status sort key matching the stored codes ("DF" < "PB").
fn status_order(status: PostStatus) -> &'static str {
    status.code()
}

#[async_trait]
impl BaseRepository<Tag, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tag>, RepoError> {
        Ok(self.tables.read().await.tags.get(&id).cloned())
    }

    async fn save(&self, tag: Tag) -> Result<Tag, RepoError> {
        let mut tables = self.tables.write().await;
        if tables
            .tags
            .values()
            .any(|t| t.slug == tag.slug && t.id != tag.id)
        {
            return Err(RepoError::Constraint("Tag slug already exists".to_string()));
        }
        tables.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }
}

#[async_trait]
impl TagRepository for InMemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.tags.values().find(|t| t.slug == slug).cloned())
    }

    async fn tags_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Tag>>, RepoError> {
        let tables = self.tables.read().await;
        let mut out: HashMap<Uuid, Vec<Tag>> = HashMap::new();

        for (post_id, tag_id) in &tables.post_tags {
            if !post_ids.contains(post_id) {
                continue;
            }
            if let Some(tag) = tables.tags.get(tag_id) {
                out.entry(*post_id).or_default().push(tag.clone());
            }
        }
        for tags in out.values_mut() {
            tags.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Ok(out)
    }

    async fn set_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&post_id) {
            return Err(RepoError::NotFound);
        }
        if let Some(missing) = tag_ids.iter().find(|t| !tables.tags.contains_key(*t)) {
            return Err(RepoError::Constraint(format!("Unknown tag {}", missing)));
        }

        tables.post_tags.retain(|(p, _)| *p != post_id);
        for tag_id in tag_ids {
            if !tables.has_tag(post_id, *tag_id) {
                tables.post_tags.push((post_id, *tag_id));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BaseRepository<Comment, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn save(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(RepoError::Constraint("Comment post does not exist".to_string()));
        }
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl CommentRepository for InMemoryStore {
    async fn active_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.active)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.created, c.id));
        Ok(comments)
    }

    async fn list(&self, active: Option<bool>) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| active.is_none_or(|a| c.active == a))
            .cloned()
            .collect();
        comments.sort_by_key(|c| Reverse(c.created));
        Ok(comments)
    }
}

#[async_trait]
impl BaseRepository<Question, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Question>, RepoError> {
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn save(&self, question: Question) -> Result<Question, RepoError> {
        self.tables
            .write()
            .await
            .questions
            .insert(question.id, question.clone());
        Ok(question)
    }
}

#[async_trait]
impl QuestionRepository for InMemoryStore {
    async fn latest(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<Question>, RepoError> {
        let tables = self.tables.read().await;
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.is_published(now))
            .cloned()
            .collect();
        questions.sort_by_key(|q| Reverse(q.pub_date));
        questions.truncate(limit as usize);
        Ok(questions)
    }

    async fn choices_for(&self, question_id: Uuid) -> Result<Vec<Choice>, RepoError> {
        let tables = self.tables.read().await;
        let mut choices: Vec<Choice> = tables
            .choices
            .values()
            .filter(|c| c.question_id == question_id)
            .cloned()
            .collect();
        choices.sort_by(|a, b| a.choice_text.cmp(&b.choice_text));
        Ok(choices)
    }

    async fn save_choice(&self, choice: Choice) -> Result<Choice, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.questions.contains_key(&choice.question_id) {
            return Err(RepoError::Constraint("Choice question does not exist".to_string()));
        }
        tables.choices.insert(choice.id, choice.clone());
        Ok(choice)
    }

    async fn increment_votes(
        &self,
        question_id: Uuid,
        choice_id: Uuid,
    ) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        match tables.choices.get_mut(&choice_id) {
            Some(choice) if choice.question_id == question_id => {
                choice.votes += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
