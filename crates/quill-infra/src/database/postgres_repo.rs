//! PostgreSQL repository implementations.
//!
//! Ranking, similarity and comment counts run as raw SQL returning
//! `(id, score)` rows; the posts themselves are then loaded through the
//! entity so the column mapping lives in one place.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbBackend, DbConn, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, Statement,
    TransactionTrait,
};
use uuid::Uuid;

use quill_core::domain::{Choice, Comment, Post, Question, Tag, User};
use quill_core::error::RepoError;
use quill_core::ports::{
    CommentRepository, CommentedPost, PostFilter, PostRepository, QuestionRepository, SearchHit,
    SearchPolicy, SimilarPost, TagRepository, UserRepository,
};

use super::entity::choice::{self, Entity as ChoiceEntity};
use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::post::{self, Entity as PostEntity};
use super::entity::post_tag::{self, Entity as PostTagEntity};
use super::entity::question::{self, Entity as QuestionEntity};
use super::entity::tag::{self, Entity as TagEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, query_error, write_error};

/// PostgreSQL user repository.
pub type PostgresUserRepository = PostgresBaseRepository<UserEntity>;

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

/// PostgreSQL tag repository.
pub type PostgresTagRepository = PostgresBaseRepository<TagEntity>;

/// PostgreSQL comment repository.
pub type PostgresCommentRepository = PostgresBaseRepository<CommentEntity>;

/// PostgreSQL poll repository (questions and their choices).
pub type PostgresQuestionRepository = PostgresBaseRepository<QuestionEntity>;

const SEARCH_SQL: &str = r#"
SELECT id, rank, similarity FROM (
    SELECT p.id,
           p.publish,
           ts_rank(
               setweight(to_tsvector(p.title), 'A') || setweight(to_tsvector(p.body), 'B'),
               plainto_tsquery($1)
           )::float8 AS rank,
           similarity(p.title, $1)::float8 AS similarity
    FROM posts p
    WHERE p.status = 'PB'
) scored
WHERE similarity > $2
  AND ($3::float8 IS NULL OR rank >= $3)
ORDER BY rank DESC, publish DESC
"#;

const SIMILAR_SQL: &str = r#"
SELECT p.id, COUNT(*) AS total
FROM posts p
JOIN post_tags pt ON pt.post_id = p.id
WHERE p.status = 'PB'
  AND p.id <> $1
  AND pt.tag_id IN (SELECT tag_id FROM post_tags WHERE post_id = $1)
GROUP BY p.id, p.publish
ORDER BY total DESC, p.publish DESC
LIMIT $2
"#;

const MOST_COMMENTED_SQL: &str = r#"
SELECT p.id, COUNT(c.id) AS total
FROM posts p
LEFT JOIN comments c ON c.post_id = p.id
WHERE p.status = 'PB'
GROUP BY p.id, p.publish
ORDER BY total DESC, p.publish DESC
LIMIT $1
"#;

#[derive(Debug, FromQueryResult)]
struct ScoredRow {
    id: Uuid,
    rank: f64,
    similarity: f64,
}

#[derive(Debug, FromQueryResult)]
struct CountedRow {
    id: Uuid,
    total: i64,
}

/// UTC start and end of a calendar day.
fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + TimeDelta::days(1))
}

/// `%needle%` with LIKE wildcards escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn published(tag_id: Option<Uuid>) -> Select<PostEntity> {
    let query = PostEntity::find().filter(post::Column::Status.eq(post::Status::Published));
    match tag_id {
        Some(tag_id) => query.filter(
            post::Column::Id.in_subquery(
                Query::select()
                    .column(post_tag::Column::PostId)
                    .from(PostTagEntity)
                    .and_where(post_tag::Column::TagId.eq(tag_id))
                    .to_owned(),
            ),
        ),
        None => query,
    }
}

async fn posts_by_id(db: &DbConn, ids: Vec<Uuid>) -> Result<HashMap<Uuid, Post>, RepoError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let models = PostEntity::find()
        .filter(post::Column::Id.is_in(ids))
        .all(db)
        .await
        .map_err(query_error)?;

    Ok(models.into_iter().map(|m| (m.id, Post::from(m))).collect())
}

async fn counted_posts(
    db: &DbConn,
    rows: Vec<CountedRow>,
) -> Result<Vec<(Post, u64)>, RepoError> {
    let mut posts = posts_by_id(db, rows.iter().map(|r| r.id).collect()).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| posts.remove(&row.id).map(|p| (p, row.total.max(0) as u64)))
        .collect())
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(username = %username, "Finding user by username");

        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_published(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let result = published(None)
            .filter(post::Column::Id.eq(id))
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }

    async fn find_published_on(
        &self,
        date: NaiveDate,
        slug: &str,
    ) -> Result<Option<Post>, RepoError> {
        let (start, end) = day_bounds(date);
        let result = published(None)
            .filter(post::Column::Slug.eq(slug))
            .filter(post::Column::Publish.gte(start))
            .filter(post::Column::Publish.lt(end))
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }

    async fn count_published(&self, tag_id: Option<Uuid>) -> Result<u64, RepoError> {
        published(tag_id).count(&self.db).await.map_err(query_error)
    }

    async fn list_published(
        &self,
        tag_id: Option<Uuid>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Post>, RepoError> {
        let result = published(tag_id)
            .order_by_desc(post::Column::Publish)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn search_published(
        &self,
        query: &str,
        policy: &SearchPolicy,
    ) -> Result<Vec<SearchHit>, RepoError> {
        let rows = ScoredRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            SEARCH_SQL,
            [
                query.into(),
                policy.min_similarity.into(),
                policy.min_rank.into(),
            ],
        ))
        .all(&self.db)
        .await
        .map_err(query_error)?;

        let mut posts = posts_by_id(&self.db, rows.iter().map(|r| r.id).collect()).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                posts.remove(&row.id).map(|post| SearchHit {
                    post,
                    rank: row.rank,
                    similarity: row.similarity,
                })
            })
            .collect())
    }

    async fn similar_published(
        &self,
        post_id: Uuid,
        limit: u64,
    ) -> Result<Vec<SimilarPost>, RepoError> {
        let rows = CountedRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            SIMILAR_SQL,
            [post_id.into(), (limit as i64).into()],
        ))
        .all(&self.db)
        .await
        .map_err(query_error)?;

        Ok(counted_posts(&self.db, rows)
            .await?
            .into_iter()
            .map(|(post, same_tags)| SimilarPost { post, same_tags })
            .collect())
    }

    async fn most_commented(&self, limit: u64) -> Result<Vec<CommentedPost>, RepoError> {
        let rows = CountedRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            MOST_COMMENTED_SQL,
            [(limit as i64).into()],
        ))
        .all(&self.db)
        .await
        .map_err(query_error)?;

        Ok(counted_posts(&self.db, rows)
            .await?
            .into_iter()
            .map(|(post, total_comments)| CommentedPost {
                post,
                total_comments,
            })
            .collect())
    }

    async fn list_all(&self, filter: &PostFilter) -> Result<Vec<Post>, RepoError> {
        let mut query = PostEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(post::Column::Status.eq(post::Status::from(status)));
        }
        if let Some(needle) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = like_pattern(needle);
            query = query.filter(
                Condition::any()
                    .add(Expr::col(post::Column::Title).ilike(pattern.clone()))
                    .add(Expr::col(post::Column::Body).ilike(pattern)),
            );
        }

        let result = query
            .order_by_asc(post::Column::Status)
            .order_by_asc(post::Column::Publish)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn slug_taken(
        &self,
        date: NaiveDate,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        let (start, end) = day_bounds(date);
        let mut query = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .filter(post::Column::Publish.gte(start))
            .filter(post::Column::Publish.lt(end));
        if let Some(id) = exclude {
            query = query.filter(post::Column::Id.ne(id));
        }

        let count = query.count(&self.db).await.map_err(query_error)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl TagRepository for PostgresTagRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError> {
        let result = TagEntity::find()
            .filter(tag::Column::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }

    async fn tags_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Tag>>, RepoError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = PostTagEntity::find()
            .filter(post_tag::Column::PostId.is_in(post_ids.iter().copied()))
            .find_also_related(TagEntity)
            .order_by_asc(tag::Column::Name)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        let mut out: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for (link, tag) in rows {
            if let Some(tag) = tag {
                out.entry(link.post_id).or_default().push(tag.into());
            }
        }
        Ok(out)
    }

    async fn set_post_tags(&self, post_id: Uuid, tag_ids: &[Uuid]) -> Result<(), RepoError> {
        let txn = self.db.begin().await.map_err(query_error)?;

        PostTagEntity::delete_many()
            .filter(post_tag::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(write_error)?;

        if !tag_ids.is_empty() {
            let links = tag_ids.iter().map(|tag_id| post_tag::ActiveModel {
                post_id: Set(post_id),
                tag_id: Set(*tag_id),
            });
            PostTagEntity::insert_many(links)
                .on_conflict(
                    OnConflict::columns([post_tag::Column::PostId, post_tag::Column::TagId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .map_err(write_error)?;
        }

        txn.commit().await.map_err(query_error)
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn active_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let result = CommentEntity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::Active.eq(true))
            .order_by_asc(comment::Column::Created)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn list(&self, active: Option<bool>) -> Result<Vec<Comment>, RepoError> {
        let mut query = CommentEntity::find();
        if let Some(active) = active {
            query = query.filter(comment::Column::Active.eq(active));
        }

        let result = query
            .order_by_desc(comment::Column::Created)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl QuestionRepository for PostgresQuestionRepository {
    async fn latest(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<Question>, RepoError> {
        let result = QuestionEntity::find()
            .filter(question::Column::PubDate.lte(now))
            .order_by_desc(question::Column::PubDate)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn choices_for(&self, question_id: Uuid) -> Result<Vec<Choice>, RepoError> {
        let result = ChoiceEntity::find()
            .filter(choice::Column::QuestionId.eq(question_id))
            .order_by_asc(choice::Column::ChoiceText)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn save_choice(&self, choice: Choice) -> Result<Choice, RepoError> {
        let model = choice::ActiveModel::from(choice)
            .insert(&self.db)
            .await
            .map_err(write_error)?;

        Ok(model.into())
    }

    async fn increment_votes(
        &self,
        question_id: Uuid,
        choice_id: Uuid,
    ) -> Result<bool, RepoError> {
        let result = ChoiceEntity::update_many()
            .col_expr(choice::Column::Votes, Expr::col(choice::Column::Votes).add(1))
            .filter(choice::Column::Id.eq(choice_id))
            .filter(choice::Column::QuestionId.eq(question_id))
            .exec(&self.db)
            .await
            .map_err(write_error)?;

        Ok(result.rows_affected == 1)
    }
}
