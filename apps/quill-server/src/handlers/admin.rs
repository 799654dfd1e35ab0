//! Staff endpoints: login and management of posts, comments and questions.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::domain::PostStatus;
use quill_core::ports::PostFilter;
use quill_core::service::{PostInput, QuestionInput};
use quill_shared::ApiResponse;
use quill_shared::dto::{
    AdminCommentsQuery, AdminPostsQuery, AuthResponse, CommentModerationRequest, LoginRequest,
    QuestionDetailResponse,
};

use super::views;
use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Accepts the status label or its stored code.
fn parse_status(value: &str) -> Result<PostStatus, AppError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "DRAFT" | "DF" => Ok(PostStatus::Draft),
        "PUBLISHED" | "PB" => Ok(PostStatus::Published),
        other => Err(AppError::BadRequest(format!("Unknown post status '{}'", other))),
    }
}

/// POST /admin/login/
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let token = state.admin.login(&req.username, &req.password).await?;

    tracing::info!(username = %req.username, "Staff logged in");

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token: token.token,
        token_type: "Bearer".to_string(),
        expires_in: token.expires_in,
    }))
}

/// GET /admin/posts/?status=&search=
pub async fn list_posts(
    _identity: Identity,
    state: web::Data<AppState>,
    query: web::Query<AdminPostsQuery>,
) -> AppResult<HttpResponse> {
    let AdminPostsQuery { status, search } = query.into_inner();
    let filter = PostFilter {
        status: status.as_deref().map(parse_status).transpose()?,
        search: search.filter(|s| !s.trim().is_empty()),
    };

    let posts = state.admin.list_posts(filter).await?;
    let body: Vec<_> = posts.iter().map(|p| views::post(p, &[])).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /admin/posts/
pub async fn create_post(
    identity: Identity,
    state: web::Data<AppState>,
    body: web::Json<PostInput>,
) -> AppResult<HttpResponse> {
    let (post, tags) = state
        .admin
        .create_post(identity.user_id, body.into_inner())
        .await?;

    tracing::info!(post_id = %post.id, author = %identity.username, "Post created");
    Ok(HttpResponse::Created().json(views::post(&post, &tags)))
}

/// PUT /admin/posts/{post_id}/
pub async fn update_post(
    identity: Identity,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<PostInput>,
) -> AppResult<HttpResponse> {
    let (post, tags) = state
        .admin
        .update_post(path.into_inner(), body.into_inner())
        .await?;

    tracing::info!(post_id = %post.id, editor = %identity.username, "Post updated");
    Ok(HttpResponse::Ok().json(views::post(&post, &tags)))
}

/// GET /admin/comments/?active=
pub async fn list_comments(
    _identity: Identity,
    state: web::Data<AppState>,
    query: web::Query<AdminCommentsQuery>,
) -> AppResult<HttpResponse> {
    let comments = state.admin.list_comments(query.active).await?;
    let body: Vec<_> = comments.iter().map(|c| views::comment(c, true)).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// PATCH /admin/comments/{comment_id}/
pub async fn moderate_comment(
    _identity: Identity,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CommentModerationRequest>,
) -> AppResult<HttpResponse> {
    let comment = state
        .admin
        .set_comment_active(path.into_inner(), body.active)
        .await?;

    let message = if comment.active {
        "Comment is visible"
    } else {
        "Comment is hidden"
    };
    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        views::comment(&comment, true),
        message,
    )))
}

/// POST /admin/questions/
pub async fn create_question(
    _identity: Identity,
    state: web::Data<AppState>,
    body: web::Json<QuestionInput>,
) -> AppResult<HttpResponse> {
    let (question, choices) = state.admin.create_question(body.into_inner()).await?;

    Ok(HttpResponse::Created().json(QuestionDetailResponse {
        question: views::question(&question),
        choices: choices.iter().map(views::choice).collect(),
    }))
}
