//! Blog endpoints: listing, tag filter, detail, search, comments, sharing
//! and the sidebar widgets.

use actix_web::{HttpRequest, HttpResponse, web};
use uuid::Uuid;

use quill_core::forms::{CommentForm, EmailPostForm};
use quill_shared::dto::{
    CommentedPostResponse, PageQuery, PostDetailResponse, PostListResponse, SearchQuery,
    SearchResponse, SearchResultResponse, ShareResponse, SidebarResponse, SimilarPostResponse,
};

use super::{markdown, views};
use crate::middleware::error::AppResult;
use crate::state::AppState;

const SIDEBAR_LATEST: u64 = 5;
const SIDEBAR_MOST_COMMENTED: u64 = 5;

async fn listing(
    state: &AppState,
    tag_slug: Option<&str>,
    query: &PageQuery,
) -> AppResult<HttpResponse> {
    let listing = state
        .content
        .list_published(tag_slug, query.page.as_deref())
        .await?;

    let response = PostListResponse {
        page: views::page_meta(&listing.page),
        posts: listing
            .page
            .items
            .iter()
            .map(|p| views::post(&p.post, &p.tags))
            .collect(),
        tag: listing.tag.as_ref().map(views::tag),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// GET /blog/
pub async fn post_list(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    listing(&state, None, &query).await
}

/// GET /blog/tag/{tag_slug}/
pub async fn post_list_by_tag(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    listing(&state, Some(path.as_str()), &query).await
}

/// GET /blog/{year}/{month}/{day}/{slug}/
pub async fn post_detail(
    state: web::Data<AppState>,
    path: web::Path<(i32, u32, u32, String)>,
) -> AppResult<HttpResponse> {
    let (year, month, day, slug) = path.into_inner();
    let detail = state
        .content
        .get_published_detail(year, month, day, &slug)
        .await?;

    let response = PostDetailResponse {
        body_html: markdown::render(&detail.post.body),
        post: views::post(&detail.post, &detail.tags),
        comments: detail
            .comments
            .iter()
            .map(|c| views::comment(c, false))
            .collect(),
        similar_posts: detail
            .similar_posts
            .iter()
            .map(|s| SimilarPostResponse {
                post: views::post(&s.post, &[]),
                same_tags: s.same_tags,
            })
            .collect(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// GET /blog/search/?query=...
pub async fn post_search(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> AppResult<HttpResponse> {
    let SearchQuery { query } = query.into_inner();
    let results = state.content.search(query.as_deref()).await?;

    let response = SearchResponse {
        query,
        results: results
            .iter()
            .map(|r| SearchResultResponse {
                post: views::post(&r.post, &r.tags),
                rank: r.rank,
                similarity: r.similarity,
            })
            .collect(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// POST /blog/{post_id}/comment/
pub async fn post_comment(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    form: web::Form<CommentForm>,
) -> AppResult<HttpResponse> {
    let comment = state
        .content
        .submit_comment(path.into_inner(), form.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(views::comment(&comment, false)))
}

/// GET /blog/{post_id}/share/
///
/// The unsubmitted form: the post being shared and `sent: false`.
pub async fn post_share_form(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post = state.content.published_post(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ShareResponse {
        post: views::post(&post, &[]),
        sent: false,
    }))
}

/// POST /blog/{post_id}/share/
pub async fn post_share(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    form: web::Form<EmailPostForm>,
) -> AppResult<HttpResponse> {
    let post_id = path.into_inner();
    let base_url = {
        let info = req.connection_info();
        format!("{}://{}", info.scheme(), info.host())
    };

    let sent = state
        .content
        .share_by_email(post_id, form.into_inner(), &base_url)
        .await?;
    let post = state.content.published_post(post_id).await?;

    Ok(HttpResponse::Ok().json(ShareResponse {
        post: views::post(&post, &[]),
        sent,
    }))
}

/// GET /blog/sidebar/
pub async fn sidebar(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let total_posts = state.content.total_posts().await?;
    let latest = state.content.latest_posts(SIDEBAR_LATEST).await?;
    let most_commented = state
        .content
        .most_commented_posts(SIDEBAR_MOST_COMMENTED)
        .await?;

    Ok(HttpResponse::Ok().json(SidebarResponse {
        total_posts,
        latest_posts: latest.iter().map(views::post_link).collect(),
        most_commented_posts: most_commented
            .iter()
            .map(|c| CommentedPostResponse {
                title: c.post.title.clone(),
                url: c.post.canonical_url(),
                total_comments: c.total_comments,
            })
            .collect(),
    }))
}
