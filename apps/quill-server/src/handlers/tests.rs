use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::{NormalizePath, TrailingSlash};
use actix_web::{App, http::StatusCode, test, web};
use chrono::{TimeZone, Utc};
use serde_json::Value;

use quill_core::domain::PostStatus;
use quill_core::service::{PostInput, QuestionInput};
use quill_infra::{InMemoryMailer, InMemoryStore, RateLimitConfig};

use super::{configure_routes, not_found};
use crate::config::AppConfig;
use crate::observability::RequestIdMiddleware;
use crate::state::{AppState, Repositories};

struct Harness {
    state: AppState,
    store: Arc<InMemoryStore>,
    mailer: Arc<InMemoryMailer>,
}

fn harness() -> Harness {
    harness_with(AppConfig::default())
}

fn harness_with(config: AppConfig) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(InMemoryMailer::new());
    let state = AppState::assemble(Repositories::memory(store.clone()), mailer.clone(), &config);
    Harness {
        state,
        store,
        mailer,
    }
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .wrap(NormalizePath::new(TrailingSlash::Always))
                .wrap(RequestIdMiddleware)
                .configure(configure_routes)
                .default_service(web::to(not_found)),
        )
        .await
    };
}

impl Harness {
    async fn published(&self, title: &str, tags: &[&str]) -> Value {
        let author = self
            .state
            .admin
            .ensure_staff_user("editor", "editor@example.com", "s3cret-pass")
            .await
            .unwrap();
        let (post, tags) = self
            .state
            .admin
            .create_post(
                author.id,
                PostInput {
                    title: Some(title.to_string()),
                    body: Some(format!("All about *{}*", title)),
                    status: Some(PostStatus::Published),
                    publish: Some(Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap()),
                    tags: Some(tags.iter().map(|t| t.to_string()).collect()),
                    ..PostInput::default()
                },
            )
            .await
            .unwrap();
        serde_json::to_value(super::views::post(&post, &tags)).unwrap()
    }
}

#[actix_web::test]
async fn test_post_list_paginates_published_posts() {
    let h = harness();
    for title in ["One", "Two", "Three", "Four"] {
        h.published(title, &[]).await;
    }
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/blog/?page=2").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["page"]["number"], 2);
    assert_eq!(body["page"]["num_pages"], 2);
    assert_eq!(body["page"]["has_previous"], true);
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_trailing_slash_is_optional() {
    let h = harness();
    h.published("Only", &["rust"]).await;
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/blog/tag/rust").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["tag"]["slug"], "rust");
    assert_eq!(body["posts"][0]["title"], "Only");
}

#[actix_web::test]
async fn test_post_detail_renders_markdown() {
    let h = harness();
    let post = h.published("Markdown Post", &[]).await;
    let app = app!(h.state);

    let req = test::TestRequest::get()
        .uri(post["url"].as_str().unwrap())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["post"]["slug"], "markdown-post");
    assert!(body["body_html"].as_str().unwrap().contains("<em>Markdown Post</em>"));
}

#[actix_web::test]
async fn test_post_detail_with_impossible_date_is_not_found() {
    let h = harness();
    h.published("Dated", &[]).await;
    let app = app!(h.state);

    let req = test::TestRequest::get()
        .uri("/blog/2024/13/1/dated/")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_comment_endpoint_rejects_get() {
    let h = harness();
    let post = h.published("Commented", &[]).await;
    let app = app!(h.state);

    let uri = format!("/blog/{}/comment/", post["id"].as_str().unwrap());
    let req = test::TestRequest::get().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_web::test]
async fn test_comment_limit_does_not_mask_method_not_allowed() {
    let h = harness_with(AppConfig {
        rate_limit: RateLimitConfig {
            max_requests: 1,
            window: Duration::from_secs(60),
        },
        ..AppConfig::default()
    });
    let post = h.published("Commented", &[]).await;
    let app = app!(h.state);
    let uri = format!("/blog/{}/comment/", post["id"].as_str().unwrap());

    let form = [
        ("name", "Ann"),
        ("email", "ann@example.com"),
        ("body", "Nice post"),
    ];
    let req = test::TestRequest::post().uri(&uri).set_form(form).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post().uri(&uri).set_form(form).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key("retry-after"));

    for req in [
        test::TestRequest::put().uri(&uri).to_request(),
        test::TestRequest::delete().uri(&uri).to_request(),
    ] {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
    assert_eq!(h.store.comment_count().await, 1);
}

#[actix_web::test]
async fn test_comment_without_email_is_unprocessable() {
    let h = harness();
    let post = h.published("Commented", &[]).await;
    let app = app!(h.state);

    let uri = format!("/blog/{}/comment/", post["id"].as_str().unwrap());
    let req = test::TestRequest::post()
        .uri(&uri)
        .set_form([("name", "Ann"), ("body", "Nice post")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["email"][0], "This field is required.");
    assert_eq!(h.store.comment_count().await, 0);
}

#[actix_web::test]
async fn test_comment_is_created_and_listed() {
    let h = harness();
    let post = h.published("Commented", &[]).await;
    let app = app!(h.state);

    let uri = format!("/blog/{}/comment/", post["id"].as_str().unwrap());
    let req = test::TestRequest::post()
        .uri(&uri)
        .set_form([
            ("name", "Ann"),
            ("email", "ann@example.com"),
            ("body", "Nice post"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let created: Value = test::read_body_json(resp).await;
    assert!(created.get("email").is_none());

    let req = test::TestRequest::get()
        .uri(post["url"].as_str().unwrap())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["comments"][0]["name"], "Ann");
}

#[actix_web::test]
async fn test_share_sends_mail_with_absolute_url() {
    let h = harness();
    let post = h.published("Shared", &[]).await;
    let app = app!(h.state);

    let uri = format!("/blog/{}/share/", post["id"].as_str().unwrap());
    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(("host", "blog.example.com"))
        .set_form([
            ("name", "Ann"),
            ("email", "ann@example.com"),
            ("to", "bob@example.com"),
            ("comments", "Worth it"),
        ])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["sent"], true);

    let sent = h.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["bob@example.com".to_string()]);
    assert!(sent[0].text.contains("http://blog.example.com/blog/2024/1/20/shared/"));
}

#[actix_web::test]
async fn test_share_reports_bad_gateway_when_mail_fails() {
    let h = harness();
    let post = h.published("Shared", &[]).await;
    h.mailer.fail_sends(true);
    let app = app!(h.state);

    let uri = format!("/blog/{}/share/", post["id"].as_str().unwrap());
    let req = test::TestRequest::post()
        .uri(&uri)
        .set_form([
            ("name", "Ann"),
            ("email", "ann@example.com"),
            ("to", "bob@example.com"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn test_share_form_shows_post_unsent() {
    let h = harness();
    let post = h.published("Shared", &[]).await;
    let app = app!(h.state);

    let uri = format!("/blog/{}/share/", post["id"].as_str().unwrap());
    let req = test::TestRequest::get().uri(&uri).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["sent"], false);
    assert_eq!(body["post"]["title"], "Shared");
}

#[actix_web::test]
async fn test_empty_search_returns_no_results() {
    let h = harness();
    h.published("Django Tips", &[]).await;
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/blog/search/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert!(body["results"].as_array().unwrap().is_empty());
    assert!(body.get("query").is_none());
}

#[actix_web::test]
async fn test_search_finds_matching_title() {
    let h = harness();
    h.published("Django Tips", &[]).await;
    h.published("Cooking", &[]).await;
    let app = app!(h.state);

    let req = test::TestRequest::get()
        .uri("/blog/search/?query=django")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["post"]["title"], "Django Tips");
}

#[actix_web::test]
async fn test_sidebar_counts_published_posts() {
    let h = harness();
    h.published("First", &[]).await;
    h.published("Second", &[]).await;
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/blog/sidebar/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["total_posts"], 2);
    assert_eq!(body["latest_posts"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn test_vote_without_choice_is_unprocessable() {
    let h = harness();
    let (question, _) = h
        .state
        .admin
        .create_question(QuestionInput {
            question_text: "What's new?".to_string(),
            pub_date: Some(Utc::now() - chrono::Duration::hours(1)),
            choices: vec!["Not much".to_string(), "The sky".to_string()],
        })
        .await
        .unwrap();
    let app = app!(h.state);

    let req = test::TestRequest::post()
        .uri(&format!("/polls/{}/vote/", question.id))
        .set_form([("choice", "")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["choice"][0], "You didn't select a choice.");
}

#[actix_web::test]
async fn test_vote_counts_and_returns_results() {
    let h = harness();
    let (question, choices) = h
        .state
        .admin
        .create_question(QuestionInput {
            question_text: "What's new?".to_string(),
            pub_date: Some(Utc::now() - chrono::Duration::hours(1)),
            choices: vec!["Not much".to_string()],
        })
        .await
        .unwrap();
    let app = app!(h.state);

    let choice_id = choices[0].id.to_string();
    let req = test::TestRequest::post()
        .uri(&format!("/polls/{}/vote/", question.id))
        .set_form([("choice", choice_id.as_str())])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["choices"][0]["votes"], 1);
}

#[actix_web::test]
async fn test_admin_requires_token() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/admin/posts/").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_admin_login_then_create_post() {
    let h = harness();
    h.state
        .admin
        .ensure_staff_user("editor", "editor@example.com", "s3cret-pass")
        .await
        .unwrap();
    let app = app!(h.state);

    let req = test::TestRequest::post()
        .uri("/admin/login/")
        .set_json(serde_json::json!({"username": "editor", "password": "s3cret-pass"}))
        .to_request();
    let auth: Value = test::call_and_read_body_json(&app, req).await;
    let token = auth["access_token"].as_str().unwrap();
    assert_eq!(auth["token_type"], "Bearer");

    let req = test::TestRequest::post()
        .uri("/admin/posts/")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(serde_json::json!({
            "title": "Hello Admin",
            "body": "Body",
            "status": "PUBLISHED",
            "tags": ["news"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let post: Value = test::read_body_json(resp).await;
    assert_eq!(post["slug"], "hello-admin");
    assert_eq!(post["tags"][0]["slug"], "news");
}

#[actix_web::test]
async fn test_admin_login_rejects_bad_password() {
    let h = harness();
    h.state
        .admin
        .ensure_staff_user("editor", "editor@example.com", "s3cret-pass")
        .await
        .unwrap();
    let app = app!(h.state);

    let req = test::TestRequest::post()
        .uri("/admin/login/")
        .set_json(serde_json::json!({"username": "editor", "password": "wrong"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_unknown_route_carries_request_id() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::get()
        .uri("/nowhere/")
        .insert_header(("x-request-id", "abc-123"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("x-request-id").unwrap(), "abc-123");

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["request_id"], "abc-123");
}

#[actix_web::test]
async fn test_health_reports_store() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}
