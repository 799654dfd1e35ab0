use std::sync::Arc;

use chrono::{Datelike, Duration, TimeZone, Utc};
use uuid::Uuid;

use quill_core::domain::{Choice, Post, Question, Tag, User};
use quill_core::forms::{CommentForm, EmailPostForm, VoteForm};
use quill_core::ports::{BaseRepository, TagRepository};
use quill_core::service::{ContentService, ContentSettings, PollService};
use quill_core::DomainError;

use super::InMemoryStore;
use crate::mail::InMemoryMailer;

struct Fixture {
    store: Arc<InMemoryStore>,
    mailer: Arc<InMemoryMailer>,
    service: ContentService,
    author: User,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let mailer = Arc::new(InMemoryMailer::new());
    let service = ContentService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        mailer.clone(),
        ContentSettings::default(),
    );
    let author = User::new("admin".into(), "admin@example.com".into(), "x".into()).staff();
    Fixture {
        store,
        mailer,
        service,
        author,
    }
}

impl Fixture {
    async fn post(&self, title: &str, body: &str, days_ago: i64) -> Post {
        let publish = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap() - Duration::days(days_ago);
        let post = Post::new(
            self.author.id,
            title.to_string(),
            quill_core::domain::slugify(title),
            body.to_string(),
        )
        .published_at(publish);
        BaseRepository::<Post, Uuid>::save(self.store.as_ref(), post)
            .await
            .unwrap()
    }

    async fn draft(&self, title: &str) -> Post {
        let post = Post::new(
            self.author.id,
            title.to_string(),
            quill_core::domain::slugify(title),
            "draft body".to_string(),
        );
        BaseRepository::<Post, Uuid>::save(self.store.as_ref(), post)
            .await
            .unwrap()
    }

    async fn tag(&self, post: &Post, names: &[&str]) {
        let mut ids = Vec::new();
        for name in names {
            let tag = match self.store.find_by_slug(&quill_core::domain::slugify(name)).await.unwrap() {
                Some(tag) => tag,
                None => BaseRepository::<Tag, Uuid>::save(self.store.as_ref(), Tag::new(*name))
                    .await
                    .unwrap(),
            };
            ids.push(tag.id);
        }
        self.store.set_post_tags(post.id, &ids).await.unwrap();
    }
}

fn comment_form(name: &str, email: &str, body: &str) -> CommentForm {
    CommentForm {
        name: Some(name.to_string()),
        email: Some(email.to_string()).filter(|e| !e.is_empty()),
        body: Some(body.to_string()),
    }
}

fn share_form(to: &str) -> EmailPostForm {
    EmailPostForm {
        name: Some("Ann".to_string()),
        email: Some("ann@example.com".to_string()),
        to: Some(to.to_string()),
        comments: Some("Worth it".to_string()),
    }
}

#[tokio::test]
async fn test_listing_hides_drafts_and_orders_newest_first() {
    let f = fixture();
    let old = f.post("Old Post", "body", 5).await;
    let new = f.post("New Post", "body", 1).await;
    f.draft("Secret Draft").await;

    let listing = f.service.list_published(None, None).await.unwrap();

    assert_eq!(listing.page.count, 2);
    let ids: Vec<Uuid> = listing.page.items.iter().map(|t| t.post.id).collect();
    assert_eq!(ids, vec![new.id, old.id]);
}

#[tokio::test]
async fn test_listing_page_out_of_range_returns_last_page() {
    let f = fixture();
    for i in 0..7 {
        f.post(&format!("Post {}", i), "body", i).await;
    }

    let page = f.service.list_published(None, Some("99")).await.unwrap().page;
    assert_eq!(page.number, 3);
    assert_eq!(page.num_pages, 3);
    assert_eq!(page.items.len(), 1);

    let page = f.service.list_published(None, Some("abc")).await.unwrap().page;
    assert_eq!(page.number, 1);
    assert_eq!(page.items.len(), 3);
}

#[tokio::test]
async fn test_listing_by_tag() {
    let f = fixture();
    let tagged = f.post("Django Tips", "body", 1).await;
    f.post("Python Basics", "body", 2).await;
    f.tag(&tagged, &["django"]).await;

    let listing = f.service.list_published(Some("django"), None).await.unwrap();
    assert_eq!(listing.tag.map(|t| t.slug), Some("django".to_string()));
    assert_eq!(listing.page.count, 1);
    assert_eq!(listing.page.items[0].tags[0].name, "django");

    let err = f.service.list_published(Some("rust"), None).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { entity_type: "Tag", .. }));
}

#[tokio::test]
async fn test_listing_by_shared_tag_returns_every_tagged_post() {
    let f = fixture();
    let django = f.post("Django Tips", "body", 1).await;
    let python = f.post("Python Basics", "body", 2).await;
    let cooking = f.post("Cooking", "body", 3).await;
    f.tag(&django, &["python", "django"]).await;
    f.tag(&python, &["python"]).await;
    f.tag(&cooking, &["food"]).await;

    let listing = f.service.list_published(Some("python"), None).await.unwrap();

    assert_eq!(listing.page.count, 2);
    let titles: Vec<&str> = listing
        .page
        .items
        .iter()
        .map(|t| t.post.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Django Tips", "Python Basics"]);
}

#[tokio::test]
async fn test_search_blank_query_is_empty() {
    let f = fixture();
    f.post("Django Tips", "body", 1).await;

    assert!(f.service.search(None).await.unwrap().is_empty());
    assert!(f.service.search(Some("   ")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_filters_by_title_similarity_and_ranks() {
    let f = fixture();
    let title_only = f.post("Django Notes", "misc", 3).await;
    let strong = f.post("Django Tips", "django django django", 2).await;
    f.post("Python Basics", "django mentioned in passing", 1).await;
    f.draft("Django Draft").await;

    let hits = f.service.search(Some("django")).await.unwrap();

    let ids: Vec<Uuid> = hits.iter().map(|h| h.post.id).collect();
    assert_eq!(ids, vec![strong.id, title_only.id]);
    assert!(hits.iter().all(|h| h.similarity > 0.1));
    assert!(hits[0].rank >= hits[1].rank);
}

#[tokio::test]
async fn test_detail_by_date_and_slug() {
    let f = fixture();
    let post = f.post("Django Tips", "body", 0).await;
    let draft = f.draft("Hidden").await;

    let detail = f
        .service
        .get_published_detail(2024, 1, 20, "django-tips")
        .await
        .unwrap();
    assert_eq!(detail.post.id, post.id);

    let missing = f.service.get_published_detail(2024, 1, 21, "django-tips").await;
    assert!(matches!(missing, Err(DomainError::NotFound { .. })));

    let invalid = f.service.get_published_detail(2024, 2, 30, "django-tips").await;
    assert!(matches!(invalid, Err(DomainError::NotFound { .. })));

    let d = draft.publish_date();
    let hidden = f
        .service
        .get_published_detail(d.year(), d.month(), d.day(), &draft.slug)
        .await;
    assert!(matches!(hidden, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_detail_similar_posts_share_tags() {
    let f = fixture();
    let main = f.post("Django Tips", "body", 0).await;
    let python = f.post("Python Basics", "body", 3).await;
    let unrelated = f.post("Cooking", "body", 1).await;
    f.tag(&main, &["python", "web"]).await;
    f.tag(&python, &["python"]).await;
    f.tag(&unrelated, &["food"]).await;
    for i in 0..5 {
        let p = f.post(&format!("Web {}", i), "body", 10 + i).await;
        f.tag(&p, &["python", "web"]).await;
    }

    let detail = f
        .service
        .get_published_detail(2024, 1, 20, "django-tips")
        .await
        .unwrap();

    assert_eq!(detail.similar_posts.len(), 4);
    assert!(detail.similar_posts.iter().all(|s| s.post.id != main.id));
    assert!(detail.similar_posts.iter().all(|s| s.same_tags == 2));
    assert_eq!(detail.similar_posts[0].post.title, "Web 0");
    assert_eq!(detail.tags.len(), 2);
}

#[tokio::test]
async fn test_similar_single_shared_tag() {
    let f = fixture();
    let main = f.post("Django Tips", "body", 0).await;
    let python = f.post("Python Basics", "body", 3).await;
    f.tag(&main, &["python", "web"]).await;
    f.tag(&python, &["python"]).await;

    let detail = f
        .service
        .get_published_detail(2024, 1, 20, "django-tips")
        .await
        .unwrap();

    assert_eq!(detail.similar_posts.len(), 1);
    assert_eq!(detail.similar_posts[0].post.id, python.id);
    assert_eq!(detail.similar_posts[0].same_tags, 1);
}

#[tokio::test]
async fn test_comment_added_and_shown() {
    let f = fixture();
    let post = f.post("Django Tips", "body", 0).await;

    let comment = f
        .service
        .submit_comment(post.id, comment_form("Bob", "bob@example.com", "Nice"))
        .await
        .unwrap();
    assert!(comment.active);

    let detail = f
        .service
        .get_published_detail(2024, 1, 20, "django-tips")
        .await
        .unwrap();
    assert_eq!(detail.comments.len(), 1);
    assert_eq!(detail.comments[0].name, "Bob");
}

#[tokio::test]
async fn test_comment_missing_email_is_rejected() {
    let f = fixture();
    let post = f.post("Django Tips", "body", 0).await;

    let err = f
        .service
        .submit_comment(post.id, comment_form("Bob", "", "Nice"))
        .await
        .unwrap_err();

    match err {
        DomainError::Validation(errors) => assert!(errors.get("email").is_some()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(f.store.comment_count().await, 0);
}

#[tokio::test]
async fn test_comment_on_draft_is_not_found() {
    let f = fixture();
    let draft = f.draft("Hidden").await;

    let err = f
        .service
        .submit_comment(draft.id, comment_form("Bob", "bob@example.com", "Nice"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn test_share_sends_recommendation() {
    let f = fixture();
    let post = f.post("Django Tips", "body", 0).await;

    let sent = f
        .service
        .share_by_email(post.id, share_form("bob@example.com"), "http://example.com/")
        .await
        .unwrap();
    assert!(sent);

    let outbox = f.mailer.sent().await;
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].to, vec!["bob@example.com".to_string()]);
    assert_eq!(
        outbox[0].subject,
        "Ann (ann@example.com) recommends you read Django Tips"
    );
    assert_eq!(
        outbox[0].text,
        "Read Django Tips at http://example.com/blog/2024/1/20/django-tips/\n\nAnn's comments: Worth it"
    );
}

#[tokio::test]
async fn test_share_invalid_recipient_sends_nothing() {
    let f = fixture();
    let post = f.post("Django Tips", "body", 0).await;

    let err = f
        .service
        .share_by_email(post.id, share_form("not-an-address"), "http://example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert!(f.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_share_transport_failure_propagates() {
    let f = fixture();
    let post = f.post("Django Tips", "body", 0).await;
    f.mailer.fail_sends(true);

    let err = f
        .service
        .share_by_email(post.id, share_form("bob@example.com"), "http://example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Transport(_)));
}

#[tokio::test]
async fn test_sidebar_helpers() {
    let f = fixture();
    let quiet = f.post("Quiet", "body", 2).await;
    let busy = f.post("Busy", "body", 1).await;
    f.draft("Draft").await;
    for _ in 0..2 {
        f.service
            .submit_comment(busy.id, comment_form("Bob", "bob@example.com", "Hi"))
            .await
            .unwrap();
    }

    assert_eq!(f.service.total_posts().await.unwrap(), 2);

    let latest = f.service.latest_posts(1).await.unwrap();
    assert_eq!(latest[0].id, busy.id);

    let commented = f.service.most_commented_posts(5).await.unwrap();
    assert_eq!(commented[0].post.id, busy.id);
    assert_eq!(commented[0].total_comments, 2);
    assert_eq!(commented[1].post.id, quiet.id);
    assert_eq!(commented[1].total_comments, 0);
}

async fn poll(store: &InMemoryStore, text: &str, pub_date: chrono::DateTime<Utc>) -> (Question, Vec<Choice>) {
    let question = BaseRepository::<Question, Uuid>::save(store, Question::new(text.into(), pub_date))
        .await
        .unwrap();
    let mut choices = Vec::new();
    for text in ["Not much", "The sky"] {
        use quill_core::ports::QuestionRepository;
        choices.push(
            store
                .save_choice(Choice::new(question.id, text.into()))
                .await
                .unwrap(),
        );
    }
    (question, choices)
}

#[tokio::test]
async fn test_poll_index_hides_future_questions() {
    let store = Arc::new(InMemoryStore::new());
    let service = PollService::new(store.clone());
    let (past, _) = poll(&store, "What's up?", Utc::now() - Duration::days(1)).await;
    let (future, _) = poll(&store, "Later?", Utc::now() + Duration::days(1)).await;

    let index = service.index().await.unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].id, past.id);

    let err = service.detail(future.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn test_vote_counts_and_rejects_bad_choice() {
    let store = Arc::new(InMemoryStore::new());
    let service = PollService::new(store.clone());
    let (question, choices) = poll(&store, "What's up?", Utc::now() - Duration::hours(1)).await;
    let (other, other_choices) = poll(&store, "Other?", Utc::now() - Duration::hours(1)).await;

    let results = service
        .vote(
            question.id,
            VoteForm {
                choice: Some(choices[0].id.to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(results.choices[0].votes, 1);

    for choice in [None, Some("junk".to_string()), Some(other_choices[0].id.to_string())] {
        let err = service
            .vote(question.id, VoteForm { choice })
            .await
            .unwrap_err();
        match err {
            DomainError::Validation(errors) => assert_eq!(
                errors.get("choice"),
                Some(&["You didn't select a choice.".to_string()][..])
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    let untouched = service.results(other.id).await.unwrap();
    assert!(untouched.choices.iter().all(|c| c.votes == 0));
}

#[cfg(feature = "auth")]
mod admin {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use quill_core::domain::PostStatus;
    use quill_core::ports::PostFilter;
    use quill_core::service::{
        AdminDeps, AdminService, ContentService, ContentSettings, PostInput, QuestionInput,
    };
    use quill_core::DomainError;

    use super::{InMemoryStore, comment_form};
    use crate::auth::{Argon2PasswordService, JwtConfig, JwtTokenService};
    use crate::mail::InMemoryMailer;

    fn service() -> (Arc<InMemoryStore>, AdminService) {
        let store = Arc::new(InMemoryStore::new());
        let deps = AdminDeps {
            users: store.clone(),
            posts: store.clone(),
            tags: store.clone(),
            comments: store.clone(),
            questions: store.clone(),
            passwords: Arc::new(Argon2PasswordService::new()),
            tokens: Arc::new(JwtTokenService::new(JwtConfig {
                secret: "test-secret".to_string(),
                expiration_hours: 1,
                issuer: "quill".to_string(),
            })),
        };
        (store, AdminService::new(deps))
    }

    fn input(title: &str) -> PostInput {
        PostInput {
            title: Some(title.to_string()),
            body: Some("body".to_string()),
            status: Some(PostStatus::Published),
            tags: Some(vec!["Rust".to_string(), "rust".to_string(), "Web Dev".to_string()]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_login_requires_staff_and_password() {
        let (_, admin) = service();
        admin
            .ensure_staff_user("admin", "admin@example.com", "secret")
            .await
            .unwrap();

        let token = admin.login("admin", "secret").await.unwrap();
        assert!(!token.token.is_empty());
        assert_eq!(token.expires_in, 3600);

        assert!(matches!(
            admin.login("admin", "wrong").await,
            Err(DomainError::Unauthorized)
        ));
        assert!(matches!(
            admin.login("nobody", "secret").await,
            Err(DomainError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_deactivated_comment_is_hidden_from_detail() {
        let (store, admin) = service();
        let content = ContentService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(InMemoryMailer::new()),
            ContentSettings::default(),
        );
        let user = admin
            .ensure_staff_user("admin", "admin@example.com", "secret")
            .await
            .unwrap();
        let (post, _) = admin
            .create_post(
                user.id,
                PostInput {
                    title: Some("Django Tips".to_string()),
                    body: Some("body".to_string()),
                    status: Some(PostStatus::Published),
                    publish: Some(Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let kept = content
            .submit_comment(post.id, comment_form("Ann", "ann@example.com", "Great read"))
            .await
            .unwrap();
        let hidden = content
            .submit_comment(post.id, comment_form("Spam", "spam@example.com", "Buy now"))
            .await
            .unwrap();

        let moderated = admin.set_comment_active(hidden.id, false).await.unwrap();
        assert!(!moderated.active);

        let detail = content
            .get_published_detail(2024, 1, 20, "django-tips")
            .await
            .unwrap();
        let ids: Vec<_> = detail.comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![kept.id]);

        // Staff still see the hidden comment
        assert_eq!(admin.list_comments(None).await.unwrap().len(), 2);
        let inactive = admin.list_comments(Some(false)).await.unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].id, hidden.id);
    }

    #[tokio::test]
    async fn test_create_post_slugifies_and_tags() {
        let (_, admin) = service();
        let user = admin
            .ensure_staff_user("admin", "admin@example.com", "secret")
            .await
            .unwrap();

        let (post, tags) = admin.create_post(user.id, input("Hello Rust World")).await.unwrap();
        assert_eq!(post.slug, "hello-rust-world");
        let slugs: Vec<&str> = tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["rust", "web-dev"]);

        let err = admin
            .create_post(user.id, input("Hello Rust World"))
            .await
            .unwrap_err();
        match err {
            DomainError::Validation(errors) => assert!(errors.get("slug").is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_post_keeps_unset_fields() {
        let (_, admin) = service();
        let user = admin
            .ensure_staff_user("admin", "admin@example.com", "secret")
            .await
            .unwrap();
        let (post, _) = admin.create_post(user.id, input("First")).await.unwrap();

        let (updated, tags) = admin
            .update_post(
                post.id,
                PostInput {
                    status: Some(PostStatus::Draft),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "First");
        assert_eq!(updated.status, PostStatus::Draft);
        assert_eq!(tags.len(), 2);

        let drafts = admin
            .list_posts(PostFilter {
                status: Some(PostStatus::Draft),
                search: None,
            })
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
    }

    #[tokio::test]
    async fn test_create_question_validates_choices() {
        let (_, admin) = service();

        let (question, choices) = admin
            .create_question(QuestionInput {
                question_text: "What's new?".to_string(),
                pub_date: None,
                choices: vec!["Not much".to_string(), "The sky".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(question.question_text, "What's new?");
        assert_eq!(choices.len(), 2);

        let err = admin
            .create_question(QuestionInput {
                question_text: " ".to_string(),
                pub_date: None,
                choices: vec![String::new()],
            })
            .await
            .unwrap_err();
        match err {
            DomainError::Validation(errors) => {
                assert!(errors.get("question_text").is_some());
                assert!(errors.get("choices.0").is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
