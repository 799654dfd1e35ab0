//! Application state - shared across all handlers.

use std::sync::Arc;

use quill_core::ports::{
    CommentRepository, Mailer, PostRepository, QuestionRepository, RateLimiter, TagRepository,
    TokenService, UserRepository,
};
use quill_core::service::{AdminDeps, AdminService, ContentService, ContentSettings, PollService};
use quill_infra::{
    Argon2PasswordService, ConsoleMailer, HttpMailer, InMemoryRateLimiter, InMemoryStore,
    JwtTokenService,
};

use crate::config::{AppConfig, MailBackend};

/// Repository handles of one store.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    /// "postgres" or "memory".
    pub kind: &'static str,
}

impl Repositories {
    pub fn memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            posts: store.clone(),
            tags: store.clone(),
            comments: store.clone(),
            questions: store,
            kind: "memory",
        }
    }

    #[cfg(feature = "postgres")]
    pub fn postgres(db: quill_infra::database::DbConn) -> Self {
        use quill_infra::database::{
            PostgresCommentRepository, PostgresPostRepository, PostgresQuestionRepository,
            PostgresTagRepository, PostgresUserRepository,
        };

        Self {
            users: Arc::new(PostgresUserRepository::new(db.clone())),
            posts: Arc::new(PostgresPostRepository::new(db.clone())),
            tags: Arc::new(PostgresTagRepository::new(db.clone())),
            comments: Arc::new(PostgresCommentRepository::new(db.clone())),
            questions: Arc::new(PostgresQuestionRepository::new(db)),
            kind: "postgres",
        }
    }

    /// Postgres when configured and reachable, otherwise the in-memory store.
    async fn connect(config: &AppConfig) -> Self {
        #[cfg(feature = "postgres")]
        if let Some(url) = &config.database_url {
            let db_config = quill_infra::DatabaseConfig {
                url: url.clone(),
                max_connections: config.db_max_connections,
                min_connections: config.db_min_connections,
            };
            match quill_infra::database::connect(&db_config).await {
                Ok(db) => return Self::postgres(db),
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using in-memory fallback.",
                        e
                    );
                    return Self::memory(Arc::new(InMemoryStore::new()));
                }
            }
        }

        if config.database_url.is_some() {
            tracing::warn!("Built without postgres feature - ignoring DATABASE_URL");
        } else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        }
        Self::memory(Arc::new(InMemoryStore::new()))
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub content: Arc<ContentService>,
    pub polls: Arc<PollService>,
    pub admin: Arc<AdminService>,
    pub tokens: Arc<dyn TokenService>,
    pub limiter: Arc<dyn RateLimiter>,
    pub store_kind: &'static str,
}

impl AppState {
    /// Build the application state from configuration and bootstrap the
    /// staff account.
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let repos = Repositories::connect(config).await;

        let mailer: Arc<dyn Mailer> = match &config.mail_backend {
            MailBackend::Console => Arc::new(ConsoleMailer),
            MailBackend::Http(http) => {
                tracing::info!(url = %http.url, "Using HTTP mail transport");
                Arc::new(HttpMailer::new(http.clone())?)
            }
        };

        let state = Self::assemble(repos, mailer, config);

        if let Some(admin) = &config.admin {
            state
                .admin
                .ensure_staff_user(&admin.username, &admin.email, &admin.password)
                .await?;
        }

        tracing::info!(store = state.store_kind, "Application state initialized");
        Ok(state)
    }

    /// Wire services over the given repositories and mailer.
    pub fn assemble(repos: Repositories, mailer: Arc<dyn Mailer>, config: &AppConfig) -> Self {
        let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(config.jwt.clone()));

        let content = ContentService::new(
            repos.posts.clone(),
            repos.tags.clone(),
            repos.comments.clone(),
            mailer,
            ContentSettings {
                mail_from: config.mail_from.clone(),
                ..ContentSettings::default()
            },
        );

        let admin = AdminService::new(AdminDeps {
            users: repos.users.clone(),
            posts: repos.posts.clone(),
            tags: repos.tags.clone(),
            comments: repos.comments.clone(),
            questions: repos.questions.clone(),
            passwords: Arc::new(Argon2PasswordService::new()),
            tokens: tokens.clone(),
        });

        Self {
            content: Arc::new(content),
            polls: Arc::new(PollService::new(repos.questions.clone())),
            admin: Arc::new(admin),
            tokens,
            limiter: Arc::new(InMemoryRateLimiter::new(config.rate_limit.clone())),
            store_kind: repos.kind,
        }
    }
}
