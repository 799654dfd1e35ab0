//! PostgreSQL persistence via SeaORM.

mod connections;
pub mod entity;
mod postgres_base;
mod postgres_repo;

pub use connections::{DatabaseConfig, connect};
pub use postgres_base::PostgresBaseRepository;
pub use postgres_repo::{
    PostgresCommentRepository, PostgresPostRepository, PostgresQuestionRepository,
    PostgresTagRepository, PostgresUserRepository,
};

pub use sea_orm::DbConn;
