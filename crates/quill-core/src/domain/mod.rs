//! Domain entities - the core business objects.

mod comment;
mod poll;
mod post;
mod slug;
mod tag;
mod user;

pub use comment::Comment;
pub use poll::{Choice, Question};
pub use post::{Post, PostStatus};
pub use slug::slugify;
pub use tag::Tag;
pub use user::User;
