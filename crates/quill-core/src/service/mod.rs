//! Application services composed from the ports.

mod admin;
mod content;
mod polls;

pub use admin::{AccessToken, AdminDeps, AdminService, PostInput, QuestionInput};
pub use content::{
    ContentService, ContentSettings, PostDetail, PostListing, RankedPost, TaggedPost,
};
pub use polls::{PollService, QuestionDetail};
