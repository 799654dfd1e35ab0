//! Conversions from domain values to response DTOs.

use quill_core::domain::{Choice, Comment, Post, Question, Tag};
use quill_core::pagination::Page;
use quill_core::service::QuestionDetail;
use quill_shared::dto::{
    ChoiceResponse, CommentResponse, PageMeta, PostLinkResponse, PostResponse,
    QuestionDetailResponse, QuestionResponse, TagResponse,
};

pub fn tag(tag: &Tag) -> TagResponse {
    TagResponse {
        name: tag.name.clone(),
        slug: tag.slug.clone(),
    }
}

pub fn post(post: &Post, tags: &[Tag]) -> PostResponse {
    PostResponse {
        id: post.id,
        title: post.title.clone(),
        slug: post.slug.clone(),
        author_id: post.author_id,
        body: post.body.clone(),
        publish: post.publish,
        status: post.status.label().to_string(),
        url: post.canonical_url(),
        tags: tags.iter().map(tag).collect(),
    }
}

pub fn post_link(post: &Post) -> PostLinkResponse {
    PostLinkResponse {
        title: post.title.clone(),
        url: post.canonical_url(),
    }
}

/// Reader-facing comments leave out the email address.
pub fn comment(comment: &Comment, with_email: bool) -> CommentResponse {
    CommentResponse {
        id: comment.id,
        post_id: comment.post_id,
        name: comment.name.clone(),
        email: with_email.then(|| comment.email.clone()),
        body: comment.body.clone(),
        created: comment.created,
        active: comment.active,
    }
}

pub fn page_meta<T>(page: &Page<T>) -> PageMeta {
    PageMeta {
        number: page.number,
        num_pages: page.num_pages,
        count: page.count,
        per_page: page.per_page,
        has_previous: page.has_previous(),
        has_next: page.has_next(),
        previous_page_number: page.has_previous().then(|| page.number - 1),
        next_page_number: page.has_next().then(|| page.number + 1),
    }
}

pub fn question(question: &Question) -> QuestionResponse {
    QuestionResponse {
        id: question.id,
        question_text: question.question_text.clone(),
        pub_date: question.pub_date,
    }
}

pub fn choice(choice: &Choice) -> ChoiceResponse {
    ChoiceResponse {
        id: choice.id,
        choice_text: choice.choice_text.clone(),
        votes: choice.votes,
    }
}

pub fn question_detail(detail: &QuestionDetail) -> QuestionDetailResponse {
    QuestionDetailResponse {
        question: question(&detail.question),
        choices: detail.choices.iter().map(choice).collect(),
    }
}
