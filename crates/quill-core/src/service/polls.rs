//! Polls: latest questions, question detail, results and voting.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Choice, Question};
use crate::error::{DomainError, FieldErrors};
use crate::forms::VoteForm;
use crate::ports::QuestionRepository;

const LATEST_QUESTIONS: u64 = 5;

/// A question with its choices.
#[derive(Debug, Clone)]
pub struct QuestionDetail {
    pub question: Question,
    pub choices: Vec<Choice>,
}

pub struct PollService {
    questions: Arc<dyn QuestionRepository>,
}

impl PollService {
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// The five most recently published questions.
    pub async fn index(&self) -> Result<Vec<Question>, DomainError> {
        Ok(self.questions.latest(Utc::now(), LATEST_QUESTIONS).await?)
    }

    pub async fn detail(&self, question_id: Uuid) -> Result<QuestionDetail, DomainError> {
        let question = self.published_question(question_id).await?;
        let choices = self.questions.choices_for(question.id).await?;
        Ok(QuestionDetail { question, choices })
    }

    /// Vote tallies of a question.
    pub async fn results(&self, question_id: Uuid) -> Result<QuestionDetail, DomainError> {
        self.detail(question_id).await
    }

    /// Cast one vote and return the updated tallies.
    pub async fn vote(
        &self,
        question_id: Uuid,
        form: VoteForm,
    ) -> Result<QuestionDetail, DomainError> {
        let question = self.published_question(question_id).await?;
        let no_choice = || {
            DomainError::Validation(FieldErrors::single("choice", "You didn't select a choice."))
        };

        let choice_id = form
            .choice
            .as_deref()
            .and_then(|c| Uuid::parse_str(c).ok())
            .ok_or_else(no_choice)?;

        if !self.questions.increment_votes(question.id, choice_id).await? {
            return Err(no_choice());
        }

        tracing::info!(question_id = %question.id, choice_id = %choice_id, "Vote recorded");
        let choices = self.questions.choices_for(question.id).await?;
        Ok(QuestionDetail { question, choices })
    }

    async fn published_question(&self, question_id: Uuid) -> Result<Question, DomainError> {
        self.questions
            .find_by_id(question_id)
            .await?
            .filter(|q| q.is_published(Utc::now()))
            .ok_or_else(|| DomainError::not_found("Question", question_id))
    }
}
