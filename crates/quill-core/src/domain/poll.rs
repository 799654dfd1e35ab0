use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Poll question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
}

impl Question {
    pub fn new(question_text: String, pub_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question_text,
            pub_date,
        }
    }

    /// Questions dated in the future are not shown yet.
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.pub_date <= now
    }
}

/// Answer option of a question, with its running vote count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: Uuid,
    pub question_id: Uuid,
    pub choice_text: String,
    pub votes: i32,
}

impl Choice {
    pub fn new(question_id: Uuid, choice_text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            question_id,
            choice_text,
            votes: 0,
        }
    }
}
