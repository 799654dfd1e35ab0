//! Submitted forms and their validation rules.
//!
//! Form fields arrive as optional strings: surrounding whitespace is trimmed
//! and blank values count as missing, so a missing field and an empty one
//! produce the same "required" message.

use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::error::FieldErrors;

const REQUIRED: &str = "This field is required.";

/// Deserialize a form value, trimming it and mapping blanks to `None`.
pub fn trimmed<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Comment submitted by a reader.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "This field is required."),
        length(max = 80, message = "Ensure this value has at most 80 characters.")
    )]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "This field is required."),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(required(message = "This field is required."))]
    pub body: Option<String>,
}

/// Validated comment fields.
#[derive(Debug, Clone)]
pub struct CleanComment {
    pub name: String,
    pub email: String,
    pub body: String,
}

impl CommentForm {
    pub fn clean(self) -> Result<CleanComment, FieldErrors> {
        self.validate()?;
        match (self.name, self.email, self.body) {
            (Some(name), Some(email), Some(body)) => Ok(CleanComment { name, email, body }),
            _ => Err(FieldErrors::single("__all__", REQUIRED)),
        }
    }
}

/// "Recommend this post" email form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EmailPostForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "This field is required."),
        length(max = 25, message = "Ensure this value has at most 25 characters.")
    )]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "This field is required."),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "This field is required."),
        email(message = "Enter a valid email address.")
    )]
    pub to: Option<String>,

    #[serde(default, deserialize_with = "trimmed")]
    pub comments: Option<String>,
}

/// Validated share fields.
#[derive(Debug, Clone)]
pub struct CleanShare {
    pub name: String,
    pub email: String,
    pub to: String,
    pub comments: String,
}

impl EmailPostForm {
    pub fn clean(self) -> Result<CleanShare, FieldErrors> {
        self.validate()?;
        match (self.name, self.email, self.to) {
            (Some(name), Some(email), Some(to)) => Ok(CleanShare {
                name,
                email,
                to,
                comments: self.comments.unwrap_or_default(),
            }),
            _ => Err(FieldErrors::single("__all__", REQUIRED)),
        }
    }
}

/// Poll vote: the selected choice id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteForm {
    #[serde(default, deserialize_with = "trimmed")]
    pub choice: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(name: &str, email: &str, body: &str) -> CommentForm {
        let opt = |v: &str| (!v.is_empty()).then(|| v.to_string());
        CommentForm {
            name: opt(name),
            email: opt(email),
            body: opt(body),
        }
    }

    #[test]
    fn test_valid_comment() {
        let clean = comment("Ana", "ana@example.com", "Nice post").clean().unwrap();
        assert_eq!(clean.name, "Ana");
        assert_eq!(clean.email, "ana@example.com");
    }

    #[test]
    fn test_missing_email_is_required() {
        let errors = comment("Ana", "", "Nice post").clean().unwrap_err();
        assert_eq!(errors.get("email"), Some(&[REQUIRED.to_string()][..]));
        assert!(errors.get("name").is_none());
    }

    #[test]
    fn test_malformed_email_and_long_name() {
        let long_name = "x".repeat(81);
        let errors = comment(&long_name, "not-an-email", "b").clean().unwrap_err();
        assert!(errors.get("name").is_some());
        assert_eq!(
            errors.get("email"),
            Some(&["Enter a valid email address.".to_string()][..])
        );
    }

    #[test]
    fn test_share_form_comments_optional() {
        let form = EmailPostForm {
            name: Some("Ana".into()),
            email: Some("ana@example.com".into()),
            to: Some("bob@example.com".into()),
            comments: None,
        };
        let clean = form.clean().unwrap();
        assert_eq!(clean.comments, "");
    }

    #[test]
    fn test_share_form_requires_recipient() {
        let form = EmailPostForm {
            name: Some("Ana".into()),
            email: Some("ana@example.com".into()),
            to: None,
            comments: Some("read this".into()),
        };
        let errors = form.clean().unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["to"]);
    }

    #[test]
    fn test_blank_values_deserialize_as_missing() {
        let form: CommentForm =
            serde_json::from_str(r#"{"name":"  Ana ","email":"   ","body":"hi"}"#).unwrap();
        assert_eq!(form.name.as_deref(), Some("Ana"));
        assert!(form.email.is_none());
    }
}
