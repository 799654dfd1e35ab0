//! # Quill Core
//!
//! The domain layer of Quill: blog posts, comments, tags and polls.
//! This crate contains pure business logic with zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod forms;
pub mod pagination;
pub mod ports;
pub mod service;

pub use error::{DomainError, FieldErrors, RepoError};
