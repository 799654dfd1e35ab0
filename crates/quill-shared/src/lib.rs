//! # Quill Shared
//!
//! Wire types of the Quill HTTP API: request/response DTOs and the problem
//! document every error renders as.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
