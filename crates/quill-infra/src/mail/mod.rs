//! Mail transports - console output, HTTP mail API, and an in-memory outbox.

mod console;
mod http;
mod memory;

pub use console::ConsoleMailer;
pub use http::{HttpMailer, HttpMailerConfig};
pub use memory::InMemoryMailer;
