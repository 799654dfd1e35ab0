//! In-memory backends - used when no database is configured, and by tests.

mod store;

pub use store::InMemoryStore;

#[cfg(test)]
mod tests;
