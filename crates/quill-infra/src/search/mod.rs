//! Text scoring used by the in-memory store.
//!
//! Postgres computes the same signals with `pg_trgm` and `ts_rank`; these
//! functions reproduce them closely enough for local runs and tests.

mod rank;
mod trigram;

pub use rank::{BODY_WEIGHT, TITLE_WEIGHT, rank, tokenize};
pub use trigram::{similarity, trigrams};
