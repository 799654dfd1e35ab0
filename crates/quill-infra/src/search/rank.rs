//! Weighted term-frequency rank, the in-memory stand-in for `ts_rank` over
//! `setweight(title, 'A') || setweight(body, 'B')`.

/// Weight of title matches (`A`).
pub const TITLE_WEIGHT: f64 = 1.0;
/// Weight of body matches (`B`).
pub const BODY_WEIGHT: f64 = 0.4;

/// Lowercased alphanumeric words of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Rank of a document for `query`: every occurrence of a query term scores
/// its field weight, averaged over the distinct query terms.
pub fn rank(title: &str, body: &str, query: &str) -> f64 {
    let mut terms = tokenize(query);
    terms.sort();
    terms.dedup();
    if terms.is_empty() {
        return 0.0;
    }

    let title_words = tokenize(title);
    let body_words = tokenize(body);

    let total: f64 = terms
        .iter()
        .map(|term| {
            let in_title = title_words.iter().filter(|w| *w == term).count() as f64;
            let in_body = body_words.iter().filter(|w| *w == term).count() as f64;
            in_title * TITLE_WEIGHT + in_body * BODY_WEIGHT
        })
        .sum();

    total / terms.len() as f64
}
