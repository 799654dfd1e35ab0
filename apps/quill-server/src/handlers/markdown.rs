//! Markdown rendering of post bodies.

use pulldown_cmark::{Options, Parser, html};

/// Render Markdown to an HTML fragment.
pub fn render(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_emphasis_and_paragraphs() {
        let html = render("Hello *world*\n\nSecond");
        assert_eq!(html, "<p>Hello <em>world</em></p>\n<p>Second</p>\n");
    }
}
