//! Markdown → plain text conversion for long-text fields.
//!
//! Walks the `pulldown-cmark` event stream and keeps only the textual
//! content: emphasis, links, images, and HTML tags are dropped while their
//! text (link text, image alt text) is kept. Block elements are separated
//! by a blank line, list items and table rows by a single newline.
//!
//! ```rust
//! use contentful_search_core::markdown::markdown_to_plain_text;
//!
//! let text = markdown_to_plain_text("# Title\n\nSome **bold** [link](https://example.com).");
//! assert_eq!(text, "Title\n\nSome bold link.");
//! ```

use pulldown_cmark::{Event, Options, Parser, TagEnd};

/// Convert markdown source to plain text.
pub fn markdown_to_plain_text(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;

    for event in Parser::new_ext(source, options) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Rule => block_break(&mut out),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => {
                block_break(&mut out)
            }
            Event::End(TagEnd::Item | TagEnd::TableHead | TagEnd::TableRow) => {
                line_break(&mut out)
            }
            Event::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }

    out.trim().to_string()
}

fn block_break(out: &mut String) {
    let trimmed = out.trim_end_matches([' ', '\n']).len();
    out.truncate(trimmed);
    if !out.is_empty() {
        out.push_str("\n\n");
    }
}

fn line_break(out: &mut String) {
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}
