//! Markdown loading.
//!
//! Parses a markdown article into a page [`Document`]:
//!
//! ```text
//! <html><body>
//!   <nav id="{outline_id}"></nav>
//!   <main><article id="{article_id}"> … </article></main>
//! </body></html>
//! ```
//!
//! Fenced and indented code becomes
//! `<div class="codeblock" data-lang="…"><pre class="codeblock__code"><code>…`,
//! the shape the highlighter looks for. Raw HTML in the source is kept as
//! escaped text.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::dom::{Document, NodeId};
use crate::highlight::CODEBLOCK_CLASS;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A loaded page and the elements the scripts look up.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub document: Document,
    pub article: NodeId,
    pub outline: NodeId,
    /// Text of the first `h1`, if any.
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

/// Element for a markdown tag. Tags without a natural element become `div`
/// (block) or `span` (inline).
fn open_element(doc: &mut Document, tag: &Tag) -> NodeId {
    match tag {
        Tag::Paragraph => doc.create_element("p"),
        Tag::Heading { level, .. } => doc.create_element(heading_tag(*level)),
        Tag::BlockQuote(..) => doc.create_element("blockquote"),
        Tag::List(Some(start)) => {
            let ol = doc.create_element("ol");
            if *start != 1 {
                doc.set_attribute(ol, "start", &start.to_string());
            }
            ol
        }
        Tag::List(None) => doc.create_element("ul"),
        Tag::Item => doc.create_element("li"),
        Tag::Table(_) => doc.create_element("table"),
        Tag::TableHead => doc.create_element("thead"),
        Tag::TableRow => doc.create_element("tr"),
        Tag::TableCell => doc.create_element("td"),
        Tag::Emphasis => doc.create_element("em"),
        Tag::Strong => doc.create_element("strong"),
        Tag::Strikethrough => doc.create_element("del"),
        Tag::Link { dest_url, title, .. } => {
            let a = doc.create_element("a");
            doc.set_attribute(a, "href", dest_url);
            if !title.is_empty() {
                doc.set_attribute(a, "title", title);
            }
            a
        }
        Tag::Image { dest_url, .. } => {
            let img = doc.create_element("img");
            doc.set_attribute(img, "src", dest_url);
            img
        }
        Tag::HtmlBlock | Tag::FootnoteDefinition(_) => doc.create_element("div"),
        _ => doc.create_element("span"),
    }
}

fn code_language(kind: &CodeBlockKind) -> String {
    match kind {
        CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or("").to_owned(),
        CodeBlockKind::Indented => String::new(),
    }
}

/// Build the page skeleton and return `(article, outline)`.
fn skeleton(doc: &mut Document, article_id: &str, outline_id: &str) -> (NodeId, NodeId) {
    let root = doc.document_element();
    let body = doc.create_element("body");
    doc.append_child(root, body);

    let outline = doc.create_element("nav");
    doc.set_element_id(outline, outline_id);
    doc.add_class(outline, "outline");
    doc.append_child(body, outline);

    let main = doc.create_element("main");
    doc.append_child(body, main);
    let article = doc.create_element("article");
    doc.set_element_id(article, article_id);
    doc.append_child(main, article);

    (article, outline)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse markdown `source` into a page whose article and outline elements
/// carry the given ids.
pub fn parse_page(source: &str, article_id: &str, outline_id: &str) -> ParsedPage {
    let mut doc = Document::new();
    let (article, outline) = skeleton(&mut doc, article_id, outline_id);

    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(source, options);

    // Open elements; the top receives new children.
    let mut stack: Vec<NodeId> = vec![article];
    let mut in_table_head = false;
    let mut title: Option<String> = None;
    let mut pending_title: Option<NodeId> = None;

    for event in parser {
        let parent = *stack.last().unwrap_or(&article);
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let wrapper = doc.create_element("div");
                doc.add_class(wrapper, "codeblock");
                doc.set_dataset(wrapper, "lang", &code_language(&kind));
                let pre = doc.create_element("pre");
                doc.add_class(pre, CODEBLOCK_CLASS);
                let code = doc.create_element("code");
                doc.append_child(parent, wrapper);
                doc.append_child(wrapper, pre);
                doc.append_child(pre, code);
                stack.extend([wrapper, pre, code]);
            }
            Event::End(TagEnd::CodeBlock) => {
                for _ in 0..3 {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
            }
            Event::Start(tag) => {
                let el = if in_table_head && matches!(tag, Tag::TableCell) {
                    doc.create_element("th")
                } else {
                    open_element(&mut doc, &tag)
                };
                match tag {
                    Tag::TableHead => in_table_head = true,
                    Tag::Heading { level: HeadingLevel::H1, .. } if title.is_none() => {
                        pending_title = Some(el);
                    }
                    _ => {}
                }
                doc.append_child(parent, el);
                stack.push(el);
            }
            Event::End(tag_end) => {
                if let Some(el) = stack.pop() {
                    match tag_end {
                        TagEnd::TableHead => in_table_head = false,
                        TagEnd::Image => {
                            let alt = doc.text_content(el);
                            doc.replace_children(el, &[]);
                            doc.set_attribute(el, "alt", &alt);
                        }
                        TagEnd::Heading(_) if pending_title == Some(el) => {
                            title = Some(doc.text_content(el));
                            pending_title = None;
                        }
                        _ => {}
                    }
                }
                if stack.is_empty() {
                    stack.push(article);
                }
            }
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                let node = doc.create_text(&text);
                doc.append_child(parent, node);
            }
            Event::Code(code) => {
                let el = doc.create_element("code");
                let node = doc.create_text(&code);
                doc.append_child(el, node);
                doc.append_child(parent, el);
            }
            Event::SoftBreak => {
                let node = doc.create_text("\n");
                doc.append_child(parent, node);
            }
            Event::HardBreak => {
                let br = doc.create_element("br");
                doc.append_child(parent, br);
            }
            Event::Rule => {
                let hr = doc.create_element("hr");
                doc.append_child(parent, hr);
            }
            Event::TaskListMarker(checked) => {
                let input = doc.create_element("input");
                doc.set_attribute(input, "type", "checkbox");
                doc.set_attribute(input, "disabled", "");
                if checked {
                    doc.set_attribute(input, "checked", "");
                }
                doc.append_child(parent, input);
            }
            _ => {}
        }
    }

    log::debug!("[parse] nodes_in_article={}", doc.descendants(article).len());

    ParsedPage {
        document: doc,
        article,
        outline,
        title,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParsedPage {
        parse_page(src, "article", "outline")
    }

    #[test]
    fn empty_document() {
        let page = parse("");
        assert!(page.document.children(page.article).is_empty());
        assert_eq!(page.title, None);
        assert_eq!(page.document.get_element_by_id("outline"), Some(page.outline));
    }

    #[test]
    fn headings_become_heading_elements() {
        let page = parse("# Title\n\nBody\n\n## Section\n\n### Sub\n");
        let doc = &page.document;
        let tags: Vec<_> = doc
            .children(page.article)
            .iter()
            .filter_map(|&n| doc.tag_name(n))
            .collect();
        assert_eq!(tags, vec!["h1", "p", "h2", "h3"]);
        assert_eq!(page.title.as_deref(), Some("Title"));
    }

    #[test]
    fn inline_markup_is_kept_inside_headings() {
        let page = parse("## Use `cargo` *now*\n");
        let h2 = page.document.get_elements_by_tag_name(page.article, "h2")[0];
        assert_eq!(
            page.document.inner_html(h2),
            "Use <code>cargo</code> <em>now</em>"
        );
    }

    #[test]
    fn fenced_code_gets_highlighter_shape() {
        let page = parse("```rust title=x\nfn main() {}\n```\n");
        let doc = &page.document;
        let wrapper = doc.children(page.article)[0];
        assert!(doc.has_class(wrapper, "codeblock"));
        assert_eq!(doc.dataset(wrapper, "lang"), Some("rust"));
        let pre = doc.children(wrapper)[0];
        assert!(doc.has_class(pre, CODEBLOCK_CLASS));
        let code = doc.children(pre)[0];
        assert_eq!(doc.text_content(code), "fn main() {}\n");
    }

    #[test]
    fn content_after_code_block_returns_to_article() {
        let page = parse("```\nx\n```\n\nafter\n");
        let doc = &page.document;
        let last = *doc.children(page.article).last().expect("paragraph");
        assert_eq!(doc.tag_name(last), Some("p"));
    }

    #[test]
    fn nested_lists_and_quotes() {
        let page = parse("> ## Quoted\n\n- a\n  - b\n");
        let doc = &page.document;
        let quote = doc.children(page.article)[0];
        assert_eq!(doc.tag_name(quote), Some("blockquote"));
        assert_eq!(doc.get_elements_by_tag_name(quote, "h2").len(), 1);
        assert_eq!(doc.get_elements_by_tag_name(page.article, "ul").len(), 2);
    }

    #[test]
    fn table_header_cells_are_th() {
        let page = parse("| A | B |\n|---|---|\n| 1 | 2 |\n");
        let doc = &page.document;
        assert_eq!(doc.get_elements_by_tag_name(page.article, "th").len(), 2);
        assert_eq!(doc.get_elements_by_tag_name(page.article, "td").len(), 2);
    }

    #[test]
    fn image_alt_text_moves_into_attribute() {
        let page = parse("![alt text](image.png)\n");
        let doc = &page.document;
        let img = doc.get_elements_by_tag_name(page.article, "img")[0];
        assert_eq!(doc.attribute(img, "alt"), Some("alt text"));
        assert_eq!(doc.attribute(img, "src"), Some("image.png"));
        assert!(doc.children(img).is_empty());
    }

    #[test]
    fn raw_html_is_escaped() {
        let page = parse("<script>alert(1)</script>\n");
        let html = page.document.inner_html(page.article);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn task_list_markers_render_checkboxes() {
        let page = parse("- [ ] todo\n- [x] done\n");
        let doc = &page.document;
        let inputs = doc.get_elements_by_tag_name(page.article, "input");
        assert_eq!(inputs.len(), 2);
        assert_eq!(doc.attribute(inputs[1], "checked"), Some(""));
    }
}
