//! Terminal rendering.
//!
//! Converts the article of a page [`Document`] into styled ratatui [`Text`]
//! for the `view` subcommand, and remembers the line each heading lands on
//! so the viewport can report heading geometry to the observer.

use std::collections::HashMap;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};

use crate::dom::{Document, NodeId, NodeKind};
use crate::highlight::{Highlighter, CODEBLOCK_CLASS};
use crate::observer::{BoundingRect, Geometry};
use crate::theme::Theme;

/// Rendered article plus heading positions.
pub struct RenderedPage {
    pub text: Text<'static>,
    /// 0-based rendered line of every heading element.
    pub heading_lines: HashMap<NodeId, usize>,
}

impl RenderedPage {
    pub fn total_lines(&self) -> usize {
        self.text.lines.len()
    }
}

pub fn heading_style(level: u8) -> Style {
    let base = Style::default().add_modifier(Modifier::BOLD);
    match level {
        1 => base.fg(Color::Magenta),
        2 => base.fg(Color::Cyan),
        3 => base.fg(Color::Green),
        4 => base.fg(Color::Yellow),
        _ => base.fg(Color::White),
    }
}

/// `1` for `h1` through `6` for `h6`.
fn markdown_rank(tag: &str) -> Option<u8> {
    match tag.as_bytes() {
        [b'h', d @ b'1'..=b'6'] => Some(d - b'0'),
        _ => None,
    }
}

fn border_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

/// Convert the children of `article` into styled text.
///
/// Code blocks are highlighted with `highlighter` in `theme` when given;
/// blocks it cannot handle are shown plain.
pub fn render_article(
    doc: &Document,
    article: NodeId,
    highlighter: Option<&Highlighter>,
    theme: Theme,
) -> RenderedPage {
    let mut renderer = Renderer {
        doc,
        highlighter,
        theme,
        lines: Vec::new(),
        heading_lines: HashMap::new(),
    };
    renderer.render_blocks(doc.children(article), "");
    RenderedPage {
        text: Text::from(renderer.lines),
        heading_lines: renderer.heading_lines,
    }
}

struct Renderer<'a> {
    doc: &'a Document,
    highlighter: Option<&'a Highlighter>,
    theme: Theme,
    lines: Vec<Line<'static>>,
    heading_lines: HashMap<NodeId, usize>,
}

impl Renderer<'_> {
    fn render_blocks(&mut self, nodes: &[NodeId], prefix: &str) {
        for (i, &node) in nodes.iter().enumerate() {
            if i > 0 && prefix.is_empty() {
                // Blank line between top-level blocks
                self.lines.push(Line::default());
            }
            self.render_block(node, prefix);
        }
    }

    fn push_prefixed(&mut self, prefix: &str, mut spans: Vec<Span<'static>>) {
        if !prefix.is_empty() {
            spans.insert(0, Span::styled(prefix.to_owned(), border_style()));
        }
        self.lines.push(Line::from(spans));
    }

    fn render_block(&mut self, node: NodeId, prefix: &str) {
        let doc = self.doc;
        let tag = match doc.kind(node) {
            NodeKind::Element(data) => data.tag.as_str(),
            NodeKind::Text(text) | NodeKind::Raw(text) => {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    self.push_prefixed(prefix, vec![Span::raw(line.to_owned())]);
                }
                return;
            }
        };

        if let Some(level) = markdown_rank(tag) {
            self.heading_lines.insert(node, self.lines.len());
            let text = format!("{} {}", "#".repeat(level as usize), doc.text_content(node));
            self.push_prefixed(prefix, vec![Span::styled(text, heading_style(level))]);
            return;
        }

        match tag {
            "p" => self.render_paragraph(node, prefix),
            "ul" | "ol" => self.render_list(node, prefix, tag == "ol"),
            "blockquote" => {
                let inner = format!("{prefix}\u{258c} ");
                self.render_blocks_tight(doc.children(node), &inner);
            }
            "table" => self.render_table(node, prefix),
            "hr" => self.push_prefixed(
                prefix,
                vec![Span::styled("\u{2500}".repeat(40), border_style())],
            ),
            "div" if doc.has_class(node, "codeblock") => self.render_code_block(node, prefix),
            _ => self.render_blocks_tight(doc.children(node), prefix),
        }
    }

    /// Blocks without blank separators, for nested containers.
    fn render_blocks_tight(&mut self, nodes: &[NodeId], prefix: &str) {
        for &node in nodes {
            self.render_block(node, prefix);
        }
    }

    fn render_paragraph(&mut self, node: NodeId, prefix: &str) {
        let mut spans = Vec::new();
        self.inline_spans(node, Style::default(), &mut spans);
        for line in split_lines(spans) {
            self.push_prefixed(prefix, line);
        }
    }

    fn render_list(&mut self, list: NodeId, prefix: &str, ordered: bool) {
        let doc = self.doc;
        let bullet_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
        let start: usize = doc
            .attribute(list, "start")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        let items = doc.children(list).iter().filter(|&&n| doc.tag_name(n) == Some("li"));

        for (i, &item) in items.enumerate() {
            let marker = if ordered {
                format!("  {}. ", start + i)
            } else {
                "  \u{2022} ".to_owned()
            };
            let mut spans = vec![Span::styled(marker, bullet_style)];
            let mut nested = Vec::new();
            for &child in doc.children(item) {
                match doc.tag_name(child) {
                    Some("ul" | "ol" | "blockquote" | "div" | "table") => nested.push(child),
                    Some(tag) if markdown_rank(tag).is_some() => nested.push(child),
                    Some("p") => self.inline_spans(child, Style::default(), &mut spans),
                    _ => self.inline_node(child, Style::default(), &mut spans),
                }
            }
            for line in split_lines(spans) {
                self.push_prefixed(prefix, line);
            }
            let inner = format!("{prefix}    ");
            self.render_blocks_tight(&nested, &inner);
        }
    }

    fn render_table(&mut self, table: NodeId, prefix: &str) {
        let doc = self.doc;
        // Header cells sit directly in `thead`; body cells in `tr`.
        let rows = doc
            .descendants(table)
            .into_iter()
            .filter(|&n| matches!(doc.tag_name(n), Some("thead" | "tr")));
        for row in rows {
            let header = doc.children(row).iter().any(|&c| doc.tag_name(c) == Some("th"));
            let style = if header {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            let cells: Vec<String> = doc
                .children(row)
                .iter()
                .filter(|&&c| matches!(doc.tag_name(c), Some("th" | "td")))
                .map(|&c| doc.text_content(c).trim().to_owned())
                .collect();
            if cells.is_empty() {
                continue;
            }
            self.push_prefixed(prefix, vec![Span::styled(format!("  {}", cells.join(" \u{2502} ")), style)]);
        }
    }

    fn render_code_block(&mut self, wrapper: NodeId, prefix: &str) {
        let doc = self.doc;
        let lang = doc.dataset(wrapper, "lang").unwrap_or("").to_owned();
        let source = doc
            .get_elements_by_class_name(CODEBLOCK_CLASS)
            .into_iter()
            .find(|&pre| doc.parent(pre) == Some(wrapper))
            .map(|pre| doc.text_content(pre))
            .unwrap_or_default();

        let label = if lang.is_empty() {
            "\u{250c}\u{2500}\u{2500}\u{2500}".to_owned()
        } else {
            format!("\u{250c}\u{2500}\u{2500}\u{2500} {lang}")
        };
        self.push_prefixed(prefix, vec![Span::styled(label, border_style())]);

        let styled = self
            .highlighter
            .map(|hl| hl.styled_lines(&source, &lang, self.theme));
        match styled {
            Some(Ok(lines)) => {
                for fragments in lines {
                    let mut spans = vec![Span::styled("\u{2502} ", border_style())];
                    spans.extend(
                        fragments
                            .into_iter()
                            .map(|(style, text)| Span::styled(text, syntect_style(style))),
                    );
                    self.push_prefixed(prefix, spans);
                }
            }
            other => {
                if let Some(Err(e)) = other {
                    log::debug!("[render] plain code block lang={lang} reason={e}");
                }
                let code_style = Style::default().fg(Color::Green);
                for line in source.lines() {
                    self.push_prefixed(
                        prefix,
                        vec![
                            Span::styled("\u{2502} ", border_style()),
                            Span::styled(line.to_owned(), code_style),
                        ],
                    );
                }
            }
        }
        self.push_prefixed(
            prefix,
            vec![Span::styled("\u{2514}\u{2500}\u{2500}\u{2500}", border_style())],
        );
    }

    fn inline_spans(&self, node: NodeId, style: Style, spans: &mut Vec<Span<'static>>) {
        for &child in self.doc.children(node) {
            self.inline_node(child, style, spans);
        }
    }

    fn inline_node(&self, node: NodeId, style: Style, spans: &mut Vec<Span<'static>>) {
        let doc = self.doc;
        match doc.kind(node) {
            NodeKind::Text(text) | NodeKind::Raw(text) => spans.push(Span::styled(text.clone(), style)),
            NodeKind::Element(data) => match data.tag.as_str() {
                "br" => spans.push(Span::raw("\n")),
                "input" => {
                    let mark = if doc.attribute(node, "checked").is_some() { "[x] " } else { "[ ] " };
                    spans.push(Span::styled(mark, style.fg(Color::Cyan)));
                }
                "img" => {
                    let alt = doc.attribute(node, "alt").unwrap_or("image");
                    spans.push(Span::styled(format!("[{alt}]"), style.fg(Color::Magenta)));
                }
                tag => {
                    let inner = match tag {
                        "strong" => style.add_modifier(Modifier::BOLD),
                        "em" => style.add_modifier(Modifier::ITALIC),
                        "del" => style.add_modifier(Modifier::CROSSED_OUT),
                        "code" => style.fg(Color::Yellow),
                        "a" => style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
                        _ => style,
                    };
                    self.inline_spans(node, inner, spans);
                }
            },
        }
    }
}

/// Split spans on embedded newlines into separate lines.
fn split_lines(spans: Vec<Span<'static>>) -> Vec<Vec<Span<'static>>> {
    let mut lines = vec![Vec::new()];
    for span in spans {
        let style = span.style;
        let mut parts = span.content.split('\n').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                if let Some(line) = lines.last_mut() {
                    line.push(Span::styled(part.to_owned(), style));
                }
            }
            if parts.peek().is_some() {
                lines.push(Vec::new());
            }
        }
    }
    lines
}

fn syntect_style(style: syntect::highlighting::Style) -> Style {
    let fg = style.foreground;
    Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b))
}

// ---------------------------------------------------------------------------
// Viewport geometry
// ---------------------------------------------------------------------------

/// Heading geometry of a scrolled terminal viewport.
///
/// Every heading is one row tall; its top is its line relative to the first
/// visible line. Elements that were never rendered sit below the document.
pub struct ViewportGeometry<'a> {
    pub page: &'a RenderedPage,
    pub scroll: usize,
    pub height: usize,
}

impl Geometry for ViewportGeometry<'_> {
    fn bounding_rect(&self, element: NodeId) -> BoundingRect {
        let line = self
            .page
            .heading_lines
            .get(&element)
            .copied()
            .unwrap_or(self.page.total_lines());
        BoundingRect {
            top: line as f64 - self.scroll as f64,
            height: 1.0,
        }
    }

    fn viewport_height(&self) -> f64 {
        self.height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::ThemePair;
    use crate::parse::{parse_page, ParsedPage};

    fn render(src: &str) -> (ParsedPage, RenderedPage) {
        let page = parse_page(src, "article", "outline");
        let rendered = render_article(&page.document, page.article, None, Theme::Dark);
        (page, rendered)
    }

    fn joined(rendered: &RenderedPage) -> String {
        rendered
            .text
            .lines
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn heading_levels_styled() {
        let (_, rendered) = render("# H1\n\n## H2\n\n### H3\n");
        assert!(rendered.text.lines[0].to_string().contains("# H1"));
        assert_eq!(rendered.text.lines[2].to_string(), "## H2");
        assert_eq!(rendered.heading_lines.len(), 3);
    }

    #[test]
    fn heading_lines_point_at_headings() {
        let (page, rendered) = render("## A\n\npara\n\n## B\n");
        let doc = &page.document;
        for (&node, &line) in &rendered.heading_lines {
            let expected = format!("## {}", doc.text_content(node));
            assert_eq!(rendered.text.lines[line].to_string(), expected);
        }
    }

    #[test]
    fn code_block_has_borders() {
        let (_, rendered) = render("```\nhello\n```\n");
        let joined = joined(&rendered);
        assert!(joined.contains("\u{250c}"));
        assert!(joined.contains("hello"));
        assert!(joined.contains("\u{2514}"));
    }

    #[test]
    fn highlighted_code_keeps_text() {
        let page = parse_page("```rust\nlet x = 1;\n```\n", "article", "outline");
        let hl = Highlighter::new(ThemePair::default());
        let rendered = render_article(&page.document, page.article, Some(&hl), Theme::Light);
        assert!(joined(&rendered).contains("let x = 1;"));
    }

    #[test]
    fn list_has_bullets_and_nesting() {
        let (_, rendered) = render("- alpha\n  - inner\n- beta\n");
        let joined = joined(&rendered);
        assert!(joined.contains("\u{2022} alpha"));
        assert!(joined.contains("    \u{2022} inner") || joined.contains("      \u{2022} inner"));
        assert!(joined.contains("beta"));
    }

    #[test]
    fn block_quote_has_bar() {
        let (_, rendered) = render("> quoted\n");
        let joined = joined(&rendered);
        assert!(joined.contains("\u{258c}"));
        assert!(joined.contains("quoted"));
    }

    #[test]
    fn inline_styles_and_breaks() {
        let (_, rendered) = render("**bold** and `code`\nnext\n");
        let first = &rendered.text.lines[0];
        assert!(first.spans.iter().any(|s| s.content == "bold"
            && s.style.add_modifier.contains(Modifier::BOLD)));
        assert_eq!(rendered.text.lines[1].to_string(), "next");
    }

    #[test]
    fn table_rows_include_header() {
        let (_, rendered) = render("| A | B |\n|---|---|\n| 1 | 2 |\n");
        let joined = joined(&rendered);
        assert!(joined.contains("A \u{2502} B"));
        assert!(joined.contains("1 \u{2502} 2"));
    }

    #[test]
    fn empty_document_renders() {
        let (_, rendered) = render("");
        assert!(rendered.text.lines.is_empty());
    }

    #[test]
    fn viewport_geometry_offsets_by_scroll() {
        let (page, rendered) = render("## A\n\n## B\n");
        let doc = &page.document;
        let b = doc.get_elements_by_tag_name(page.article, "h2")[1];
        let line = rendered.heading_lines[&b];
        let geometry = ViewportGeometry {
            page: &rendered,
            scroll: 1,
            height: 10,
        };
        assert_eq!(geometry.bounding_rect(b).top, line as f64 - 1.0);
        assert_eq!(geometry.viewport_height(), 10.0);
    }
}
