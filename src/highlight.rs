//! Syntax highlighting for code blocks.
//!
//! Wraps syntect with a light/dark theme pair. A document pass renders every
//! `.codeblock__code` block in both themes; a block whose language is unknown
//! or whose rendering fails keeps its original markup.

use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use thiserror::Error;

use crate::dom::{Document, NodeId};
use crate::theme::Theme;

/// Class on the `<pre>` of a code block awaiting highlighting.
pub const CODEBLOCK_CLASS: &str = "codeblock__code";

/// Class added to a code block wrapper once it has been highlighted.
pub const HIGHLIGHTED_CLASS: &str = "highlighted";

#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("no syntax for language `{0}`")]
    UnknownLanguage(String),

    #[error("no highlighting theme named `{0}`")]
    UnknownTheme(String),

    #[error("highlighting failed: {0}")]
    Render(#[from] syntect::Error),
}

/// Theme names used for light and dark rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemePair {
    pub light: String,
    pub dark: String,
}

impl Default for ThemePair {
    fn default() -> Self {
        Self {
            light: "InspiredGitHub".to_owned(),
            dark: "base16-ocean.dark".to_owned(),
        }
    }
}

/// Outcome counts of [`Highlighter::highlight_document`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HighlightReport {
    pub rendered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// One highlighted line: styled fragments in order.
pub type StyledLine = Vec<(Style, String)>;

pub struct Highlighter {
    syntaxes: SyntaxSet,
    themes: ThemeSet,
    pair: ThemePair,
}

impl Highlighter {
    /// Load syntect's bundled syntaxes and themes.
    pub fn new(pair: ThemePair) -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes: ThemeSet::load_defaults(),
            pair,
        }
    }

    fn syntax(&self, lang: &str) -> Result<&SyntaxReference, HighlightError> {
        let token = lang.split_whitespace().next().unwrap_or("");
        if token.is_empty() {
            return Ok(self.syntaxes.find_syntax_plain_text());
        }
        self.syntaxes
            .find_syntax_by_token(token)
            .ok_or_else(|| HighlightError::UnknownLanguage(token.to_owned()))
    }

    fn theme(&self, theme: Theme) -> Result<&syntect::highlighting::Theme, HighlightError> {
        let name = match theme {
            Theme::Light => &self.pair.light,
            Theme::Dark => &self.pair.dark,
        };
        self.themes
            .themes
            .get(name)
            .ok_or_else(|| HighlightError::UnknownTheme(name.clone()))
    }

    /// Render `source` as markup holding a light and a dark rendering.
    ///
    /// Stylesheets pick one with `[data-site-theme]`; the wrapper `<pre>`
    /// carries [`CODEBLOCK_CLASS`] like the block it replaces.
    pub fn render(&self, source: &str, lang: &str) -> Result<String, HighlightError> {
        let syntax = self.syntax(lang)?;
        let mut markup = format!("<pre class=\"{CODEBLOCK_CLASS}\">");
        for theme in [Theme::Light, Theme::Dark] {
            let html = highlighted_html_for_string(source, &self.syntaxes, syntax, self.theme(theme)?)?;
            markup.push_str(&format!("<div class=\"highlight highlight--{theme}\">{html}</div>"));
        }
        markup.push_str("</pre>");
        Ok(markup)
    }

    /// Styled lines of `source` in one theme, for terminal display.
    pub fn styled_lines(
        &self,
        source: &str,
        lang: &str,
        theme: Theme,
    ) -> Result<Vec<StyledLine>, HighlightError> {
        let syntax = self.syntax(lang)?;
        let mut lines = HighlightLines::new(syntax, self.theme(theme)?);
        let mut out = Vec::new();
        for line in LinesWithEndings::from(source) {
            let ranges = lines.highlight_line(line, &self.syntaxes)?;
            out.push(
                ranges
                    .into_iter()
                    .map(|(style, text)| (style, text.trim_end_matches('\n').to_owned()))
                    .collect(),
            );
        }
        Ok(out)
    }

    /// Highlight every pending code block in `document`.
    ///
    /// The block's wrapper (the parent of the `.codeblock__code` element)
    /// supplies `data-lang` and receives the rendered markup.
    pub fn highlight_document(&self, document: &mut Document) -> HighlightReport {
        let mut report = HighlightReport::default();
        for block in document.get_elements_by_class_name(CODEBLOCK_CLASS) {
            let Some(wrapper) = document.parent(block) else {
                report.skipped += 1;
                continue;
            };
            let code: Option<NodeId> = document.get_elements_by_tag_name(block, "code").first().copied();
            let Some(code) = code else {
                report.skipped += 1;
                continue;
            };
            if document.has_class(wrapper, HIGHLIGHTED_CLASS) {
                report.skipped += 1;
                continue;
            }

            let lang = document.dataset(wrapper, "lang").unwrap_or("").to_owned();
            let source = document.text_content(code);
            match self.render(&source, &lang) {
                Ok(markup) => {
                    document.set_inner_markup(wrapper, &markup);
                    document.add_class(wrapper, HIGHLIGHTED_CLASS);
                    report.rendered += 1;
                }
                Err(e) => {
                    log::error!("[highlight] lang={lang} error={e}");
                    report.failed += 1;
                }
            }
        }
        log::info!(
            "[highlight] rendered={} skipped={} failed={}",
            report.rendered,
            report.skipped,
            report.failed
        );
        report
    }
}
