//! HTML page shell for the `render` subcommand.
//!
//! Serializes a page document as a standalone HTML file: a `<head>` with the
//! page title and stylesheet, the theme toggle button and its script, and the
//! body as built by the loader, outline and highlighter.

use crate::dom::Document;
use crate::theme::{PREFERENCE_KEY, THEME_ATTRIBUTE};

/// Id of the theme toggle button.
pub const THEME_TOGGLE_ID: &str = "site__theme";

/// Stylesheet: layout, active outline entry, and theme-dependent colours.
/// Only the code rendering matching `data-site-theme` is shown.
const STYLESHEET: &str = "\
:root{--bg:#ffffff;--fg:#1f2328;--muted:#656d76;--accent:#0969da}\n\
[data-site-theme=\"dark\"]{--bg:#0d1117;--fg:#e6edf3;--muted:#8d96a0;--accent:#4493f8}\n\
body{margin:0;background:var(--bg);color:var(--fg);font-family:system-ui,sans-serif;display:flex}\n\
nav.outline{position:sticky;top:0;align-self:flex-start;max-height:100vh;overflow-y:auto;width:16rem;padding:1rem}\n\
nav.outline ul{list-style:none;margin:0;padding-left:1rem}\n\
nav.outline a{color:var(--muted);text-decoration:none}\n\
nav.outline a.ACTIVE{color:var(--accent);font-weight:600}\n\
main{flex:1;max-width:48rem;padding:1rem 2rem}\n\
.highlight--dark{display:none}\n\
[data-site-theme=\"dark\"] .highlight--dark{display:block}\n\
[data-site-theme=\"dark\"] .highlight--light{display:none}\n\
#site__theme{position:fixed;top:1rem;right:1rem}\n";

/// Theme switching in the browser. On load the stored `colorscheme` wins,
/// then the theme the page was rendered with, then the system preference,
/// then dark. The toggle flips and stores the theme; system changes are
/// followed and stored.
const THEME_SCRIPT: &str = "\
(function () {\n\
  var root = document.documentElement;\n\
  var media = window.matchMedia ? window.matchMedia(\"(prefers-color-scheme: dark)\") : null;\n\
  function stored() {\n\
    try { return localStorage.getItem(\"@KEY@\"); } catch (e) { return null; }\n\
  }\n\
  function apply(theme) {\n\
    root.setAttribute(\"@ATTR@\", theme);\n\
    try { localStorage.setItem(\"@KEY@\", theme); } catch (e) {}\n\
  }\n\
  var saved = stored();\n\
  if (saved === \"light\" || saved === \"dark\") {\n\
    root.setAttribute(\"@ATTR@\", saved);\n\
  } else if (!root.getAttribute(\"@ATTR@\")) {\n\
    if (media) { root.setAttribute(\"@ATTR@\", media.matches ? \"dark\" : \"light\"); }\n\
    else { apply(\"dark\"); }\n\
  }\n\
  var toggle = document.getElementById(\"@TOGGLE@\");\n\
  if (toggle) {\n\
    toggle.addEventListener(\"click\", function () {\n\
      apply(root.getAttribute(\"@ATTR@\") === \"dark\" ? \"light\" : \"dark\");\n\
    });\n\
  }\n\
  if (media && media.addEventListener) {\n\
    media.addEventListener(\"change\", function (e) { apply(e.matches ? \"dark\" : \"light\"); });\n\
  }\n\
})();\n";

fn theme_script() -> String {
    THEME_SCRIPT
        .replace("@KEY@", PREFERENCE_KEY)
        .replace("@ATTR@", THEME_ATTRIBUTE)
        .replace("@TOGGLE@", THEME_TOGGLE_ID)
}

/// Serialize `document` as a complete HTML page titled `title`.
///
/// The document itself is not modified; the head, the toggle button and its
/// script are added to a copy.
pub fn page_shell(document: &Document, title: &str, active_class: &str) -> String {
    let mut doc = document.clone();
    let root = doc.document_element();
    doc.set_attribute(root, "lang", "en");

    let head = doc.create_element("head");
    let meta = doc.create_raw(
        "<meta charset=\"utf-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
    );
    let title_el = doc.create_element("title");
    let title_text = doc.create_text(title);
    doc.append_child(title_el, title_text);
    let css = STYLESHEET.replace("ACTIVE", active_class);
    let style = doc.create_raw(&format!("<style>\n{css}</style>\n"));
    doc.append_child(head, meta);
    doc.append_child(head, title_el);
    doc.append_child(head, style);

    // Head goes first; the loader's children (body) follow.
    let mut children = vec![head];
    children.extend_from_slice(doc.children(root));
    doc.replace_children(root, &children);

    if let Some(body) = doc.get_elements_by_tag_name(root, "body").first().copied() {
        let button = doc.create_element("button");
        doc.set_element_id(button, THEME_TOGGLE_ID);
        doc.set_attribute(button, "type", "button");
        doc.set_attribute(button, "aria-label", "Toggle dark mode");
        let label = doc.create_text("Theme");
        doc.append_child(button, label);
        let mut body_children = vec![button];
        body_children.extend_from_slice(doc.children(body));
        let script = doc.create_raw(&format!("<script>\n{}</script>\n", theme_script()));
        body_children.push(script);
        doc.replace_children(body, &body_children);
    }

    format!("<!DOCTYPE html>\n{}\n", doc.outer_html(root))
}

/// Title for a page: the article's first `h1`, then `fallback`.
pub fn page_title(h1: Option<&str>, fallback: &str) -> String {
    h1.filter(|t| !t.trim().is_empty())
        .unwrap_or(fallback)
        .to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
