//! Scroll-synchronized article outline.
//!
//! [`OutlineTracker::build`] turns the headings of an article into a nested
//! `<ul>` of anchors inside an outline element. Afterwards every visibility
//! batch from the observer goes through
//! [`OutlineTracker::on_visibility_batch`], which keeps exactly one anchor
//! highlighted once any heading has been seen.

use thiserror::Error;

use crate::dom::{Document, NodeId};
use crate::headers::{self, HeadingNode};
use crate::observer::{Geometry, IntersectionObserver, VisibilityBatch};

/// Class applied to the active outline anchor unless configured otherwise.
pub const DEFAULT_ACTIVE_CLASS: &str = "specification__outline--active";

/// Prefix of the DOM id given to each outline anchor.
pub const ANCHOR_ID_PREFIX: &str = "outline-item";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutlineError {
    /// An element id did not resolve in the document.
    #[error("`{id}` element not found")]
    MissingElement { id: String },
}

/// One anchor in the outline list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub index: usize,
    /// Id assigned to the heading; the anchor's `href` is `#{anchor_id}`.
    pub anchor_id: String,
    /// Inner markup of the heading.
    pub label: String,
    /// The `<a>` element in the outline.
    pub link: NodeId,
}

/// Headings currently visible, keyed by element, kept in insertion order.
#[derive(Debug, Default, Clone)]
pub struct VisibilitySet {
    entries: Vec<(NodeId, usize)>,
}

impl VisibilitySet {
    /// Record `element`. Re-inserting keeps its original position.
    pub fn insert(&mut self, element: NodeId, index: usize) {
        match self.entries.iter_mut().find(|(e, _)| *e == element) {
            Some(slot) => slot.1 = index,
            None => self.entries.push((element, index)),
        }
    }

    pub fn remove(&mut self, element: NodeId) {
        self.entries.retain(|(e, _)| *e != element);
    }

    pub fn contains(&self, element: NodeId) -> bool {
        self.entries.iter().any(|(e, _)| *e == element)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outline indices in insertion order.
    pub fn indices(&self) -> Vec<usize> {
        self.entries.iter().map(|&(_, i)| i).collect()
    }
}

/// Outline state for one page.
#[derive(Debug)]
pub struct OutlineTracker {
    headings: Vec<HeadingNode<NodeId>>,
    entries: Vec<OutlineEntry>,
    root_list: NodeId,
    visible: VisibilitySet,
    active: Option<usize>,
    active_class: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Anchor slug for a heading: lower-cased markup with spaces turned into `-`.
pub fn slugify(markup: &str) -> String {
    markup.to_lowercase().replace(' ', "-")
}

fn resolve(document: &Document, id: &str) -> Result<NodeId, OutlineError> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| OutlineError::MissingElement { id: id.to_owned() })
}

// ---------------------------------------------------------------------------
// OutlineTracker
// ---------------------------------------------------------------------------

impl OutlineTracker {
    /// Build the outline for `article_id` into `outline_id`.
    ///
    /// Headings get ids of the form `{slug}-{index}` and a `data-outline-idx`
    /// attribute; the outline element's children are replaced by the nested
    /// list. Nothing is mutated when either element is missing.
    pub fn build(
        document: &mut Document,
        article_id: &str,
        outline_id: &str,
        active_class: &str,
    ) -> Result<Self, OutlineError> {
        let article = resolve(document, article_id)?;
        let outline = resolve(document, outline_id)?;

        let headings = headers::collect(&*document, article);
        let root_list = document.create_element("ul");
        let mut stack = vec![root_list];
        let mut pending: Option<NodeId> = None;
        let mut current_level = 0u8;
        let mut entries = Vec::with_capacity(headings.len());

        for heading in &headings {
            let label = document.inner_html(heading.element);
            let anchor_id = format!("{}-{}", slugify(&label), heading.index);
            document.set_element_id(heading.element, &anchor_id);
            document.set_dataset(heading.element, "outline-idx", &heading.index.to_string());

            let item = document.create_element("li");
            let link = document.create_element("a");
            document.set_element_id(link, &format!("{ANCHOR_ID_PREFIX}{}", heading.index));
            document.set_attribute(link, "href", &format!("#{anchor_id}"));
            document.clone_children(heading.element, link);
            document.append_child(item, link);

            if heading.level > current_level {
                if let Some(list) = pending {
                    stack.push(list);
                }
                pending = Some(document.create_element("ul"));
            } else if heading.level < current_level {
                for _ in 0..(current_level - heading.level) {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
            }
            // The pending list always hangs off the most recent item; appending
            // it here moves it out of the previous one.
            if let Some(list) = pending {
                document.append_child(item, list);
            }
            let top = *stack.last().unwrap_or(&root_list);
            document.append_child(top, item);
            current_level = heading.level;

            entries.push(OutlineEntry {
                index: heading.index,
                anchor_id,
                label,
                link,
            });
        }

        document.replace_children(outline, &[root_list]);
        log::info!(
            "[outline] article={article_id} outline={outline_id} headings={}",
            headings.len()
        );

        Ok(Self {
            headings,
            entries,
            root_list,
            visible: VisibilitySet::default(),
            active: None,
            active_class: active_class.to_owned(),
        })
    }

    /// Register every heading with `observer`.
    pub fn observe_headings(&self, observer: &mut IntersectionObserver) {
        for heading in &self.headings {
            observer.observe(heading.element);
        }
        log::debug!(
            "[outline] observing={} threshold={}",
            self.headings.len(),
            observer.threshold()
        );
    }

    /// Stop observing this outline's headings.
    pub fn unobserve_headings(&self, observer: &mut IntersectionObserver) {
        for heading in &self.headings {
            observer.unobserve(heading.element);
        }
    }

    pub fn headings(&self) -> &[HeadingNode<NodeId>] {
        &self.headings
    }

    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    /// The root `<ul>` placed in the outline element.
    pub fn root_list(&self) -> NodeId {
        self.root_list
    }

    /// Index of the active heading, if any heading has been seen.
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn active_class(&self) -> &str {
        &self.active_class
    }

    /// Indices of headings currently considered visible, in insertion order.
    pub fn visible_indices(&self) -> Vec<usize> {
        self.visible.indices()
    }

    /// Nesting depth of each entry's item, 0 for items in the root list.
    pub fn depths(&self, document: &Document) -> Vec<usize> {
        self.entries
            .iter()
            .map(|entry| {
                let mut depth = 0;
                let mut node = document.parent(entry.link);
                while let Some(n) = node {
                    if n == self.root_list {
                        break;
                    }
                    if document.tag_name(n) == Some("ul") {
                        depth += 1;
                    }
                    node = document.parent(n);
                }
                depth
            })
            .collect()
    }

    fn index_of(&self, element: NodeId) -> Option<usize> {
        self.headings
            .iter()
            .find(|h| h.element == element)
            .map(|h| h.index)
    }

    fn top(&self, geometry: &dyn Geometry, index: usize) -> f64 {
        geometry.bounding_rect(self.headings[index].element).top
    }

    /// Apply a batch of visibility changes, then re-pick the active entry.
    pub fn on_visibility_batch(&mut self, document: &mut Document, batch: &VisibilityBatch<'_>) {
        for entry in batch.entries {
            let Some(index) = self.index_of(entry.target) else {
                continue;
            };
            if entry.is_intersecting {
                self.visible.insert(entry.target, index);
                continue;
            }

            // Scrolling up past the last visible heading: keep its predecessor
            // visible so the outline is never left without an active entry.
            if let Some(active) = self.active {
                if self.visible.len() == 1 && active != 0 && self.top(batch.geometry, active) > 0.0 {
                    let previous = self.headings[active - 1];
                    self.visible.insert(previous.element, previous.index);
                }
            }
            self.visible.remove(entry.target);
        }

        for candidate in self.visible.indices() {
            let Some(active) = self.active else {
                self.active = Some(candidate);
                document.add_class(self.entries[candidate].link, &self.active_class);
                continue;
            };

            let active_top = self.top(batch.geometry, active);
            let should_update = !self.visible.contains(self.headings[active].element)
                || self.top(batch.geometry, candidate) < active_top
                || active_top < 0.0;
            if should_update {
                document.remove_class(self.entries[active].link, &self.active_class);
                self.active = Some(candidate);
                document.add_class(self.entries[candidate].link, &self.active_class);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{BoundingRect, IntersectionEntry};
    use std::collections::HashMap;

    struct Tops(HashMap<NodeId, f64>);

    impl Geometry for Tops {
        fn bounding_rect(&self, element: NodeId) -> BoundingRect {
            BoundingRect {
                top: self.0.get(&element).copied().unwrap_or(0.0),
                height: 20.0,
            }
        }

        fn viewport_height(&self) -> f64 {
            600.0
        }
    }

    /// Document with `<article id="article">` and `<nav id="outline">`.
    fn page(headings: &[(&str, &str)]) -> (Document, Vec<NodeId>) {
        let mut doc = Document::new();
        let root = doc.document_element();
        let body = doc.create_element("body");
        doc.append_child(root, body);
        let nav = doc.create_element("nav");
        doc.set_element_id(nav, "outline");
        doc.append_child(body, nav);
        let article = doc.create_element("article");
        doc.set_element_id(article, "article");
        doc.append_child(body, article);

        let mut ids = Vec::new();
        for (tag, text) in headings {
            let h = doc.create_element(tag);
            let t = doc.create_text(text);
            doc.append_child(h, t);
            doc.append_child(article, h);
            ids.push(h);
        }
        (doc, ids)
    }

    fn build(doc: &mut Document) -> OutlineTracker {
        OutlineTracker::build(doc, "article", "outline", DEFAULT_ACTIVE_CLASS)
            .expect("outline builds")
    }

    /// Render the outline list as `A[B],C` for compact structural asserts.
    fn shape(doc: &Document, list: NodeId) -> String {
        let mut parts = Vec::new();
        for &item in doc.children(list) {
            let mut label = String::new();
            let mut nested = String::new();
            for &child in doc.children(item) {
                match doc.tag_name(child) {
                    Some("a") => label = doc.text_content(child),
                    Some("ul") if !doc.children(child).is_empty() => {
                        nested = format!("[{}]", shape(doc, child));
                    }
                    _ => {}
                }
            }
            parts.push(format!("{label}{nested}"));
        }
        parts.join(",")
    }

    fn entry(target: NodeId, is_intersecting: bool) -> IntersectionEntry {
        IntersectionEntry {
            target,
            is_intersecting,
            intersection_ratio: if is_intersecting { 1.0 } else { 0.0 },
        }
    }

    fn highlighted(doc: &Document, tracker: &OutlineTracker) -> Vec<usize> {
        tracker
            .entries()
            .iter()
            .filter(|e| doc.has_class(e.link, DEFAULT_ACTIVE_CLASS))
            .map(|e| e.index)
            .collect()
    }

    #[test]
    fn sibling_then_nested_then_sibling() {
        let (mut doc, _) = page(&[("h2", "A"), ("h3", "B"), ("h2", "C")]);
        let tracker = build(&mut doc);
        assert_eq!(shape(&doc, tracker.root_list()), "A[B],C");
        assert_eq!(tracker.depths(&doc), vec![0, 1, 0]);
    }

    #[test]
    fn deeper_runs_nest_one_level_per_step() {
        let (mut doc, _) = page(&[
            ("h2", "A"),
            ("h3", "B"),
            ("h4", "C"),
            ("h3", "D"),
            ("h2", "E"),
        ]);
        let tracker = build(&mut doc);
        assert_eq!(shape(&doc, tracker.root_list()), "A[B[C],D],E");
    }

    #[test]
    fn skipped_level_nests_once() {
        let (mut doc, _) = page(&[("h2", "A"), ("h4", "B"), ("h3", "C")]);
        let tracker = build(&mut doc);
        // h4 nests one level under A; returning to h3 pops one list.
        assert_eq!(shape(&doc, tracker.root_list()), "A[B],C");
    }

    #[test]
    fn dropping_below_the_first_level_never_pops_the_root() {
        let (mut doc, _) = page(&[("h3", "A"), ("h4", "B"), ("h2", "C")]);
        let tracker = build(&mut doc);
        assert_eq!(shape(&doc, tracker.root_list()), "A[B],C");
    }

    #[test]
    fn ids_and_hrefs_are_index_suffixed() {
        let (mut doc, hs) = page(&[("h2", "Getting Started"), ("h2", "Getting Started")]);
        let tracker = build(&mut doc);
        assert_eq!(doc.element_id(hs[0]), Some("getting-started-0"));
        assert_eq!(doc.element_id(hs[1]), Some("getting-started-1"));
        assert_eq!(doc.dataset(hs[1], "outline-idx"), Some("1"));

        let links: Vec<_> = tracker.entries().iter().map(|e| e.link).collect();
        assert_eq!(doc.attribute(links[1], "href"), Some("#getting-started-1"));
        assert_eq!(doc.element_id(links[1]), Some("outline-item1"));
        assert_eq!(doc.inner_html(links[0]), "Getting Started");
    }

    #[test]
    fn anchor_count_matches_heading_count() {
        let (mut doc, _) = page(&[("h2", "A"), ("h5", "B"), ("h3", "C"), ("h6", "D")]);
        let tracker = build(&mut doc);
        let outline = doc.get_element_by_id("outline").expect("outline");
        assert_eq!(doc.get_elements_by_tag_name(outline, "a").len(), 4);
        assert_eq!(tracker.entries().len(), tracker.headings().len());
    }

    #[test]
    fn missing_outline_leaves_document_untouched() {
        let (mut doc, hs) = page(&[("h2", "A")]);
        let err = OutlineTracker::build(&mut doc, "article", "toc", DEFAULT_ACTIVE_CLASS)
            .expect_err("outline id does not exist");
        assert_eq!(err, OutlineError::MissingElement { id: "toc".into() });
        assert!(err.to_string().contains("toc"));
        assert_eq!(doc.element_id(hs[0]), None);
    }

    #[test]
    fn missing_article_is_reported_first() {
        let (mut doc, _) = page(&[]);
        let err = OutlineTracker::build(&mut doc, "nope", "also-nope", DEFAULT_ACTIVE_CLASS)
            .expect_err("article id does not exist");
        assert!(err.to_string().contains("nope"));
        assert!(!err.to_string().contains("also-nope"));
    }

    #[test]
    fn first_visible_heading_becomes_active() {
        let (mut doc, hs) = page(&[("h2", "A"), ("h2", "B")]);
        let mut tracker = build(&mut doc);
        assert!(highlighted(&doc, &tracker).is_empty());

        let geometry = Tops(HashMap::from([(hs[0], 10.0), (hs[1], 300.0)]));
        let entries = [entry(hs[0], true), entry(hs[1], true)];
        tracker.on_visibility_batch(
            &mut doc,
            &VisibilityBatch { entries: &entries, geometry: &geometry },
        );
        assert_eq!(tracker.active(), Some(0));
        assert_eq!(highlighted(&doc, &tracker), vec![0]);
    }

    #[test]
    fn upper_candidate_replaces_active() {
        let (mut doc, hs) = page(&[("h2", "A"), ("h2", "B")]);
        let mut tracker = build(&mut doc);

        // B appears first, then A scrolls in above it.
        let geometry = Tops(HashMap::from([(hs[0], -40.0), (hs[1], 100.0)]));
        let entries = [entry(hs[1], true)];
        tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });
        assert_eq!(tracker.active(), Some(1));

        let geometry = Tops(HashMap::from([(hs[0], 5.0), (hs[1], 200.0)]));
        let entries = [entry(hs[0], true)];
        tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });
        assert_eq!(tracker.active(), Some(0));
        assert_eq!(highlighted(&doc, &tracker), vec![0]);
    }

    #[test]
    fn active_leaving_through_the_top_hands_over() {
        let (mut doc, hs) = page(&[("h2", "A"), ("h2", "B"), ("h2", "C")]);
        let mut tracker = build(&mut doc);
        let geometry = Tops(HashMap::from([(hs[0], 10.0), (hs[1], 200.0), (hs[2], 900.0)]));
        let entries = [entry(hs[0], true), entry(hs[1], true)];
        tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });
        assert_eq!(tracker.active(), Some(0));

        let geometry = Tops(HashMap::from([(hs[0], -30.0), (hs[1], 150.0), (hs[2], 500.0)]));
        let entries = [entry(hs[0], false), entry(hs[2], true)];
        tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });
        assert_eq!(tracker.active(), Some(1));
        assert_eq!(highlighted(&doc, &tracker), vec![1]);
    }

    #[test]
    fn upward_scroll_marks_predecessor_visible() {
        let (mut doc, hs) = page(&[("h2", "A"), ("h2", "B"), ("h2", "C")]);
        let mut tracker = build(&mut doc);

        let geometry = Tops(HashMap::from([(hs[0], -10.0), (hs[1], 50.0), (hs[2], 300.0)]));
        let entries = [entry(hs[0], true), entry(hs[1], true), entry(hs[2], true)];
        tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });
        // A sits above the viewport top, so B takes over within the same batch.
        assert_eq!(tracker.active(), Some(1));
        assert_eq!(tracker.visible_indices(), vec![0, 1, 2]);
        assert_eq!(highlighted(&doc, &tracker), vec![1]);

        // Everything drops out at once while B is still below the viewport top.
        let geometry = Tops(HashMap::from([(hs[0], 700.0), (hs[1], 800.0), (hs[2], 900.0)]));
        let entries = [entry(hs[0], false), entry(hs[1], false), entry(hs[2], false)];
        tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });

        assert_eq!(tracker.visible_indices(), vec![0]);
        assert_eq!(tracker.active(), Some(0));
        assert_eq!(highlighted(&doc, &tracker), vec![0]);
    }

    #[test]
    fn no_correction_for_the_first_heading() {
        let (mut doc, hs) = page(&[("h2", "A"), ("h2", "B")]);
        let mut tracker = build(&mut doc);
        let geometry = Tops(HashMap::from([(hs[0], 10.0), (hs[1], 900.0)]));
        let entries = [entry(hs[0], true)];
        tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });

        let geometry = Tops(HashMap::from([(hs[0], 700.0), (hs[1], 900.0)]));
        let entries = [entry(hs[0], false)];
        tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });
        assert!(tracker.visible_indices().is_empty());
        // The last active entry stays highlighted.
        assert_eq!(highlighted(&doc, &tracker), vec![0]);
    }

    #[test]
    fn unknown_targets_are_ignored() {
        let (mut doc, _) = page(&[("h2", "A")]);
        let mut tracker = build(&mut doc);
        let stray = doc.create_element("p");
        let geometry = Tops(HashMap::new());
        let entries = [entry(stray, true)];
        tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });
        assert_eq!(tracker.active(), None);
    }

    #[test]
    fn at_most_one_anchor_is_highlighted_across_batches() {
        let (mut doc, hs) = page(&[("h2", "A"), ("h3", "B"), ("h3", "C"), ("h2", "D")]);
        let mut tracker = build(&mut doc);

        // Deterministic walk through assorted batches and layouts.
        let mut seed = 7u64;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            seed >> 33
        };
        for _ in 0..200 {
            let tops: HashMap<NodeId, f64> = hs
                .iter()
                .map(|&h| (h, (next() % 1600) as f64 - 400.0))
                .collect();
            let mut entries = Vec::new();
            for &h in &hs {
                if next() % 2 == 0 {
                    entries.push(entry(h, next() % 2 == 0));
                }
            }
            let geometry = Tops(tops);
            tracker.on_visibility_batch(&mut doc, &VisibilityBatch { entries: &entries, geometry: &geometry });
            assert!(highlighted(&doc, &tracker).len() <= 1);
            if let Some(active) = tracker.active() {
                assert_eq!(highlighted(&doc, &tracker), vec![active]);
            }
        }
    }

    #[test]
    fn rebuild_keeps_hrefs_resolvable() {
        let (mut doc, _) = page(&[("h2", "A"), ("h3", "B")]);
        build(&mut doc);
        let tracker = build(&mut doc);
        for e in tracker.entries() {
            assert!(doc.get_element_by_id(&e.anchor_id).is_some());
        }
    }
}
