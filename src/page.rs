//! Per-page controller.
//!
//! A [`Page`] owns everything one loaded article needs: the document, the
//! outline tracker, the theme controller and the host's observation hooks.
//! Hosts drive it with layout and preference changes; the page wires those
//! events to the tracker and theme controller through subscriptions.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::config::Config;
use crate::dom::Document;
use crate::events::SubscriptionId;
use crate::highlight::{HighlightReport, Highlighter};
use crate::observer::{Geometry, IntersectionObserver};
use crate::outline::OutlineTracker;
use crate::parse::{self, ParsedPage};
use crate::theme::{PreferenceStore, SystemThemeSignal, Theme, ThemeController};

pub struct Page<S> {
    config: Config,
    title: Option<String>,
    document: Rc<RefCell<Document>>,
    tracker: Rc<RefCell<Option<OutlineTracker>>>,
    theme: Rc<RefCell<ThemeController<S>>>,
    observer: IntersectionObserver,
    system_theme: SystemThemeSignal,
    visibility_subscription: Option<SubscriptionId>,
    system_subscription: Option<SubscriptionId>,
}

impl<S: PreferenceStore + 'static> Page<S> {
    /// Load a markdown article. Nothing runs until [`load`](Self::load).
    pub fn from_markdown(
        source: &str,
        config: Config,
        store: S,
        prefers_dark: Option<bool>,
    ) -> Self {
        let ParsedPage { document, title, .. } =
            parse::parse_page(source, &config.article_id, &config.outline_id);
        Self::from_document(document, title, config, store, prefers_dark)
    }

    /// Wrap an existing document.
    pub fn from_document(
        document: Document,
        title: Option<String>,
        config: Config,
        store: S,
        prefers_dark: Option<bool>,
    ) -> Self {
        let observer = IntersectionObserver::new(config.threshold);
        Self {
            config,
            title,
            document: Rc::new(RefCell::new(document)),
            tracker: Rc::new(RefCell::new(None)),
            theme: Rc::new(RefCell::new(ThemeController::new(store))),
            observer,
            system_theme: SystemThemeSignal::new(prefers_dark),
            visibility_subscription: None,
            system_subscription: None,
        }
    }

    /// Page-load sequence: restore the theme and follow system changes,
    /// highlight code blocks when a highlighter is given, then build the
    /// outline.
    pub fn load(&mut self, highlighter: Option<&Highlighter>) -> Option<HighlightReport> {
        self.restore_theme();
        let report = highlighter.map(|hl| hl.highlight_document(&mut self.document.borrow_mut()));
        self.make_outline();
        report
    }

    fn restore_theme(&mut self) {
        let prefers_dark = self.system_theme.prefers_dark();
        self.theme
            .borrow_mut()
            .restore(&mut self.document.borrow_mut(), prefers_dark);

        if let Some(id) = self.system_subscription.take() {
            self.system_theme.unsubscribe(id);
        }
        let document = Rc::clone(&self.document);
        let theme = Rc::clone(&self.theme);
        self.system_subscription = Some(self.system_theme.on_system_theme_changed(move |dark| {
            theme
                .borrow_mut()
                .follow_system(&mut document.borrow_mut(), dark);
        }));
    }

    /// Build the outline and start tracking its headings.
    ///
    /// A missing article or outline element is logged and leaves the page
    /// untouched; returns whether the outline was built.
    pub fn make_outline(&mut self) -> bool {
        let built = OutlineTracker::build(
            &mut self.document.borrow_mut(),
            &self.config.article_id,
            &self.config.outline_id,
            &self.config.active_class,
        );
        let tracker = match built {
            Ok(tracker) => tracker,
            Err(e) => {
                log::warn!("[outline] {e}");
                return false;
            }
        };

        if let Some(previous) = self.tracker.borrow().as_ref() {
            previous.unobserve_headings(&mut self.observer);
        }
        tracker.observe_headings(&mut self.observer);
        *self.tracker.borrow_mut() = Some(tracker);

        if let Some(id) = self.visibility_subscription.take() {
            self.observer.unsubscribe(id);
        }
        let document = Rc::clone(&self.document);
        let tracker = Rc::clone(&self.tracker);
        self.visibility_subscription = Some(self.observer.on_visibility_batch_changed(move |batch| {
            if let Some(tracker) = tracker.borrow_mut().as_mut() {
                tracker.on_visibility_batch(&mut document.borrow_mut(), batch);
            }
        }));
        true
    }

    /// Tell the page its layout may have changed (scroll, resize).
    /// Returns the number of visibility changes delivered.
    pub fn layout_changed(&mut self, geometry: &dyn Geometry) -> usize {
        self.observer.check(geometry)
    }

    /// The observer, for hosts and tests that inject batches directly.
    pub fn observer_mut(&mut self) -> &mut IntersectionObserver {
        &mut self.observer
    }

    /// The host reports a new system colour-scheme preference.
    pub fn system_theme_changed(&mut self, prefers_dark: bool) {
        self.system_theme.set_prefers_dark(prefers_dark);
    }

    /// The theme toggle control was activated.
    pub fn toggle_theme(&mut self) -> Theme {
        self.theme
            .borrow_mut()
            .apply(&mut self.document.borrow_mut(), None)
    }

    /// Switch to an explicit theme and persist it.
    pub fn set_theme(&mut self, theme: Theme) -> Theme {
        self.theme
            .borrow_mut()
            .apply(&mut self.document.borrow_mut(), Some(theme))
    }

    pub fn theme(&self) -> Option<Theme> {
        self.theme.borrow().current()
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    /// The outline tracker, once built.
    pub fn outline(&self) -> Option<Ref<'_, OutlineTracker>> {
        Ref::filter_map(self.tracker.borrow(), Option::as_ref).ok()
    }

    pub fn active_entry(&self) -> Option<usize> {
        self.tracker.borrow().as_ref().and_then(OutlineTracker::active)
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
