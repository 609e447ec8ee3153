//! Light/dark theme selection.
//!
//! The chosen theme lives on the document element as `data-site-theme` and is
//! persisted under the `colorscheme` key of a [`PreferenceStore`]. With no
//! stored choice the system preference wins.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::dom::Document;
use crate::events::{SubscriptionId, Subscribers};

/// Attribute on the document element carrying the active theme.
pub const THEME_ATTRIBUTE: &str = "data-site-theme";

/// Preference-store key holding the last chosen theme.
pub const PREFERENCE_KEY: &str = "colorscheme";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Theme matching a "prefers dark" signal.
    pub fn from_prefers_dark(prefers_dark: bool) -> Self {
        if prefers_dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown theme `{0}` (expected `light` or `dark`)")]
pub struct ParseThemeError(String);

impl FromStr for Theme {
    type Err = ParseThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(ParseThemeError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Preference stores
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access preferences at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed preferences file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// String key-value storage that outlives a page.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

impl<T: PreferenceStore + ?Sized> PreferenceStore for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Store that forgets everything when dropped.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object on disk, rewritten on every change.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(&self.values).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, text + "\n").map_err(io_err)
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value.to_owned());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// System preference
// ---------------------------------------------------------------------------

/// The host's "prefers dark colour scheme" signal.
///
/// `None` means the host cannot report a preference.
pub struct SystemThemeSignal {
    prefers_dark: Option<bool>,
    handlers: Subscribers<dyn FnMut(bool)>,
}

impl SystemThemeSignal {
    pub fn new(prefers_dark: Option<bool>) -> Self {
        Self {
            prefers_dark,
            handlers: Subscribers::new(),
        }
    }

    pub fn prefers_dark(&self) -> Option<bool> {
        self.prefers_dark
    }

    pub fn on_system_theme_changed<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(bool) + 'static,
    {
        self.handlers.subscribe(Box::new(handler))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.handlers.unsubscribe(id)
    }

    /// Record a new preference, notifying subscribers when it changed.
    pub fn set_prefers_dark(&mut self, prefers_dark: bool) {
        if self.prefers_dark == Some(prefers_dark) {
            return;
        }
        self.prefers_dark = Some(prefers_dark);
        log::info!("[theme] system prefers_dark={prefers_dark}");
        for handler in self.handlers.handlers_mut() {
            handler(prefers_dark);
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Applies and persists the page theme.
pub struct ThemeController<S> {
    store: S,
    current: Option<Theme>,
}

impl<S: PreferenceStore> ThemeController<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            current: None,
        }
    }

    pub fn current(&self) -> Option<Theme> {
        self.current
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The stored theme, if one is present and valid.
    pub fn stored(&self) -> Option<Theme> {
        let raw = self.store.get(PREFERENCE_KEY)?;
        match raw.parse() {
            Ok(theme) => Some(theme),
            Err(e) => {
                log::warn!("[theme] ignoring stored preference: {e}");
                None
            }
        }
    }

    /// Switch to `theme`, or toggle when `None` (no theme yet → dark).
    ///
    /// The result is persisted; a store failure is logged and the theme is
    /// still applied to the document.
    pub fn apply(&mut self, document: &mut Document, theme: Option<Theme>) -> Theme {
        let next = theme.unwrap_or_else(|| self.current.map_or(Theme::Dark, Theme::toggled));
        if let Err(e) = self.store.set(PREFERENCE_KEY, next.as_str()) {
            log::warn!("[theme] could not persist theme={next}: {e}");
        }
        self.show(document, next);
        next
    }

    /// Page-load selection: stored choice, else system preference, else the
    /// toggle default. A theme taken from the system is not persisted.
    pub fn restore(&mut self, document: &mut Document, prefers_dark: Option<bool>) -> Theme {
        if let Some(theme) = self.stored() {
            return self.apply(document, Some(theme));
        }
        match prefers_dark {
            Some(dark) => {
                let theme = Theme::from_prefers_dark(dark);
                self.show(document, theme);
                theme
            }
            None => self.apply(document, None),
        }
    }

    /// React to a system preference change, ignoring the stored choice.
    pub fn follow_system(&mut self, document: &mut Document, prefers_dark: bool) -> Theme {
        self.apply(document, Some(Theme::from_prefers_dark(prefers_dark)))
    }

    /// Forget the stored choice.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.remove(PREFERENCE_KEY)
    }

    fn show(&mut self, document: &mut Document, theme: Theme) {
        let root = document.document_element();
        document.set_attribute(root, THEME_ATTRIBUTE, theme.as_str());
        self.current = Some(theme);
        log::debug!("[theme] applied theme={theme}");
    }
}
