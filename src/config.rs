//! Runtime configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "outline_id": "toc", "dark_theme": "Solarized (dark)" }
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::highlight::ThemePair;
use crate::outline::DEFAULT_ACTIVE_CLASS;

/// Environment variable overriding the preference file location.
pub const PREFS_ENV: &str = "SITEOUTLINE_PREFS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Id of the element whose headings are outlined.
    pub article_id: String,
    /// Id of the element that receives the outline list.
    pub outline_id: String,
    /// Class marking the active outline anchor.
    pub active_class: String,
    /// syntect theme for light mode.
    pub light_theme: String,
    /// syntect theme for dark mode.
    pub dark_theme: String,
    /// Visible fraction at which a heading counts as in view.
    pub threshold: f64,
    /// Preference file; see [`Config::preferences_path`] for the fallback.
    pub preferences: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let pair = ThemePair::default();
        Self {
            article_id: "article".to_owned(),
            outline_id: "outline".to_owned(),
            active_class: DEFAULT_ACTIVE_CLASS.to_owned(),
            light_theme: pair.light,
            dark_theme: pair.dark,
            threshold: 1.0,
            preferences: None,
        }
    }
}

impl Config {
    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn theme_pair(&self) -> ThemePair {
        ThemePair {
            light: self.light_theme.clone(),
            dark: self.dark_theme.clone(),
        }
    }

    /// Where theme preferences are stored.
    ///
    /// Order: the configured path, `$SITEOUTLINE_PREFS`, then
    /// `preferences.json` in the platform config directory. `None` when no
    /// home directory can be found.
    pub fn preferences_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.preferences {
            return Some(path.clone());
        }
        if let Some(path) = env::var_os(PREFS_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(path));
        }
        default_preferences_path()
    }
}

/// `preferences.json` under the platform config directory for `siteoutline`
/// (`$XDG_CONFIG_HOME/siteoutline` on Linux).
pub fn default_preferences_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "siteoutline").map(|dirs| dirs.config_dir().join("preferences.json"))
}
