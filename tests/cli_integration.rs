use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const GUIDE: &str = "# Guide\n\nIntro.\n\n## Install\n\n### Linux\n\n```rust\nfn main() {}\n```\n\n## Usage\n\nRun it.\n";

struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    entry: PathBuf,
    prefs: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create tempdir");
        let root = tmp.path().to_path_buf();
        let entry = root.join("guide.md");
        fs::write(&entry, GUIDE).expect("write guide");
        let prefs = root.join("prefs").join("preferences.json");
        Self {
            _tmp: tmp,
            root,
            entry,
            prefs,
        }
    }

    /// Run the binary with an isolated preference file and no terminal hints.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_siteoutline"))
            .args(args)
            .arg("--prefs")
            .arg(&self.prefs)
            .env_remove("SITEOUTLINE_PREFS")
            .env_remove("COLORFGBG")
            .env_remove("RUST_LOG")
            .output()
            .expect("run siteoutline")
    }

    fn entry(&self) -> &str {
        self.entry.to_str().expect("utf-8 path")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stored_prefs(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path).expect("read prefs");
    serde_json::from_str(&text).expect("prefs are json")
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

#[test]
fn render_prints_page_with_outline() {
    let fx = Fixture::new();
    let out = fx.run(&["render", fx.entry(), "--theme", "light"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let html = stdout(&out);

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Guide</title>"));
    assert!(html.contains("data-site-theme=\"light\""));
    for (index, id) in ["install-0", "linux-1", "usage-2"].iter().enumerate() {
        assert!(html.contains(&format!("id=\"{id}\"")), "heading id {id}");
        assert!(html.contains(&format!("href=\"#{id}\"")), "anchor for {id}");
        assert!(html.contains(&format!("id=\"outline-item{index}\"")));
    }
    assert!(html.contains("highlight--dark"));
    assert!(html.contains("codeblock highlighted"));
}

#[test]
fn render_theme_flag_is_not_stored() {
    let fx = Fixture::new();
    let out = fx.run(&["render", fx.entry(), "--theme", "light"]);
    assert!(out.status.success());
    assert!(!fx.prefs.exists());
}

#[test]
fn render_uses_stored_theme() {
    let fx = Fixture::new();
    assert!(fx.run(&["theme", "light"]).status.success());
    let out = fx.run(&["render", fx.entry()]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("data-site-theme=\"light\""));
}

#[test]
fn render_writes_output_file() {
    let fx = Fixture::new();
    let target = fx.root.join("guide.html");
    let out = fx.run(&["render", fx.entry(), "-o", target.to_str().expect("utf-8")]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).is_empty());
    let html = fs::read_to_string(&target).expect("read output");
    assert!(html.contains("<nav id=\"outline\" class=\"outline\">"));
}

// ---------------------------------------------------------------------------
// outline
// ---------------------------------------------------------------------------

#[test]
fn outline_prints_nested_tree() {
    let fx = Fixture::new();
    let out = fx.run(&["outline", fx.entry()]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(
        stdout(&out),
        "- Install (#install-0)\n  - Linux (#linux-1)\n- Usage (#usage-2)\n"
    );
}

#[test]
fn outline_of_page_without_headings_is_empty() {
    let fx = Fixture::new();
    let plain = fx.root.join("plain.md");
    fs::write(&plain, "# Only a title\n\nText.\n").expect("write plain");
    let out = fx.run(&["outline", plain.to_str().expect("utf-8")]);
    assert!(out.status.success());
    assert!(stdout(&out).is_empty());
}

// ---------------------------------------------------------------------------
// theme
// ---------------------------------------------------------------------------

#[test]
fn theme_set_show_and_clear() {
    let fx = Fixture::new();

    let out = fx.run(&["theme"]);
    assert_eq!(stdout(&out).trim(), "system");

    let out = fx.run(&["theme", "dark"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out).trim(), "dark");
    assert_eq!(stored_prefs(&fx.prefs)["colorscheme"], "dark");

    let out = fx.run(&["theme", "show"]);
    assert_eq!(stdout(&out).trim(), "dark");

    let out = fx.run(&["theme", "clear"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "system");
    assert!(stored_prefs(&fx.prefs).get("colorscheme").is_none());
}

#[test]
fn theme_toggle_alternates() {
    let fx = Fixture::new();
    // No stored theme and no system hint: the page starts dark.
    let out = fx.run(&["theme", "toggle"]);
    assert_eq!(stdout(&out).trim(), "light");
    let out = fx.run(&["theme", "toggle"]);
    assert_eq!(stdout(&out).trim(), "dark");
}

#[test]
fn invalid_stored_theme_is_ignored() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.prefs.parent().expect("parent")).expect("mkdir");
    fs::write(&fx.prefs, r#"{ "colorscheme": "sepia" }"#).expect("write prefs");
    let out = fx.run(&["theme", "show"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).trim(), "system");
    assert!(stderr(&out).contains("sepia"));
}

// ---------------------------------------------------------------------------
// errors
// ---------------------------------------------------------------------------

#[test]
fn missing_file_exits_with_error() {
    let fx = Fixture::new();
    let missing = fx.root.join("missing.md");
    let out = fx.run(&["outline", missing.to_str().expect("utf-8")]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Error: file not found"));
}

#[test]
fn non_markdown_extension_is_rejected() {
    let fx = Fixture::new();
    let txt = fx.root.join("notes.txt");
    fs::write(&txt, "## Heading\n").expect("write txt");
    let out = fx.run(&["render", txt.to_str().expect("utf-8")]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("not a recognized markdown extension"));
}

#[test]
fn bad_config_exits_with_error() {
    let fx = Fixture::new();
    let config = fx.root.join("config.json");
    fs::write(&config, r#"{ "outline": 3 }"#).expect("write config");
    let out = fx.run(&["outline", fx.entry(), "--config", config.to_str().expect("utf-8")]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Error: invalid config"));
}

#[test]
fn config_changes_outline_element_ids() {
    let fx = Fixture::new();
    let config = fx.root.join("config.json");
    fs::write(&config, r#"{ "outline_id": "toc", "active_class": "is-current" }"#)
        .expect("write config");
    let out = fx.run(&[
        "render",
        fx.entry(),
        "--theme",
        "dark",
        "--config",
        config.to_str().expect("utf-8"),
    ]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let html = stdout(&out);
    assert!(html.contains("<nav id=\"toc\" class=\"outline\">"));
    assert!(html.contains("nav.outline a.is-current"));
}
