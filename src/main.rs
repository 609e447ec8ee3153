use std::{
    env, fs, io,
    path::{Path, PathBuf},
    process,
};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    DefaultTerminal, Frame,
};

use siteoutline::{
    config::Config,
    dom::Document,
    highlight::Highlighter,
    html,
    page::Page,
    render::{self, RenderedPage, ViewportGeometry},
    theme::{
        FileStore, MemoryStore, PreferenceStore, Theme, ThemeController, PREFERENCE_KEY,
    },
};

/// Width of the outline sidebar in the viewer.
const SIDEBAR_WIDTH: u16 = 32;

/// Theme names accepted on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

/// Actions of the `theme` subcommand.
#[derive(Clone, Copy, Default, ValueEnum)]
enum ThemeAction {
    /// Print the stored theme
    #[default]
    Show,
    /// Store the light theme
    Light,
    /// Store the dark theme
    Dark,
    /// Switch the effective theme and store the result
    Toggle,
    /// Forget the stored theme and follow the system again
    Clear,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a markdown file as a standalone HTML page
    Render {
        /// Path to the markdown file
        file: String,
        /// Write the page here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Force a theme for this page without storing it
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
    },
    /// Print the heading outline of a markdown file
    Outline {
        /// Path to the markdown file
        file: String,
    },
    /// View a markdown file in the terminal with a live outline
    View {
        /// Path to the markdown file
        file: String,
    },
    /// Show or change the stored colour theme
    Theme {
        #[arg(value_enum, default_value_t)]
        action: ThemeAction,
    },
}

#[derive(Parser)]
#[command(
    name = "siteoutline",
    version,
    about = "Markdown pages with a scroll-synchronized outline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Theme preference file
    #[arg(long, global = true)]
    prefs: Option<PathBuf>,

    /// Write logs here (the viewer logs nowhere otherwise)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut config = match &cli.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| fail(&e.to_string())),
        None => Config::default(),
    };
    if let Some(prefs) = &cli.prefs {
        config.preferences = Some(prefs.clone());
    }

    match cli.command {
        Commands::Render {
            file,
            output,
            theme,
        } => {
            log::info!("[render] file={file}");
            let source = read_markdown(&file);
            let html = match theme {
                Some(theme) => {
                    let mut store = MemoryStore::new();
                    store
                        .set(PREFERENCE_KEY, Theme::from(theme).as_str())
                        .unwrap_or_else(|e| fail(&e.to_string()));
                    render_html(&file, &source, config, store)
                }
                None => {
                    let store = open_store(&config);
                    render_html(&file, &source, config, store)
                }
            };
            match output {
                Some(path) => fs::write(&path, html).unwrap_or_else(|e| {
                    fail(&format!("cannot write '{}': {e}", path.display()))
                }),
                None => print!("{html}"),
            }
            Ok(())
        }
        Commands::Outline { file } => {
            let source = read_markdown(&file);
            print!("{}", outline_tree(&source, config));
            Ok(())
        }
        Commands::View { file } => {
            log::info!("[view] file={file}");
            let source = read_markdown(&file);
            let store = open_store(&config);
            let highlighter = Highlighter::new(config.theme_pair());
            let mut page = Page::from_markdown(&source, config, store, system_prefers_dark());
            page.load(None);
            ratatui::run(|terminal| run(terminal, &mut page, &highlighter))
        }
        Commands::Theme { action } => {
            run_theme(action, &config);
            Ok(())
        }
    }
}

/// `env_logger` at warn by default; `-v` raises it, `RUST_LOG` overrides.
/// The viewer owns the terminal, so it only logs to `--log-file`.
fn init_logging(cli: &Cli) {
    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();

    match &cli.log_file {
        Some(path) => match fs::File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Error: cannot open log file '{}': {e}", path.display());
                process::exit(1);
            }
        },
        None if matches!(cli.command, Commands::View { .. }) => {
            builder.filter_level(log::LevelFilter::Off);
        }
        None => {}
    }
    builder.init();
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn read_markdown(file_arg: &str) -> String {
    let path = Path::new(file_arg);

    // Check the file extension before attempting to read.
    match path.extension().and_then(|e| e.to_str()) {
        Some("md" | "markdown" | "mdx" | "mdown" | "mkd" | "mkdn") => {}
        Some(ext) => {
            eprintln!("Error: '{ext}' is not a recognized markdown extension.");
            eprintln!("Expected a markdown file (.md, .markdown, .mdx, .mdown, .mkd, .mkdn).");
            process::exit(1);
        }
        None => {
            eprintln!("Error: '{file_arg}' has no file extension.");
            eprintln!("Expected a markdown file (.md, .markdown, .mdx, .mdown, .mkd, .mkdn).");
            process::exit(1);
        }
    }

    fs::read_to_string(path).unwrap_or_else(|e| {
        match e.kind() {
            io::ErrorKind::NotFound => {
                eprintln!("Error: file not found: {file_arg}");
            }
            io::ErrorKind::PermissionDenied => {
                eprintln!("Error: permission denied: {file_arg}");
            }
            _ => {
                eprintln!("Error reading '{file_arg}': {e}");
            }
        }
        process::exit(1);
    })
}

/// The preference file store, or a throwaway store when no location is known.
fn open_store(config: &Config) -> Box<dyn PreferenceStore> {
    match config.preferences_path() {
        Some(path) => match FileStore::open(&path) {
            Ok(store) => {
                log::debug!("[theme] prefs={}", path.display());
                Box::new(store)
            }
            Err(e) => fail(&e.to_string()),
        },
        None => {
            log::warn!("[theme] no preference location; choices will not be kept");
            Box::new(MemoryStore::new())
        }
    }
}

/// Terminal background hint from `COLORFGBG` (`fg;bg`, dark when bg < 7 or 8).
fn system_prefers_dark() -> Option<bool> {
    let value = env::var("COLORFGBG").ok()?;
    let bg: u8 = value.rsplit(';').next()?.trim().parse().ok()?;
    Some(bg < 7 || bg == 8)
}

fn render_html<S: PreferenceStore + 'static>(
    file: &str,
    source: &str,
    config: Config,
    store: S,
) -> String {
    let highlighter = Highlighter::new(config.theme_pair());
    let mut page = Page::from_markdown(source, config, store, system_prefers_dark());
    if let Some(report) = page.load(Some(&highlighter)) {
        if report.failed > 0 {
            log::warn!("[render] code_blocks_failed={}", report.failed);
        }
    }
    let fallback = Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file);
    let title = html::page_title(page.title(), fallback);
    let doc = page.document();
    let html = html::page_shell(&doc, &title, &page.config().active_class);
    html
}

/// Indented outline, one entry per line: `- Label (#anchor)`.
fn outline_tree(source: &str, config: Config) -> String {
    let mut page = Page::from_markdown(source, config, MemoryStore::new(), None);
    if !page.make_outline() {
        fail("the page has no outline");
    }
    let doc = page.document();
    let Some(outline) = page.outline() else {
        return String::new();
    };
    let depths = outline.depths(&doc);
    let mut out = String::new();
    for (entry, depth) in outline.entries().iter().zip(depths) {
        out.push_str(&format!(
            "{}- {} (#{})\n",
            "  ".repeat(depth),
            doc.text_content(entry.link),
            entry.anchor_id
        ));
    }
    out
}

fn run_theme(action: ThemeAction, config: &Config) {
    let mut controller = ThemeController::new(open_store(config));
    let mut scratch = Document::new();
    let result = match action {
        ThemeAction::Show => {
            match controller.stored() {
                Some(theme) => println!("{theme}"),
                None => println!("system"),
            }
            return;
        }
        ThemeAction::Light => controller.apply(&mut scratch, Some(Theme::Light)),
        ThemeAction::Dark => controller.apply(&mut scratch, Some(Theme::Dark)),
        ThemeAction::Toggle => {
            controller.restore(&mut scratch, system_prefers_dark());
            controller.apply(&mut scratch, None)
        }
        ThemeAction::Clear => {
            controller.clear().unwrap_or_else(|e| fail(&e.to_string()));
            println!("system");
            return;
        }
    };
    // `apply` only logs store failures; the command must not claim success.
    if controller.stored() != Some(result) {
        fail("could not store the theme preference");
    }
    println!("{result}");
}

// ---------------------------------------------------------------------------
// Terminal viewer
// ---------------------------------------------------------------------------

/// Static outline rows for the sidebar.
struct OutlineRow {
    depth: usize,
    label: String,
    /// Rendered line of the heading this row links to.
    line: usize,
}

fn outline_rows<S: PreferenceStore + 'static>(
    page: &Page<S>,
    rendered: &RenderedPage,
) -> Vec<OutlineRow> {
    let doc = page.document();
    let Some(outline) = page.outline() else {
        return Vec::new();
    };
    let depths = outline.depths(&doc);
    outline
        .entries()
        .iter()
        .zip(depths)
        .map(|(entry, depth)| OutlineRow {
            depth,
            label: doc.text_content(entry.link),
            line: rendered
                .heading_lines
                .get(&outline.headings()[entry.index].element)
                .copied()
                .unwrap_or(0),
        })
        .collect()
}

fn render_for<S: PreferenceStore + 'static>(page: &Page<S>, highlighter: &Highlighter) -> RenderedPage {
    let doc = page.document();
    let article = doc
        .get_element_by_id(&page.config().article_id)
        .unwrap_or_else(|| doc.document_element());
    render::render_article(&doc, article, Some(highlighter), page.theme().unwrap_or(Theme::Dark))
}

fn viewport_height(terminal: &DefaultTerminal) -> io::Result<usize> {
    // One row for the status bar
    Ok(terminal.size()?.height.saturating_sub(1) as usize)
}

fn run<S: PreferenceStore + 'static>(
    terminal: &mut DefaultTerminal,
    page: &mut Page<S>,
    highlighter: &Highlighter,
) -> io::Result<()> {
    let mut rendered = render_for(page, highlighter);
    let rows = outline_rows(page, &rendered);
    let mut scroll_offset: usize = 0;

    let mut height = viewport_height(terminal)?;
    page.layout_changed(&ViewportGeometry {
        page: &rendered,
        scroll: scroll_offset,
        height,
    });

    loop {
        let active = page.active_entry();
        let theme = page.theme().unwrap_or(Theme::Dark);
        terminal.draw(|frame| ui(frame, &rendered, &rows, scroll_offset, active, theme))?;

        let event = event::read()?;

        // Recalculate bounds on every event, including Event::Resize.
        height = viewport_height(terminal)?;
        let total_lines = rendered.total_lines();
        let max_scroll = total_lines.saturating_sub(height);
        let half_page = (height / 2).max(1);

        if let Event::Key(key) = event {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(())
                }
                KeyCode::Char('j') | KeyCode::Down => {
                    scroll_offset = scroll_offset.saturating_add(1);
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    scroll_offset = scroll_offset.saturating_sub(1);
                }
                KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    scroll_offset = scroll_offset.saturating_add(half_page);
                }
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    scroll_offset = scroll_offset.saturating_sub(half_page);
                }
                KeyCode::PageDown | KeyCode::Char(' ') => {
                    scroll_offset = scroll_offset.saturating_add(height);
                }
                KeyCode::PageUp => {
                    scroll_offset = scroll_offset.saturating_sub(height);
                }
                KeyCode::Char('g') | KeyCode::Home => scroll_offset = 0,
                KeyCode::Char('G') | KeyCode::End => scroll_offset = max_scroll,
                KeyCode::Char('n') => {
                    if let Some(row) = rows.iter().find(|r| r.line > scroll_offset) {
                        scroll_offset = row.line;
                    }
                }
                KeyCode::Char('p') => {
                    if let Some(row) = rows.iter().rev().find(|r| r.line < scroll_offset) {
                        scroll_offset = row.line;
                    }
                }
                KeyCode::Char('t') => {
                    let theme = page.toggle_theme();
                    log::info!("[view] theme={theme}");
                    rendered = render_for(page, highlighter);
                }
                _ => {}
            }
        }

        scroll_offset = scroll_offset.min(max_scroll);
        page.layout_changed(&ViewportGeometry {
            page: &rendered,
            scroll: scroll_offset,
            height,
        });
    }
}

fn ui(
    frame: &mut Frame,
    rendered: &RenderedPage,
    rows: &[OutlineRow],
    scroll_offset: usize,
    active: Option<usize>,
    theme: Theme,
) {
    let area = frame.area();

    // Minimum usable terminal size
    const MIN_WIDTH: u16 = 20;
    const MIN_HEIGHT: u16 = 5;
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = "Terminal too small";
        let w = (msg.len() as u16).min(area.width);
        let x = area.x + area.width.saturating_sub(w) / 2;
        let y = area.y + area.height / 2;
        if w > 0 && area.height > 0 {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    msg,
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Rect::new(x, y, w, 1),
            );
        }
        return;
    }

    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    let show_sidebar = !rows.is_empty() && chunks[0].width > SIDEBAR_WIDTH * 2;
    let columns = if show_sidebar {
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)]).split(chunks[0])
    } else {
        Layout::horizontal([Constraint::Length(0), Constraint::Min(1)]).split(chunks[0])
    };

    let (bg, fg) = match theme {
        Theme::Light => (Color::White, Color::Black),
        Theme::Dark => (Color::Reset, Color::Reset),
    };
    let content = Paragraph::new(rendered.text.clone())
        .style(Style::default().bg(bg).fg(fg))
        .scroll((scroll_offset as u16, 0));
    frame.render_widget(content, columns[1]);

    if show_sidebar {
        render_sidebar(frame, rows, active, columns[0]);
    }

    let total_lines = rendered.total_lines();
    let viewport_height = chunks[0].height as usize;
    let position = if total_lines == 0 {
        "Empty".to_owned()
    } else if total_lines <= viewport_height {
        "All".to_owned()
    } else if scroll_offset == 0 {
        "Top".to_owned()
    } else if scroll_offset >= total_lines.saturating_sub(viewport_height) {
        "Bot".to_owned()
    } else {
        format!("{}%", (scroll_offset * 100) / total_lines)
    };
    let section = active
        .and_then(|i| rows.get(i))
        .map(|r| format!("  \u{00A7} {}", r.label))
        .unwrap_or_default();
    let status = format!(
        " Line {}/{} | {} | {}{}",
        scroll_offset + 1,
        total_lines,
        position,
        theme,
        section
    );
    let status_bar = Paragraph::new(Span::styled(
        status,
        Style::default().fg(Color::Black).bg(Color::White),
    ))
    .style(Style::default().bg(Color::White));
    frame.render_widget(status_bar, chunks[1]);
}

/// Outline sidebar; the active entry is highlighted and kept in view.
fn render_sidebar(frame: &mut Frame, rows: &[OutlineRow], active: Option<usize>, area: Rect) {
    let lines: Vec<Line<'static>> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let text = format!("{}{}", "  ".repeat(row.depth), row.label);
            let style = if Some(i) == active {
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Blue)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(Span::styled(text, style))
        })
        .collect();

    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = match active {
        Some(i) if inner_height > 0 => {
            let max_scroll = rows.len().saturating_sub(inner_height);
            i.saturating_sub(inner_height / 2).min(max_scroll)
        }
        _ => 0,
    };

    let block = Block::bordered()
        .title(" Outline ")
        .style(Style::default().fg(Color::White));
    frame.render_widget(
        Paragraph::new(lines).block(block).scroll((scroll as u16, 0)),
        area,
    );
}
