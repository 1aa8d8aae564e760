use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use clipstash::clipboard::{self, RawSnapshot, focus, watch};
use clipstash::models::{
    AppNameResolver, Capture, ContentType, DesktopEntryLookup, HistoryEntry, SearchIndex,
};
use clipstash::storage::{
    Config, ConfigStorage, HISTORY_FILE, HistoryLock, TomlConfigStorage, default_directories,
    ensure_data_dir,
};
use clipstash::{Degraded, HistoryEngine, imaging, logging};

#[derive(Parser)]
#[command(name = "clipstash")]
#[command(about = "Clipboard history manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the clipboard watcher (daemon mode)
    ///
    /// The source application of each clip is recorded on Hyprland and Sway.
    /// Other Wayland compositors do not expose the focused window, so their
    /// clips have no source application.
    Listen,

    /// Capture the current clipboard (called by the watcher)
    Capture,

    /// Store clipboard content from stdin
    Store {
        /// MIME type of the content on stdin
        #[arg(short = 't', long = "type", default_value = "text/plain")]
        mime: String,

        /// Id of the application the content was copied from
        #[arg(long)]
        source_app_id: Option<String>,

        /// Display name of the application the content was copied from
        #[arg(long)]
        source_app_name: Option<String>,
    },

    /// Show clipboard history entries
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Search clipboard history (case-insensitive substring, "image" for images)
    Search {
        query: String,

        /// Rank by fuzzy match score instead of recency
        #[arg(long)]
        fuzzy: bool,

        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Put an entry back on the clipboard (id or unique id prefix)
    Select {
        id: String,

        /// Only copy, do not simulate the paste shortcut
        #[arg(long)]
        no_paste: bool,
    },

    /// Delete entries (ids or unique id prefixes)
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete every entry
    Clear,

    /// Remove stored images no entry references
    Gc,

    /// Show clipboard history statistics
    Stats,
}

/// Resolved configuration and data location
struct Settings {
    config: Config,
    data_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings()?;
    init_logging(&settings);

    match cli.command {
        Some(Commands::Listen) => cmd_listen(),
        Some(Commands::Capture) => cmd_capture(&settings),
        Some(Commands::Store {
            mime,
            source_app_id,
            source_app_name,
        }) => cmd_store(&settings, &mime, source_app_id, source_app_name),
        Some(Commands::History { limit }) => cmd_history(&settings, limit),
        Some(Commands::Search {
            query,
            fuzzy,
            limit,
        }) => cmd_search(&settings, &query, fuzzy, limit),
        Some(Commands::Select { id, no_paste }) => cmd_select(&settings, &id, no_paste),
        Some(Commands::Delete { ids }) => cmd_delete(&settings, &ids),
        Some(Commands::Clear) => cmd_clear(&settings),
        Some(Commands::Gc) => cmd_gc(&settings),
        Some(Commands::Stats) => cmd_stats(&settings),
        None => cmd_history(&settings, 10),
    }
}

fn load_settings() -> Result<Settings> {
    let (default_data_dir, config_dir) = default_directories()?;

    let config_storage = TomlConfigStorage::new(config_dir.join("clipstash.toml"));
    let config = config_storage.load()?;

    let data_dir = config
        .general
        .data_dir
        .clone()
        .unwrap_or(default_data_dir);
    ensure_data_dir(&data_dir)?;

    Ok(Settings { config, data_dir })
}

/// Log to a rolling file, or to stderr via env_logger when RUST_LOG is set
fn init_logging(settings: &Settings) {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
        return;
    }

    let log_path = settings.data_dir.join("logs").join("clipstash.log");
    if let Err(e) = logging::init_logger(&log_path, &settings.config.general.log_level, "warn") {
        eprintln!("clipstash: file logging unavailable ({:#}), logging to stderr", e);
        env_logger::init();
    }
}

/// Open the history while holding the data directory lock
///
/// Keep the returned lock alive for as long as the engine is used.
fn open_engine(settings: &Settings) -> Result<(HistoryLock, HistoryEngine)> {
    let lock = HistoryLock::acquire(&settings.data_dir)?;
    log::debug!(
        "Opening history {:?}",
        settings.data_dir.join(HISTORY_FILE)
    );
    let engine = HistoryEngine::open_dir(&settings.data_dir, settings.config.general.max_history);
    Ok((lock, engine))
}

fn report_warnings(warnings: &[Degraded]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}

/// Find an entry by full id or unique id prefix
fn resolve_id(engine: &HistoryEngine, arg: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(arg) {
        return Ok(id);
    }

    match engine.find_by_prefix(arg).as_slice() {
        [] => bail!("No entry matches id {:?}", arg),
        [entry] => Ok(entry.id),
        matches => bail!("Id prefix {:?} is ambiguous ({} entries)", arg, matches.len()),
    }
}

/// Start clipboard watcher in background
fn cmd_listen() -> Result<()> {
    log::info!("Starting clipboard watcher");

    watch::start_watcher().context("Failed to start clipboard watcher")?;

    println!("Clipboard watcher started successfully.");
    println!("Use 'pkill -f \"wl-paste.*clipstash\"' to stop it.");

    Ok(())
}

/// Capture every useful offer of the current clipboard as one clip
fn cmd_capture(settings: &Settings) -> Result<()> {
    let snapshot = match watch::read_snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::debug!("Nothing to capture: {:#}", e);
            return Ok(());
        }
    };

    let Some(capture) = clipboard::normalize(&snapshot, focus::focused_app_id(), None) else {
        return Ok(());
    };
    submit(settings, capture)
}

/// Store clipboard content from stdin
fn cmd_store(
    settings: &Settings,
    mime: &str,
    source_app_id: Option<String>,
    source_app_name: Option<String>,
) -> Result<()> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read from stdin")?;

    if buffer.is_empty() {
        log::debug!("Empty clipboard content, skipping");
        return Ok(());
    }

    let Some(snapshot) = RawSnapshot::from_mime(mime, buffer) else {
        log::debug!("Unusable clipboard content of type {}, skipping", mime);
        return Ok(());
    };
    let Some(capture) = clipboard::normalize(&snapshot, source_app_id, source_app_name) else {
        return Ok(());
    };

    submit(settings, capture)
}

fn submit(settings: &Settings, capture: Capture) -> Result<()> {
    if let Some((width, height)) = capture.image_bytes().and_then(imaging::dimensions) {
        log::debug!("Captured {}x{} image", width, height);
    }

    let (_lock, mut engine) = open_engine(settings)?;
    let outcome = engine.submit_capture(capture);
    log::info!(
        "Stored clip {} (type: {})",
        outcome.value.id,
        outcome.value.content_type
    );
    report_warnings(&outcome.warnings);

    Ok(())
}

fn print_entries<'a>(entries: impl IntoIterator<Item = &'a HistoryEntry>) -> usize {
    let mut resolver = AppNameResolver::with_lookup(Box::new(DesktopEntryLookup::from_env()));
    let mut shown = 0;

    for (i, entry) in entries.into_iter().enumerate() {
        let type_label = match entry.content_type {
            ContentType::Text => "TEXT",
            ContentType::Image => "IMAGE",
        };
        let id = entry.id.to_string();
        let when = entry
            .created_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M");
        let source = resolver
            .display_name(
                entry.source_app_name.as_deref(),
                entry.source_app_id.as_deref(),
            )
            .map(|name| format!(" ({})", name))
            .unwrap_or_default();

        println!(
            "{:3}. {} {} [{}] {}{}",
            i + 1,
            &id[..8],
            when,
            type_label,
            entry.preview(50),
            source
        );
        shown += 1;
    }

    shown
}

/// Show clipboard history entries
fn cmd_history(settings: &Settings, limit: usize) -> Result<()> {
    let (_lock, engine) = open_engine(settings)?;

    println!("Recent Clipboard Entries (showing up to {}):", limit);
    println!("{}", "=".repeat(60));

    if print_entries(engine.entries().iter().take(limit)) == 0 {
        println!("(empty - no clipboard history yet)");
    }

    Ok(())
}

/// Search clipboard history
fn cmd_search(settings: &Settings, query: &str, fuzzy: bool, limit: usize) -> Result<()> {
    let (_lock, engine) = open_engine(settings)?;

    let shown = if fuzzy {
        let mut index = SearchIndex::new();
        let ranked = index.search(engine.entries(), query);
        print_entries(
            ranked
                .into_iter()
                .filter_map(|(id, _score)| engine.get(id))
                .take(limit),
        )
    } else {
        print_entries(engine.query(query).take(limit))
    };

    if shown == 0 {
        println!("No entries match {:?}", query);
    }

    Ok(())
}

/// Put an entry back on the clipboard
fn cmd_select(settings: &Settings, id_arg: &str, no_paste: bool) -> Result<()> {
    let (_lock, engine) = open_engine(settings)?;
    let id = resolve_id(&engine, id_arg)?;
    let content = engine
        .resolve(id)
        .ok_or_else(|| anyhow!("No entry with id {}", id))?;

    let backend = clipboard::create_backend()?;
    let activation = &settings.config.activation;
    let paste_delay = (activation.auto_paste && !no_paste).then_some(activation.paste_delay_ms);

    clipboard::activate(backend.as_ref(), &content, paste_delay)
        .with_context(|| format!("Failed to activate entry {}", id))?;

    log::info!("Activated entry {} via {}", id, backend.name());
    Ok(())
}

/// Delete entries by id
fn cmd_delete(settings: &Settings, id_args: &[String]) -> Result<()> {
    let (_lock, mut engine) = open_engine(settings)?;
    let ids = id_args
        .iter()
        .map(|arg| resolve_id(&engine, arg))
        .collect::<Result<Vec<_>>>()?;

    let outcome = engine.remove(ids);
    println!("Deleted {} entries", outcome.value);
    report_warnings(&outcome.warnings);

    Ok(())
}

/// Delete every entry
fn cmd_clear(settings: &Settings) -> Result<()> {
    let (_lock, mut engine) = open_engine(settings)?;

    let outcome = engine.clear_all();
    println!("Cleared {} entries", outcome.value);
    report_warnings(&outcome.warnings);

    Ok(())
}

/// Remove orphaned image files
fn cmd_gc(settings: &Settings) -> Result<()> {
    let (_lock, engine) = open_engine(settings)?;

    let removed = engine
        .sweep_orphaned_blobs()
        .context("Failed to sweep image directory")?;
    println!("Removed {} orphaned images", removed);

    Ok(())
}

/// Show clipboard statistics
fn cmd_stats(settings: &Settings) -> Result<()> {
    let (_lock, engine) = open_engine(settings)?;

    let mut text_count = 0;
    let mut image_count = 0;
    let mut missing_count = 0;

    for entry in engine.entries() {
        match entry.content_type {
            ContentType::Text => text_count += 1,
            ContentType::Image => {
                image_count += 1;
                if entry.image_ref.is_none() {
                    missing_count += 1;
                }
            }
        }
    }

    println!("Clipboard History Statistics");
    println!("============================");
    println!("Total entries: {}", engine.len());
    println!("  Text: {}", text_count);
    println!("  Images: {}", image_count);
    if missing_count > 0 {
        println!("  Images without payload: {}", missing_count);
    }
    println!("Max history: {}", engine.max_entries());
    println!("Data directory: {}", display_path(&settings.data_dir));

    Ok(())
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
