//! Elements CLI: loads a demo dictionary through the page adapter.
//!
//! Usage:
//!   elements load [--pages n] [--per-page n] [--words path] [--config path] [--save name] [--db path]
//!   elements restore <name> [--db path]
//!   elements snapshots [--db path]
//!
//! The dictionary is two sources: words, paged alphabetically, and one
//! header per initial letter placed before the first word of that letter.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use elements::source::{AnchorPolicy, AnchoredSource, Placeholder, WithPlaceholders};
use elements::{
    AdapterConfig, ChangeEvent, ChangeListener, Element, ElementAdapter, ElementTag, FindResult,
    Item, ItemCodec, JsonCodec, OpenStore, Page, Renderer, RendererRegistry, Source,
    SqliteStateStore, StateStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEMO_WORDS: &[&str] = &[
    "abacus", "acorn", "anchor", "apple", "badger", "banjo", "beacon", "birch", "cactus", "canal",
    "cedar", "comet", "dahlia", "delta", "dune", "ember", "engine", "falcon", "fern", "fjord",
    "garnet", "glacier", "harbor", "hazel", "heron", "iris", "island", "jasper", "juniper",
    "kestrel", "lagoon", "lantern", "maple", "meadow", "nectar", "nutmeg", "orchid", "otter",
    "pebble", "pine", "quartz", "raven", "river", "saffron", "sparrow", "thistle", "tundra",
    "umber", "valley", "willow", "yarrow", "zephyr",
];

#[derive(Parser)]
#[command(
    name = "elements",
    version,
    about = "Dependency-aware paged element lists"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load dictionary pages and print the resulting list
    Load {
        /// Number of pages to load
        #[arg(long, default_value_t = 2)]
        pages: usize,
        /// Words per page
        #[arg(long, default_value_t = 10)]
        per_page: usize,
        /// Word list, one word per line (defaults to a built-in list)
        #[arg(long)]
        words: Option<PathBuf>,
        /// Adapter configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Save the loaded state as a snapshot with this name
        #[arg(long)]
        save: Option<String>,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Restore a saved snapshot and print the list
    Restore {
        /// Snapshot name
        name: String,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List saved snapshots
    Snapshots {
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// Words of one page, sorted; an empty page counts as a failure.
struct Words {
    words: Arc<[String]>,
    per_page: usize,
}

#[async_trait]
impl Source for Words {
    fn name(&self) -> &str {
        "words"
    }

    async fn find(&self, page: &Page) -> FindResult {
        let start = page.number().saturating_mul(self.per_page);
        Ok(self
            .words
            .iter()
            .skip(start)
            .take(self.per_page)
            .cloned()
            .map(Item::new)
            .collect())
    }

    fn codec(&self) -> Option<Arc<dyn ItemCodec>> {
        Some(Arc::new(JsonCodec::<String>::new()))
    }
}

/// One header per initial letter, anchored on its first word.
struct Initials;

fn initial(element: &Element) -> Option<char> {
    element
        .data_as::<String>()?
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
}

impl AnchorPolicy for Initials {
    fn select_anchors(&self, dependency_elements: &[Element]) -> Vec<Element> {
        let mut last = None;
        let mut anchors = Vec::new();
        for element in dependency_elements {
            let letter = initial(element);
            if letter.is_some() && letter != last {
                anchors.push(element.clone());
            }
            last = letter;
        }
        anchors
    }

    fn companion_for(&self, anchor: &Element) -> Item {
        Item::new(initial(anchor).map(String::from).unwrap_or_default())
    }

    fn codec(&self) -> Option<Arc<dyn ItemCodec>> {
        Some(Arc::new(JsonCodec::<String>::new()))
    }
}

struct WordRenderer;

impl Renderer for WordRenderer {
    fn render(&self, _page: &Page, element: &Element) -> String {
        format!("  {}", element.data_as::<String>().map_or("", String::as_str))
    }
}

struct HeaderRenderer;

impl Renderer for HeaderRenderer {
    fn element_tags(&self) -> Vec<ElementTag> {
        vec![ElementTag::HEADER]
    }

    fn render(&self, _page: &Page, element: &Element) -> String {
        format!("[{}]", element.data_as::<String>().map_or("", String::as_str))
    }
}

struct PlaceholderRenderer;

impl Renderer for PlaceholderRenderer {
    fn element_tags(&self) -> Vec<ElementTag> {
        vec![ElementTag::PAGINATION, ElementTag::EMPTY, ElementTag::ERROR]
    }

    fn render(&self, _page: &Page, element: &Element) -> String {
        match Placeholder::of(element.data()) {
            Some(Placeholder::Pagination) => "  ...".to_string(),
            Some(Placeholder::Empty) => "(no words)".to_string(),
            Some(Placeholder::Error) | None => "(failed to load words)".to_string(),
        }
    }
}

/// Logs list changes.
struct EventLog;

impl ChangeListener for EventLog {
    fn on_change(&self, event: ChangeEvent) {
        debug!(?event, "list changed");
    }
}

/// Get the default database path (~/.local/share/elements/elements.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let elements_dir = data_dir.join("elements");
    std::fs::create_dir_all(&elements_dir).ok();
    elements_dir.join("elements.db")
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteStateStore, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    SqliteStateStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))
}

fn read_words(path: Option<&Path>) -> Result<Vec<String>, String> {
    let mut words: Vec<String> = match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
        None => DEMO_WORDS.iter().map(|word| word.to_string()).collect(),
    };
    words.sort_by_key(|word| word.to_lowercase());
    Ok(words)
}

fn dictionary(
    words: Vec<String>,
    per_page: usize,
    config: AdapterConfig,
) -> Result<ElementAdapter, String> {
    let sources: Vec<Arc<dyn Source>> = vec![
        Arc::new(WithPlaceholders::new(Words {
            words: words.into(),
            per_page,
        })),
        Arc::new(AnchoredSource::header("initials", "words", Initials)),
    ];
    let adapter = ElementAdapter::with_config(sources, config).map_err(|e| e.to_string())?;
    adapter.subscribe(Arc::new(EventLog));
    Ok(adapter)
}

fn renderers() -> RendererRegistry {
    RendererRegistry::new()
        .with_renderer(Arc::new(WordRenderer))
        .with_renderer(Arc::new(HeaderRenderer))
        .with_renderer(Arc::new(PlaceholderRenderer))
}

fn print_list(adapter: &ElementAdapter) -> i32 {
    let registry = renderers();
    for position in 0..adapter.element_count() {
        match adapter.render_at(position, &registry) {
            Ok(line) => println!("{}", line),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    0
}

async fn load_pages(adapter: &ElementAdapter, pages: usize) -> Result<(), String> {
    adapter.load().await.map_err(|e| e.to_string())?;
    for _ in 1..pages {
        let Some(page) = adapter.current_page() else {
            break;
        };
        adapter
            .load_next_page(&page)
            .await
            .map_err(|e| e.to_string())?;
    }
    info!(
        pages = adapter.pager().page_count(),
        elements = adapter.element_count(),
        "loaded"
    );
    Ok(())
}

fn cmd_load(
    runtime: &tokio::runtime::Runtime,
    pages: usize,
    per_page: usize,
    words: Option<&Path>,
    config: Option<&Path>,
    save: Option<&str>,
    db: Option<PathBuf>,
) -> i32 {
    let config = match config.map(AdapterConfig::from_path).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let words = match read_words(words) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let per_page = per_page.max(1);
    // past the last word a page finds nothing and its load fails
    let pages = pages.min(words.len().div_ceil(per_page)).max(1);
    let adapter = match dictionary(words, per_page, config) {
        Ok(adapter) => adapter,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Err(e) = runtime.block_on(load_pages(&adapter, pages)) {
        eprintln!("Error: {}", e);
        return 1;
    }
    let code = print_list(&adapter);
    if code != 0 {
        return code;
    }
    let Some(name) = save else {
        return 0;
    };
    let store = match open_store(db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match adapter
        .save_state()
        .map_err(|e| e.to_string())
        .and_then(|state| store.save(name, &state).map_err(|e| e.to_string()))
    {
        Ok(()) => {
            println!("Saved snapshot '{}'", name);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_restore(name: &str, db: Option<PathBuf>) -> i32 {
    let store = match open_store(db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let state = match store.load(name) {
        Ok(Some(state)) => state,
        Ok(None) => {
            eprintln!("Error: snapshot '{}' not found", name);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    // restored pages never call find, so the word list is not needed
    let adapter = match dictionary(Vec::new(), 1, AdapterConfig::default()) {
        Ok(adapter) => adapter,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Err(e) = adapter.restore_state(&state) {
        eprintln!("Error: {}", e);
        return 1;
    }
    print_list(&adapter)
}

fn cmd_snapshots(db: Option<PathBuf>) -> i32 {
    let store = match open_store(db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let keys = match store.keys() {
        Ok(keys) => keys,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if keys.is_empty() {
        println!("No snapshots.");
        return 0;
    }
    for key in keys {
        match store.saved_at(&key) {
            Ok(Some(saved_at)) => println!("{}  (saved {})", key, saved_at.to_rfc3339()),
            Ok(None) => println!("{}", key),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    0
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Load {
            pages,
            per_page,
            words,
            config,
            save,
            db,
        } => {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("Error: failed to start runtime: {}", e);
                    std::process::exit(1);
                }
            };
            cmd_load(
                &runtime,
                pages,
                per_page,
                words.as_deref(),
                config.as_deref(),
                save.as_deref(),
                db,
            )
        }
        Commands::Restore { name, db } => cmd_restore(&name, db),
        Commands::Snapshots { db } => cmd_snapshots(db),
    };
    std::process::exit(code);
}
