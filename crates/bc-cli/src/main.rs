//! BiliCleaner CLI
//!
//! Drives the filter engine against a JSON settings file and card records,
//! or against the live popular-videos API.

mod cards;
mod popular;
mod store;

use std::cell::RefCell;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;

use clap::{Args, Parser, Subcommand};

use bc_core::metadata::parse_popular;
use bc_core::storage::namespaced;
use bc_core::{
    is_tracked_api, CriterionKind, EditorRequest, FilterContext, KvStore, PageKind, PageModule, SelectorSet,
    VideoElement, WordListEditor, POLL_INTERVAL,
};

use cards::{full_selectors, load_records, markup_selectors, CardSource, CliCard};
use popular::POPULAR_API;
use store::JsonFileStore;

#[derive(Parser)]
#[command(name = "bc-cli")]
#[command(about = "BiliCleaner video filter engine tools")]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Settings file
    #[arg(short, long, default_value = "bili-cleaner.json")]
    store: PathBuf,

    /// Page kind: homepage, popular, video, channel
    #[arg(short, long, value_parser = parse_page)]
    page: PageKind,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a records file and print each card's verdict
    Check {
        #[command(flatten)]
        target: Target,

        /// JSON array of cards
        #[arg(short, long)]
        records: PathBuf,

        /// Print shown cards too
        #[arg(short, long)]
        all: bool,
    },

    /// Enable or disable a criterion on a page
    Toggle {
        #[command(flatten)]
        target: Target,

        #[arg(short, long, value_parser = parse_criterion)]
        criterion: CriterionKind,

        /// Disable instead of enable
        #[arg(long)]
        off: bool,
    },

    /// Set a numeric threshold (duration seconds, quality percent)
    Set {
        #[command(flatten)]
        target: Target,

        #[arg(short, long, value_parser = parse_criterion)]
        criterion: CriterionKind,

        #[arg(long)]
        value: f64,
    },

    /// Edit a criterion's word list
    List {
        #[command(subcommand)]
        command: ListCommand,
    },

    /// Print every criterion's status and value for a page
    Settings {
        #[command(flatten)]
        target: Target,
    },

    /// Fetch the popular list and show which videos would be hidden
    Popular {
        /// Settings file
        #[arg(short, long, default_value = "bili-cleaner.json")]
        store: PathBuf,

        /// API URL to fetch
        #[arg(long, default_value = POPULAR_API)]
        url: String,

        /// Use a saved response body instead of fetching
        #[arg(long)]
        body: Option<PathBuf>,
    },

    /// Re-check a records file whenever it changes
    Watch {
        #[command(flatten)]
        target: Target,

        #[arg(short, long)]
        records: PathBuf,
    },
}

#[derive(Subcommand)]
enum ListCommand {
    /// Append one entry
    Add {
        #[command(flatten)]
        target: Target,

        #[arg(short, long, value_parser = parse_criterion)]
        criterion: CriterionKind,

        value: String,
    },

    /// Replace the list with the lines of a file ("-" for stdin)
    Edit {
        #[command(flatten)]
        target: Target,

        #[arg(short, long, value_parser = parse_criterion)]
        criterion: CriterionKind,

        input: String,
    },

    /// Print the list
    Show {
        #[command(flatten)]
        target: Target,

        #[arg(short, long, value_parser = parse_criterion)]
        criterion: CriterionKind,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let result = match cli.command {
        Commands::Check { target, records, all } => cmd_check(&target, &records, all),
        Commands::Toggle { target, criterion, off } => cmd_toggle(&target, criterion, !off),
        Commands::Set { target, criterion, value } => cmd_set(&target, criterion, value),
        Commands::List { command } => match command {
            ListCommand::Add { target, criterion, value } => cmd_list_add(&target, criterion, &value),
            ListCommand::Edit { target, criterion, input } => cmd_list_edit(&target, criterion, &input),
            ListCommand::Show { target, criterion } => cmd_list_show(&target, criterion),
        },
        Commands::Settings { target } => cmd_settings(&target),
        Commands::Popular { store, url, body } => cmd_popular(&store, &url, body.as_deref()),
        Commands::Watch { target, records } => cmd_watch(&target, &records),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn parse_page(s: &str) -> Result<PageKind, String> {
    PageKind::from_name(s).ok_or_else(|| format!("unknown page '{}'", s))
}

fn parse_criterion(s: &str) -> Result<CriterionKind, String> {
    CriterionKind::from_name(s).ok_or_else(|| {
        let names: Vec<&str> = CriterionKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown criterion '{}' (expected one of: {})", s, names.join(", "))
    })
}

// =============================================================================
// Setup
// =============================================================================

struct Session {
    ctx: FilterContext,
    source: Rc<CardSource>,
    module: Rc<RefCell<PageModule>>,
}

fn open_session(store: &Path, page: PageKind, selectors: SelectorSet<CliCard>) -> Result<Session, String> {
    let store: Rc<dyn KvStore> = Rc::new(JsonFileStore::open(store)?);
    let ctx = FilterContext::new(store);
    let source = CardSource::new();
    let module = PageModule::new(page, &ctx, source.clone(), selectors);
    Ok(Session { ctx, source, module })
}

fn open_target(target: &Target) -> Result<Session, String> {
    open_session(&target.store, target.page, full_selectors())
}

// =============================================================================
// Commands
// =============================================================================

fn print_cards(cards: &[CliCard], all: bool) -> (usize, usize) {
    let mut hidden = 0;
    for card in cards {
        let verdict = if card.is_hidden() {
            hidden += 1;
            "HIDE"
        } else if all {
            "SHOW"
        } else {
            continue;
        };
        println!(
            "  {:<4}  {:<12}  {}  [{}]",
            verdict,
            card.record.bvid().unwrap_or_default(),
            card.record.title.as_deref().unwrap_or("-"),
            card.record.uploader.as_deref().unwrap_or("-"),
        );
    }
    (hidden, cards.len() - hidden)
}

fn cmd_check(target: &Target, records: &Path, all: bool) -> Result<(), String> {
    let session = open_target(target)?;
    session.source.replace(load_records(records)?);
    session.module.borrow().check_video_list(true);

    println!("Checked '{}' as {} page", records.display(), target.page);
    let (hidden, shown) = print_cards(&session.source.cards(), all);
    println!("  Hidden: {}, shown: {}", hidden, shown);
    Ok(())
}

fn cmd_toggle(target: &Target, criterion: CriterionKind, enable: bool) -> Result<(), String> {
    let session = open_target(target)?;
    let mut module = session.module.borrow_mut();
    if enable {
        module.enable(criterion).map_err(|e| e.to_string())?;
    } else {
        module.disable(criterion).map_err(|e| e.to_string())?;
    }
    println!(
        "{} {} on {} page",
        if enable { "Enabled" } else { "Disabled" },
        criterion,
        target.page
    );
    Ok(())
}

fn cmd_set(target: &Target, criterion: CriterionKind, value: f64) -> Result<(), String> {
    let session = open_target(target)?;
    let mut module = session.module.borrow_mut();
    module.change(criterion, value).map_err(|e| e.to_string())?;
    let stored = module.action(criterion).and_then(|a| a.value());
    println!("Set {} to {:?}", criterion, stored);
    Ok(())
}

fn cmd_list_add(target: &Target, criterion: CriterionKind, value: &str) -> Result<(), String> {
    let session = open_target(target)?;
    session
        .module
        .borrow_mut()
        .add(criterion, value)
        .map_err(|e| e.to_string())?;
    println!("Added '{}' to {}", value.trim(), criterion);
    Ok(())
}

fn cmd_list_edit(target: &Target, criterion: CriterionKind, input: &str) -> Result<(), String> {
    let text = if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        text
    } else {
        fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?
    };
    let lines: Vec<String> = text.lines().map(str::to_string).collect();

    let session = open_target(target)?;
    let mut module = session.module.borrow_mut();
    module.edit(criterion, &lines).map_err(|e| e.to_string())?;
    let count = module
        .action(criterion)
        .and_then(|a| a.list())
        .map(|l| l.entries().len())
        .unwrap_or(0);
    println!("Saved {} entries to {}", count, criterion);
    Ok(())
}

/// Prints the list instead of opening an editor.
struct PrintEditor;

impl WordListEditor for PrintEditor {
    fn show(&self, request: EditorRequest<'_>) {
        println!("{} ({})", request.label, namespaced(request.key));
        println!("  {}", request.description);
        for entry in request.entries {
            println!("  {}", entry);
        }
        println!("  {} entries", request.entries.len());
    }
}

fn cmd_list_show(target: &Target, criterion: CriterionKind) -> Result<(), String> {
    let session = open_target(target)?;
    let module = session.module.borrow();
    module
        .show_editor(criterion, &PrintEditor)
        .map_err(|e| e.to_string())
}

fn cmd_settings(target: &Target) -> Result<(), String> {
    let session = open_target(target)?;
    let module = session.module.borrow();
    println!("{} page ({})", target.page, target.store.display());
    for (name, (enabled, value)) in module.settings() {
        let value = match value {
            Some(value) => serde_json::to_string(&value).map_err(|e| e.to_string())?,
            None => "-".to_string(),
        };
        println!("  {:<24} {:<3}  {}", name, if enabled { "on" } else { "off" }, value);
    }
    println!("  suspended: {}", session.ctx.core.is_suspended());
    Ok(())
}

fn cmd_popular(store: &Path, url: &str, body: Option<&Path>) -> Result<(), String> {
    let body = match body {
        Some(path) => fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?,
        None => {
            if !is_tracked_api(url, "GET") {
                log::warn!("'{url}' is not one of the popular page's list APIs");
            }
            popular::fetch(url)?
        }
    };

    let videos = parse_popular(&body).map_err(|e| format!("Invalid API response: {}", e))?;
    let session = open_session(store, PageKind::Popular, markup_selectors())?;
    let module = session.module.borrow();
    if let Some(cache) = module.metadata() {
        cache.offer(body);
    }

    session.source.replace(videos.into_iter().map(Into::into).collect());
    module.check_video_list(true);

    println!("Popular: {} videos", session.source.cards().len());
    let (hidden, shown) = print_cards(&session.source.cards(), false);
    println!("  Hidden: {}, shown: {}", hidden, shown);
    Ok(())
}

fn cmd_watch(target: &Target, records: &Path) -> Result<(), String> {
    let session = open_target(target)?;
    let mut last: Option<String> = None;
    println!("Watching '{}' (Ctrl-C to stop)", records.display());

    loop {
        match fs::read_to_string(records) {
            Ok(text) if last.as_deref() != Some(text.as_str()) => {
                match cards::parse_records(&text) {
                    Ok(list) => {
                        session.source.replace(list);
                        session.module.borrow().on_mutation();
                        let (hidden, shown) = print_cards(&session.source.cards(), false);
                        println!("  Hidden: {}, shown: {}", hidden, shown);
                    }
                    Err(e) => log::error!("Failed to parse '{}': {}", records.display(), e),
                }
                last = Some(text);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Failed to read '{}': {}", records.display(), e),
        }
        thread::sleep(POLL_INTERVAL);
    }
}
