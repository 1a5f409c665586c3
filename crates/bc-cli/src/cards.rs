use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::Deserialize;

use bc_core::metadata::PopularVideo;
use bc_core::{coin_like_ratio, match_bvid, PageError, SelectorSet, VideoElement, VideoGroup, VideoSource};

/// One card in a records file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub title: Option<String>,
    pub bvid: Option<String>,
    /// Used for the BV id when `bvid` is absent
    pub href: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<String>,
    pub dimension: Option<bool>,
    pub coin: Option<u64>,
    pub like: Option<u64>,
    #[serde(default)]
    pub next_play: bool,
}

impl CardRecord {
    pub fn bvid(&self) -> Option<String> {
        self.bvid
            .clone()
            .or_else(|| self.href.as_deref().and_then(match_bvid).map(str::to_string))
    }
}

impl From<PopularVideo> for CardRecord {
    fn from(video: PopularVideo) -> Self {
        Self {
            title: video.title,
            bvid: Some(video.bvid),
            uploader: video.uploader,
            ..Default::default()
        }
    }
}

/// A card with its display state.
#[derive(Debug, Clone)]
pub struct CliCard {
    pub record: Rc<CardRecord>,
    hidden: Rc<Cell<bool>>,
    processed: Rc<Cell<bool>>,
}

impl CliCard {
    pub fn new(record: CardRecord) -> Self {
        Self {
            record: Rc::new(record),
            hidden: Rc::new(Cell::new(false)),
            processed: Rc::new(Cell::new(false)),
        }
    }
}

impl VideoElement for CliCard {
    fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    fn hide(&self) {
        self.hidden.set(true);
    }

    fn show(&self) {
        self.hidden.set(false);
    }

    fn is_processed(&self) -> bool {
        self.processed.get()
    }

    fn mark_processed(&self) {
        self.processed.set(true);
    }
}

pub fn load_records(path: &Path) -> Result<Vec<CardRecord>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    parse_records(&text).map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))
}

pub fn parse_records(text: &str) -> Result<Vec<CardRecord>, serde_json::Error> {
    serde_json::from_str(text)
}

/// Every field the records format carries.
pub fn full_selectors() -> SelectorSet<CliCard> {
    markup_selectors()
        .with_duration(|c: &CliCard| c.record.duration.clone())
        .with_dimension(|c: &CliCard| c.record.dimension)
        .with_coin_like_ratio(|c: &CliCard| match (c.record.coin, c.record.like) {
            (Some(coin), Some(like)) => coin_like_ratio(coin, like),
            _ => None,
        })
}

/// Fields a popular-page card shows in its markup; the rest comes from the
/// API metadata cache.
pub fn markup_selectors() -> SelectorSet<CliCard> {
    SelectorSet::new()
        .with_title(|c: &CliCard| c.record.title.clone())
        .with_bvid(|c: &CliCard| c.record.bvid())
        .with_uploader(|c: &CliCard| c.record.uploader.clone())
}

/// The current set of cards; replaced wholesale when the file changes.
#[derive(Default)]
pub struct CardSource {
    cards: RefCell<Vec<CliCard>>,
}

impl CardSource {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn replace(&self, records: Vec<CardRecord>) {
        *self.cards.borrow_mut() = records.into_iter().map(CliCard::new).collect();
    }

    pub fn cards(&self) -> Vec<CliCard> {
        self.cards.borrow().clone()
    }
}

impl VideoSource<CliCard> for CardSource {
    fn collect(&self, _full_site: bool) -> Result<Vec<VideoGroup<CliCard>>, PageError> {
        let (next, main): (Vec<CliCard>, Vec<CliCard>) =
            self.cards.borrow().iter().cloned().partition(|c| c.record.next_play);
        Ok(vec![VideoGroup::main(main), VideoGroup::next_play(next)])
    }
}
