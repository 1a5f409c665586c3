//! Page modules
//!
//! A page module wires one kind of page to the engine: it owns the page's
//! [`Action`]s, builds the recheck hook from the host's [`VideoSource`] and
//! selectors, and listens on the agency for changes made on other pages.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::action::{Action, ActionError, FilterContext, Recheck};
use crate::agency::AgencyEvent;
use crate::filter::{SelectorSet, VideoElement};
use crate::metadata::{with_metadata_selectors, MetadataCache};
use crate::storage::KvStoreExt;
use crate::types::{CriterionKind, StoredValue};
use crate::wordlist::WordListEditor;

pub const NEXT_PLAY_EXEMPT_KEY: &str = "video-next-play-whitelist-filter-status";
pub const ENDING_EXEMPT_KEY: &str = "video-ending-whitelist-filter-status";

// =============================================================================
// Page Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PageKind {
    Homepage = 0,
    Popular = 1,
    /// Video detail and playlist pages
    Video = 2,
    Channel = 3,
}

impl PageKind {
    pub const ALL: [PageKind; 4] = [PageKind::Homepage, PageKind::Popular, PageKind::Video, PageKind::Channel];

    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Homepage => "homepage",
            PageKind::Popular => "popular",
            PageKind::Video => "video",
            PageKind::Channel => "channel",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Classify a page URL. Returns `None` for pages without a video filter.
    pub fn from_url(url: &str) -> Option<Self> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .or_else(|| url.strip_prefix("//"))
            .unwrap_or(url);
        let (host, path) = match rest.find(['/', '?', '#']) {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        if host != "bilibili.com" && host != "www.bilibili.com" {
            return None;
        }

        let path = path.split(['?', '#']).next().unwrap_or("");
        match path {
            "" | "/" | "/index.html" => Some(PageKind::Homepage),
            p if p.starts_with("/v/popular") => Some(PageKind::Popular),
            p if p.starts_with("/video/") || p.starts_with("/list/") => Some(PageKind::Video),
            p if p.starts_with("/v/") => Some(PageKind::Channel),
            _ => None,
        }
    }

    /// Criteria this page offers, in panel order.
    pub fn criteria(self) -> &'static [CriterionKind] {
        use CriterionKind::*;
        match self {
            PageKind::Popular => &[
                Duration,
                Quality,
                Dimension,
                Uploader,
                Bvid,
                UploaderKeyword,
                TitleKeyword,
                UploaderWhitelist,
                TitleKeywordWhitelist,
            ],
            _ => &[
                Duration,
                Uploader,
                Bvid,
                UploaderKeyword,
                TitleKeyword,
                UploaderWhitelist,
                TitleKeywordWhitelist,
            ],
        }
    }

    /// Pages whose cards need API metadata for duration, dimension and stats.
    pub fn has_metadata(self) -> bool {
        self == PageKind::Popular
    }

    /// Whether mutation-triggered checks redo every card.
    fn mutation_full_site(self) -> bool {
        matches!(self, PageKind::Popular | PageKind::Video)
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for PageKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Video list container not found")]
    ContainerNotFound,
    #[error("{kind} is not offered on the {page} page")]
    UnknownCriterion { page: PageKind, kind: CriterionKind },
    #[error(transparent)]
    Action(#[from] ActionError),
}

// =============================================================================
// Video Source
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    Main,
    /// Video page "next play" list, exempt while the toggle is on
    NextPlay,
}

#[derive(Debug, Clone)]
pub struct VideoGroup<E> {
    pub elements: Vec<E>,
    pub role: GroupRole,
}

impl<E> VideoGroup<E> {
    pub fn main(elements: Vec<E>) -> Self {
        Self { elements, role: GroupRole::Main }
    }

    pub fn next_play(elements: Vec<E>) -> Self {
        Self { elements, role: GroupRole::NextPlay }
    }
}

/// Host side of a page: finds the current video cards.
pub trait VideoSource<E> {
    fn collect(&self, full_site: bool) -> Result<Vec<VideoGroup<E>>, PageError>;
}

// =============================================================================
// Context Menu
// =============================================================================

/// What the user right-clicked.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuTarget {
    Uploader { name: String, space_link: Option<String> },
    Video { bvid: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuCommand {
    BlockUploader(String),
    WhitelistUploader(String),
    BlockVideo(String),
    /// Text for the host to put on the clipboard
    Copy(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub label: String,
    pub command: MenuCommand,
}

impl MenuEntry {
    fn new(label: String, command: MenuCommand) -> Self {
        Self { label, command }
    }
}

// =============================================================================
// Page Module
// =============================================================================

pub struct PageModule {
    kind: PageKind,
    ctx: FilterContext,
    actions: BTreeMap<CriterionKind, Action>,
    recheck: Recheck,
    next_play_exempt: Rc<Cell<bool>>,
    ending_exempt: Cell<bool>,
    metadata: Option<Rc<MetadataCache>>,
}

impl PageModule {
    /// Build the module for `kind` and subscribe it to the agency.
    pub fn new<E, S>(kind: PageKind, ctx: &FilterContext, source: Rc<S>, selectors: SelectorSet<E>) -> Rc<RefCell<Self>>
    where
        E: VideoElement + 'static,
        S: VideoSource<E> + ?Sized + 'static,
    {
        let metadata = kind.has_metadata().then(|| Rc::new(MetadataCache::new()));
        let selectors = match &metadata {
            Some(cache) => with_metadata_selectors(cache, selectors),
            None => selectors,
        };
        let next_play_exempt = Rc::new(Cell::new(ctx.store.get_bool(NEXT_PLAY_EXEMPT_KEY, true)));

        let recheck: Recheck = {
            let core = ctx.core.clone();
            let cache = metadata.clone();
            let exempt = next_play_exempt.clone();
            Rc::new(move |full_site: bool| {
                let groups = match source.collect(full_site) {
                    Ok(groups) => groups,
                    Err(e) => {
                        log::debug!("{kind} check_video_list: {e}");
                        return;
                    }
                };
                if let Some(cache) = &cache {
                    cache.parse_pending();
                }
                for group in &groups {
                    if group.role == GroupRole::NextPlay && exempt.get() {
                        core.show_all(&group.elements);
                        continue;
                    }
                    let stats = core.check_all(&group.elements, full_site, &selectors);
                    log::debug!("{kind} check_video_list ({:?}): {stats:?}", group.role);
                }
            })
        };

        let actions = kind
            .criteria()
            .iter()
            .map(|&criterion| (criterion, Action::new(kind, criterion, ctx, recheck.clone())))
            .collect();

        let module = Rc::new(RefCell::new(Self {
            kind,
            ctx: ctx.clone(),
            actions,
            recheck,
            next_play_exempt,
            ending_exempt: Cell::new(ctx.store.get_bool(ENDING_EXEMPT_KEY, true)),
            metadata,
        }));
        module.borrow().apply_unoffered();

        let weak: Weak<RefCell<Self>> = Rc::downgrade(&module);
        ctx.agency.subscribe(kind, move |event| {
            let Some(module) = weak.upgrade() else { return };
            match module.try_borrow_mut() {
                Ok(mut module) => module.resync(event),
                Err(_) => log::warn!("{kind}: busy, dropped {} resync", event.kind),
            };
        });

        module
    }

    pub fn kind(&self) -> PageKind {
        self.kind
    }

    pub fn action(&self, kind: CriterionKind) -> Option<&Action> {
        self.actions.get(&kind)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn metadata(&self) -> Option<&Rc<MetadataCache>> {
        self.metadata.as_ref()
    }

    fn action_mut(&mut self, kind: CriterionKind) -> Result<&mut Action, PageError> {
        let page = self.kind;
        self.actions
            .get_mut(&kind)
            .ok_or(PageError::UnknownCriterion { page, kind })
    }

    pub fn enable(&mut self, kind: CriterionKind) -> Result<(), PageError> {
        self.action_mut(kind)?.enable();
        Ok(())
    }

    pub fn disable(&mut self, kind: CriterionKind) -> Result<(), PageError> {
        self.action_mut(kind)?.disable();
        Ok(())
    }

    pub fn change(&mut self, kind: CriterionKind, value: f64) -> Result<(), PageError> {
        Ok(self.action_mut(kind)?.change(value)?)
    }

    pub fn add(&mut self, kind: CriterionKind, value: &str) -> Result<(), PageError> {
        Ok(self.action_mut(kind)?.add(value)?)
    }

    pub fn edit(&mut self, kind: CriterionKind, values: &[String]) -> Result<(), PageError> {
        Ok(self.action_mut(kind)?.edit(values)?)
    }

    pub fn show_editor(&self, kind: CriterionKind, editor: &dyn WordListEditor) -> Result<(), PageError> {
        let action = self
            .actions
            .get(&kind)
            .ok_or(PageError::UnknownCriterion { page: self.kind, kind })?;
        Ok(action.show(editor)?)
    }

    /// Run the page's check over its current cards.
    pub fn check_video_list(&self, full_site: bool) {
        (self.recheck)(full_site);
    }

    /// DOM mutation hook. Checks only while some blacklist action is enabled.
    pub fn on_mutation(&self) {
        let any_blacklist = self
            .actions
            .values()
            .any(|a| a.is_enabled() && !a.kind().is_whitelist());
        if any_blacklist {
            self.check_video_list(self.kind.mutation_full_site());
        }
    }

    /// Make this page's configuration the live one after navigating to it.
    pub fn activate(&self) {
        for action in self.actions.values() {
            action.apply();
        }
        self.apply_unoffered();
        log::debug!("{} page activated", self.kind);
    }

    pub fn is_next_play_exempt(&self) -> bool {
        self.next_play_exempt.get()
    }

    pub fn set_next_play_exempt(&self, exempt: bool) {
        self.next_play_exempt.set(exempt);
        self.ctx.store.put(NEXT_PLAY_EXEMPT_KEY, exempt);
        self.check_video_list(true);
    }

    pub fn is_ending_exempt(&self) -> bool {
        self.ending_exempt.get()
    }

    pub fn set_ending_exempt(&self, exempt: bool) {
        self.ending_exempt.set(exempt);
        self.ctx.store.put(ENDING_EXEMPT_KEY, exempt);
    }

    /// Verdicts for the player's end-screen recommendations, given the titles
    /// of side-list cards that are currently hidden. `true` hides the item.
    ///
    /// Returns `None` when the end screen is left alone: on pages other than
    /// the video page, or while end-screen items are exempt.
    pub fn ending_verdicts<S: AsRef<str>>(&self, hidden_titles: &[S], ending_titles: &[S]) -> Option<Vec<bool>> {
        if self.kind != PageKind::Video || self.ending_exempt.get() {
            return None;
        }
        let hidden: BTreeSet<&str> = hidden_titles
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .collect();
        let verdicts: Vec<bool> = ending_titles
            .iter()
            .map(|t| hidden.contains(t.as_ref().trim()))
            .collect();
        log::debug!(
            "ending: hiding {} of {} items",
            verdicts.iter().filter(|v| **v).count(),
            verdicts.len()
        );
        Some(verdicts)
    }

    /// Menu entries for a right-clicked target.
    pub fn context_menu(&self, target: &MenuTarget) -> Vec<MenuEntry> {
        let enabled = |kind: CriterionKind| self.actions.get(&kind).is_some_and(|a| a.is_enabled());
        let mut entries = Vec::new();

        match target {
            MenuTarget::Uploader { name, space_link } => {
                if !enabled(CriterionKind::Uploader) || name.trim().is_empty() {
                    return entries;
                }
                entries.push(MenuEntry::new(
                    format!("◎ 屏蔽UP主：{name}"),
                    MenuCommand::BlockUploader(name.clone()),
                ));
                if self.actions.contains_key(&CriterionKind::UploaderWhitelist) {
                    entries.push(MenuEntry::new(
                        "◎ 将UP主加入白名单".to_string(),
                        MenuCommand::WhitelistUploader(name.clone()),
                    ));
                }
                if let Some(link) = space_link {
                    entries.push(MenuEntry::new("◎ 复制主页链接".to_string(), MenuCommand::Copy(absolute(link))));
                }
            }
            MenuTarget::Video { bvid } => {
                if !enabled(CriterionKind::Bvid) || bvid.is_empty() {
                    return entries;
                }
                entries.push(MenuEntry::new(format!("◎ 屏蔽视频 {bvid}"), MenuCommand::BlockVideo(bvid.clone())));
                entries.push(MenuEntry::new(
                    "◎ 复制视频链接".to_string(),
                    MenuCommand::Copy(format!("https://www.bilibili.com/video/{bvid}")),
                ));
            }
        }

        entries
    }

    /// Execute a menu command. Returns clipboard text for copy commands.
    pub fn run_menu_command(&mut self, command: &MenuCommand) -> Result<Option<String>, PageError> {
        match command {
            MenuCommand::BlockUploader(name) => self.add(CriterionKind::Uploader, name)?,
            MenuCommand::WhitelistUploader(name) => self.add(CriterionKind::UploaderWhitelist, name)?,
            MenuCommand::BlockVideo(bvid) => self.add(CriterionKind::Bvid, bvid)?,
            MenuCommand::Copy(text) => return Ok(Some(text.clone())),
        }
        Ok(None)
    }

    /// Snapshot of this page's settings, keyed by criterion name.
    pub fn settings(&self) -> BTreeMap<&'static str, (bool, Option<StoredValue>)> {
        self.actions
            .values()
            .map(|a| (a.kind().as_str(), (a.is_enabled(), a.value())))
            .collect()
    }

    fn resync(&mut self, event: &AgencyEvent) {
        if let Some(action) = self.actions.get_mut(&event.kind) {
            action.resync(event);
        }
    }

    /// Criteria this page does not offer stay off while it is live.
    fn apply_unoffered(&self) {
        let mut registry = self.ctx.registry.borrow_mut();
        for kind in CriterionKind::ALL {
            if !self.actions.contains_key(&kind) {
                registry.configure(kind, false, None);
            }
        }
    }
}

impl fmt::Debug for PageModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageModule")
            .field("kind", &self.kind)
            .field("actions", &self.actions)
            .field("next_play_exempt", &self.next_play_exempt.get())
            .field("ending_exempt", &self.ending_exempt.get())
            .finish()
    }
}

fn absolute(link: &str) -> String {
    if link.starts_with("//") {
        format!("https:{link}")
    } else if link.starts_with("http") {
        link.to_string()
    } else {
        format!("https://{link}")
    }
}
