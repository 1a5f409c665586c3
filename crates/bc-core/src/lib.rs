//! BiliCleaner Core Library
//!
//! This crate provides the video filter engine for the BiliCleaner userscript.
//! It has no platform dependencies: the host hands it video card handles,
//! per-page field selectors and a key-value store, and the engine decides
//! which cards to hide.
//!
//! # Architecture
//!
//! Each filtering criterion has one subfilter in a shared registry. Page
//! modules own one action per criterion they offer; actions persist settings,
//! configure the registry and ask their page to recheck. The filter core
//! combines the enabled subfilters into a verdict per card, with whitelists
//! overriding blacklists. The agency carries shared value changes between
//! page modules.
//!
//! # Modules
//!
//! - `types`: Criterion kinds, video records, stored values
//! - `extract`: BV id, duration and ratio helpers for selectors
//! - `storage`: Namespaced key-value store trait
//! - `wordlist`: Persisted word lists and their matchers
//! - `subfilter`: Per-criterion predicates and the registry
//! - `filter`: The check loop over video cards
//! - `action`: Per-page, per-criterion settings
//! - `agency`: Cross-page change fan-out
//! - `page`: Page kinds and page modules
//! - `metadata`: Popular-page API response cache
//! - `nav`: URL polling

pub mod action;
pub mod agency;
pub mod extract;
pub mod filter;
pub mod metadata;
pub mod nav;
pub mod page;
pub mod storage;
pub mod subfilter;
pub mod types;
pub mod wordlist;

// Re-export commonly used types
pub use action::{Action, ActionError, FilterContext};
pub use agency::{Agency, AgencyEvent, Change};
pub use extract::{coin_like_ratio, match_bvid, parse_duration};
pub use filter::{CheckStats, FilterCore, SelectorSet, VideoElement, FILTER_SIGN};
pub use metadata::{is_tracked_api, MetadataCache};
pub use nav::{NavigationWatcher, POLL_INTERVAL};
pub use page::{GroupRole, MenuCommand, MenuEntry, MenuTarget, PageError, PageKind, PageModule, VideoGroup, VideoSource};
pub use storage::{KvStore, KvStoreExt, MemoryStore, KEY_PREFIX};
pub use types::{CriterionKind, RecordFields, StoredValue, Verdict, VideoRecord};
pub use wordlist::{EditorRequest, MatchMode, WordList, WordListEditor};
