//! Persisted blacklists and whitelists
//!
//! A [`WordList`] is an ordered, deduplicated list of entries backed by one
//! storage key. A [`WordMatcher`] is the compiled form used for matching:
//!
//! - `Literal` lists compare verbatim (case-sensitive): BV ids, uploader names.
//! - `Pattern` lists do a case-insensitive substring test per entry, or a
//!   case-insensitive, multi-line regex test when the entry is written as `/pattern/`.

use std::collections::HashSet;
use std::rc::Rc;

use regex::{Regex, RegexBuilder};

use crate::storage::{KvStore, KvStoreExt};

// =============================================================================
// Matching
// =============================================================================

/// How entries of a list are compared against a candidate string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Literal,
    Pattern,
}

#[derive(Debug, Clone)]
enum CompiledEntry {
    Exact(String),
    Substring(String),
    Regex(Regex),
}

/// Compiled, matchable form of a list.
#[derive(Debug, Clone)]
pub struct WordMatcher {
    mode: MatchMode,
    entries: Vec<CompiledEntry>,
}

impl WordMatcher {
    pub fn new(mode: MatchMode, values: &[String]) -> Self {
        let entries = values
            .iter()
            .filter_map(|value| compile_entry(mode, value))
            .collect();
        Self { mode, entries }
    }

    pub fn empty(mode: MatchMode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First matching entry wins.
    pub fn is_match(&self, candidate: &str) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        let mut lowered: Option<String> = None;
        for entry in &self.entries {
            let hit = match entry {
                CompiledEntry::Exact(value) => value == candidate,
                CompiledEntry::Substring(needle) => lowered
                    .get_or_insert_with(|| candidate.to_lowercase())
                    .contains(needle.as_str()),
                CompiledEntry::Regex(re) => re.is_match(candidate),
            };
            if hit {
                return true;
            }
        }
        false
    }
}

/// Inner pattern of a `/pattern/` entry.
pub fn regex_literal(entry: &str) -> Option<&str> {
    let inner = entry.strip_prefix('/')?.strip_suffix('/')?;
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

fn compile_entry(mode: MatchMode, value: &str) -> Option<CompiledEntry> {
    match mode {
        MatchMode::Literal => Some(CompiledEntry::Exact(value.to_string())),
        MatchMode::Pattern => match regex_literal(value) {
            Some(pattern) => match RegexBuilder::new(pattern)
                .case_insensitive(true)
                .multi_line(true)
                .build()
            {
                Ok(re) => Some(CompiledEntry::Regex(re)),
                Err(e) => {
                    log::warn!("skipping invalid regex entry {value:?}: {e}");
                    None
                }
            },
            None => Some(CompiledEntry::Substring(value.to_lowercase())),
        },
    }
}

// =============================================================================
// Editor
// =============================================================================

/// What the editor UI needs to display a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorRequest<'a> {
    pub key: &'a str,
    pub label: &'a str,
    pub description: &'a str,
    pub entries: &'a [String],
}

/// External editor surface. On save the host calls the owning action's `edit`.
pub trait WordListEditor {
    fn show(&self, request: EditorRequest<'_>);
}

// =============================================================================
// Word List
// =============================================================================

/// Change callback, invoked with the full ordered entries after each mutation.
pub type ChangeCallback = Box<dyn Fn(&[String])>;

pub struct WordList {
    key: String,
    label: String,
    description: String,
    mode: MatchMode,
    entries: Vec<String>,
    matcher: WordMatcher,
    store: Rc<dyn KvStore>,
    on_change: Option<ChangeCallback>,
}

impl WordList {
    /// Load a list from `store` under the logical key `key`.
    pub fn load(key: &str, label: &str, mode: MatchMode, store: Rc<dyn KvStore>) -> Self {
        let entries = normalize(store.get_list(key));
        let matcher = WordMatcher::new(mode, &entries);
        Self {
            key: key.to_string(),
            label: label.to_string(),
            description: default_description(mode).to_string(),
            mode,
            entries,
            matcher,
            store,
            on_change: None,
        }
    }

    pub fn with_on_change(mut self, callback: ChangeCallback) -> Self {
        self.on_change = Some(callback);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn matcher(&self) -> &WordMatcher {
        &self.matcher
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.matcher.is_match(candidate)
    }

    /// Append one entry. Returns `false` when it was empty or already present.
    pub fn add_value(&mut self, raw: &str) -> bool {
        let value = raw.trim();
        if value.is_empty() || self.entries.iter().any(|e| e == value) {
            return false;
        }
        self.entries.push(value.to_string());
        self.commit();
        true
    }

    /// Replace all entries (editor save).
    pub fn edit(&mut self, values: &[String]) {
        self.entries = normalize(values.to_vec());
        self.commit();
    }

    /// Ask the editor to display the current entries.
    pub fn show(&self, editor: &dyn WordListEditor) {
        editor.show(EditorRequest {
            key: &self.key,
            label: &self.label,
            description: &self.description,
            entries: &self.entries,
        });
    }

    /// Re-read the entries from the store. Nothing is written and the change
    /// callback is not invoked.
    pub fn reload(&mut self) {
        self.entries = normalize(self.store.get_list(&self.key));
        self.matcher = WordMatcher::new(self.mode, &self.entries);
    }

    fn commit(&mut self) {
        self.matcher = WordMatcher::new(self.mode, &self.entries);
        self.store.put(&self.key, self.entries.clone());
        if let Some(callback) = &self.on_change {
            callback(&self.entries);
        }
    }
}

impl std::fmt::Debug for WordList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordList")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("mode", &self.mode)
            .field("entries", &self.entries)
            .finish()
    }
}

fn default_description(mode: MatchMode) -> &'static str {
    match mode {
        MatchMode::Literal => "每行一项，保存时自动去重",
        MatchMode::Pattern => "每行一个关键词或正则，不区分大小写\n正则语法：/abc|\\d+/",
    }
}

/// Trim, drop empty lines, dedupe keeping first occurrence.
pub fn normalize(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::storage::MemoryStore;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pattern_anchors_match_at_line_breaks() {
        let matcher = WordMatcher::new(MatchMode::Pattern, &strings(&["/^spam$/"]));
        assert!(matcher.is_match("first line\nSPAM\nlast line"));
        assert!(!matcher.is_match("no spam here"));
    }

    #[test]
    fn pattern_regex_entry_is_case_insensitive_and_anchored() {
        let matcher = WordMatcher::new(MatchMode::Pattern, &strings(&["/^foo/"]));
        assert!(matcher.is_match("FooBar"));
        assert!(!matcher.is_match("barfoo"));
    }

    #[test]
    fn pattern_plain_entry_is_substring() {
        let matcher = WordMatcher::new(MatchMode::Pattern, &strings(&["foo"]));
        assert!(matcher.is_match("xFOOy"));
        assert!(!matcher.is_match("fo o"));
    }

    #[test]
    fn pattern_handles_unicode() {
        let matcher = WordMatcher::new(MatchMode::Pattern, &strings(&["/原神|\\d{4}/", "抽卡"]));
        assert!(matcher.is_match("今天的原神"));
        assert!(matcher.is_match("2024年度总结"));
        assert!(matcher.is_match("十连抽卡"));
        assert!(!matcher.is_match("日常"));
    }

    #[test]
    fn invalid_regex_is_skipped() {
        let matcher = WordMatcher::new(MatchMode::Pattern, &strings(&["/(unclosed/", "ok"]));
        assert!(matcher.is_match("this is OK"));
        assert!(!matcher.is_match("(unclosed"));
    }

    #[test]
    fn lone_slashes_are_literal() {
        let matcher = WordMatcher::new(MatchMode::Pattern, &strings(&["//", "/"]));
        assert!(matcher.is_match("a//b"));
    }

    #[test]
    fn literal_mode_is_exact_and_case_sensitive() {
        let matcher = WordMatcher::new(MatchMode::Literal, &strings(&["BV1xx411c7mD"]));
        assert!(matcher.is_match("BV1xx411c7mD"));
        assert!(!matcher.is_match("BV1xx411c7md"));
        assert!(!matcher.is_match("xBV1xx411c7mD"));
    }

    #[test]
    fn add_value_trims_and_dedupes() {
        let store: Rc<dyn KvStore> = Rc::new(MemoryStore::new());
        let mut list = WordList::load("global-uploader-filter-value", "UP主 黑名单", MatchMode::Literal, store.clone());

        assert!(list.add_value("  someone "));
        assert!(!list.add_value("someone"));
        assert!(!list.add_value("   "));
        assert!(list.add_value("Someone"));
        assert_eq!(list.entries(), &strings(&["someone", "Someone"]));
        assert_eq!(store.get_list("global-uploader-filter-value"), strings(&["someone", "Someone"]));
    }

    #[test]
    fn edit_round_trips_first_occurrence_order() {
        let store: Rc<dyn KvStore> = Rc::new(MemoryStore::new());
        let mut list = WordList::load("k", "l", MatchMode::Pattern, store.clone());
        list.edit(&strings(&["b", " a", "", "b", "c ", "a"]));
        assert_eq!(list.entries(), &strings(&["b", "a", "c"]));

        let reloaded = WordList::load("k", "l", MatchMode::Pattern, store);
        assert_eq!(reloaded.entries(), list.entries());
    }

    #[test]
    fn edit_is_idempotent() {
        let store: Rc<dyn KvStore> = Rc::new(MemoryStore::new());
        let mut list = WordList::load("k", "l", MatchMode::Literal, store);
        let input = strings(&["x", "y", "x"]);
        list.edit(&input);
        let first = list.entries().to_vec();
        list.edit(&input);
        assert_eq!(list.entries(), first.as_slice());
    }

    #[test]
    fn change_callback_sees_full_entries() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let store: Rc<dyn KvStore> = Rc::new(MemoryStore::new());
        let mut list = WordList::load("k", "l", MatchMode::Literal, store)
            .with_on_change(Box::new(move |entries| sink.borrow_mut().push(entries.to_vec())));

        list.add_value("a");
        list.add_value("a");
        list.edit(&strings(&["a", "b"]));

        assert_eq!(*seen.borrow(), vec![strings(&["a"]), strings(&["a", "b"])]);
    }

    #[test]
    fn show_passes_entries_to_editor() {
        struct Recorder(RefCell<Option<(String, Vec<String>)>>);
        impl WordListEditor for Recorder {
            fn show(&self, request: EditorRequest<'_>) {
                *self.0.borrow_mut() = Some((request.label.to_string(), request.entries.to_vec()));
            }
        }

        let store: Rc<dyn KvStore> = Rc::new(MemoryStore::new());
        let mut list = WordList::load("k", "BV号 黑名单", MatchMode::Literal, store);
        list.add_value("BV1xx411c7mD");

        let editor = Recorder(RefCell::new(None));
        list.show(&editor);
        assert_eq!(
            editor.0.into_inner(),
            Some(("BV号 黑名单".to_string(), strings(&["BV1xx411c7mD"])))
        );
    }

    #[test]
    fn load_normalizes_stored_entries() {
        let store: Rc<dyn KvStore> = Rc::new(MemoryStore::new());
        store.put("k", strings(&["a", "a ", ""]));
        let list = WordList::load("k", "l", MatchMode::Literal, store);
        assert_eq!(list.entries(), &strings(&["a"]));
    }

    #[test]
    fn reload_picks_up_external_writes_silently() {
        let store: Rc<dyn KvStore> = Rc::new(MemoryStore::new());
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        let mut list = WordList::load("k", "l", MatchMode::Pattern, store.clone())
            .with_on_change(Box::new(move |_| *counter.borrow_mut() += 1));

        store.put("k", strings(&["/^foo/"]));
        assert!(!list.is_match("foobar"));
        list.reload();
        assert!(list.is_match("FOObar"));
        assert_eq!(*calls.borrow(), 0);
    }
}
