//! Filter Core
//!
//! Combines every enabled subfilter into one verdict per video card and
//! applies it. Order per element:
//!
//! 1. Extract a [`VideoRecord`] with the selectors the page supplies, reading
//!    only fields some enabled subfilter needs.
//! 2. Hide if any enabled blacklist subfilter matches.
//! 3. A matching enabled whitelist subfilter overrides a hide verdict.
//! 4. Apply show/hide (no-op when already in that state) and mark the element.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::subfilter::SubFilterRegistry;
use crate::types::{RecordFields, Verdict, VideoRecord};

/// Attribute set on cards that have been evaluated.
pub const FILTER_SIGN: &str = "bili-cleaner-filtered";

// =============================================================================
// Elements and Selectors
// =============================================================================

/// Handle to one video card in the page.
pub trait VideoElement {
    fn is_hidden(&self) -> bool;
    fn hide(&self);
    fn show(&self);
    fn is_processed(&self) -> bool;
    fn mark_processed(&self);
}

pub type TextSelector<E> = Rc<dyn Fn(&E) -> Option<String>>;
pub type FlagSelector<E> = Rc<dyn Fn(&E) -> Option<bool>>;
pub type NumberSelector<E> = Rc<dyn Fn(&E) -> Option<f64>>;

/// Per-page field extraction functions. Missing selectors mean the page
/// cannot supply that field.
pub struct SelectorSet<E> {
    pub title_keyword: Option<TextSelector<E>>,
    pub bvid: Option<TextSelector<E>>,
    pub uploader: Option<TextSelector<E>>,
    pub duration: Option<TextSelector<E>>,
    pub dimension: Option<FlagSelector<E>>,
    pub coin_like_ratio: Option<NumberSelector<E>>,
}

impl<E> Clone for SelectorSet<E> {
    fn clone(&self) -> Self {
        Self {
            title_keyword: self.title_keyword.clone(),
            bvid: self.bvid.clone(),
            uploader: self.uploader.clone(),
            duration: self.duration.clone(),
            dimension: self.dimension.clone(),
            coin_like_ratio: self.coin_like_ratio.clone(),
        }
    }
}

impl<E> Default for SelectorSet<E> {
    fn default() -> Self {
        Self {
            title_keyword: None,
            bvid: None,
            uploader: None,
            duration: None,
            dimension: None,
            coin_like_ratio: None,
        }
    }
}

impl<E> SelectorSet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, f: impl Fn(&E) -> Option<String> + 'static) -> Self {
        self.title_keyword = Some(Rc::new(f));
        self
    }

    pub fn with_bvid(mut self, f: impl Fn(&E) -> Option<String> + 'static) -> Self {
        self.bvid = Some(Rc::new(f));
        self
    }

    pub fn with_uploader(mut self, f: impl Fn(&E) -> Option<String> + 'static) -> Self {
        self.uploader = Some(Rc::new(f));
        self
    }

    pub fn with_duration(mut self, f: impl Fn(&E) -> Option<String> + 'static) -> Self {
        self.duration = Some(Rc::new(f));
        self
    }

    pub fn with_dimension(mut self, f: impl Fn(&E) -> Option<bool> + 'static) -> Self {
        self.dimension = Some(Rc::new(f));
        self
    }

    pub fn with_coin_like_ratio(mut self, f: impl Fn(&E) -> Option<f64> + 'static) -> Self {
        self.coin_like_ratio = Some(Rc::new(f));
        self
    }

    /// Fields this page can extract.
    pub fn supplied(&self) -> RecordFields {
        let mut fields = RecordFields::empty();
        fields.set(RecordFields::TITLE, self.title_keyword.is_some());
        fields.set(RecordFields::BVID, self.bvid.is_some());
        fields.set(RecordFields::UPLOADER, self.uploader.is_some());
        fields.set(RecordFields::DURATION, self.duration.is_some());
        fields.set(RecordFields::DIMENSION, self.dimension.is_some());
        fields.set(RecordFields::COIN_LIKE_RATIO, self.coin_like_ratio.is_some());
        fields
    }

    /// Run the selectors for `wanted` fields only.
    pub fn extract(&self, element: &E, wanted: RecordFields) -> VideoRecord {
        fn run<E, T>(selector: &Option<Rc<dyn Fn(&E) -> Option<T>>>, element: &E, on: bool) -> Option<T> {
            if !on {
                return None;
            }
            selector.as_ref().and_then(|f| f(element))
        }

        VideoRecord {
            title_keyword: run(&self.title_keyword, element, wanted.contains(RecordFields::TITLE)),
            bvid: run(&self.bvid, element, wanted.contains(RecordFields::BVID)),
            uploader: run(&self.uploader, element, wanted.contains(RecordFields::UPLOADER)),
            duration: run(&self.duration, element, wanted.contains(RecordFields::DURATION)),
            dimension: run(&self.dimension, element, wanted.contains(RecordFields::DIMENSION)),
            coin_like_ratio: run(&self.coin_like_ratio, element, wanted.contains(RecordFields::COIN_LIKE_RATIO)),
        }
    }
}

// =============================================================================
// Filter Core
// =============================================================================

/// Counters from one `check_all` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckStats {
    pub checked: usize,
    pub skipped: usize,
    pub hidden: usize,
    pub shown: usize,
}

pub struct FilterCore {
    registry: Rc<RefCell<SubFilterRegistry>>,
    suspended: Cell<bool>,
}

impl FilterCore {
    pub fn new(registry: Rc<RefCell<SubFilterRegistry>>) -> Self {
        Self {
            registry,
            suspended: Cell::new(false),
        }
    }

    pub fn registry(&self) -> &Rc<RefCell<SubFilterRegistry>> {
        &self.registry
    }

    /// While suspended every checked element is shown.
    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.set(suspended);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    /// Verdict for one record against the current registry state.
    pub fn evaluate(&self, record: &VideoRecord) -> Verdict {
        if self.suspended.get() {
            return Verdict::Show;
        }

        let registry = self.registry.borrow();
        let blacklisted = registry.active_blacklist().any(|f| f.matches(record));
        if !blacklisted {
            return Verdict::Show;
        }
        if registry.active_whitelist().any(|f| f.matches(record)) {
            return Verdict::Show;
        }
        Verdict::Hide
    }

    /// Evaluate and apply every element. Incremental passes skip elements
    /// already marked; full-site passes redo everything.
    pub fn check_all<E: VideoElement>(&self, elements: &[E], full_site: bool, selectors: &SelectorSet<E>) -> CheckStats {
        let mut stats = CheckStats::default();
        let wanted = self.registry.borrow().required_fields() & selectors.supplied();

        for element in elements {
            if !full_site && element.is_processed() {
                stats.skipped += 1;
                continue;
            }

            let record = selectors.extract(element, wanted);
            match self.evaluate(&record) {
                Verdict::Hide => {
                    if !element.is_hidden() {
                        element.hide();
                    }
                    stats.hidden += 1;
                }
                Verdict::Show => {
                    if element.is_hidden() {
                        element.show();
                    }
                    stats.shown += 1;
                }
            }
            element.mark_processed();
            stats.checked += 1;
        }

        stats
    }

    /// Reveal elements that are exempt from filtering.
    pub fn show_all<E: VideoElement>(&self, elements: &[E]) {
        for element in elements {
            if element.is_hidden() {
                element.show();
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{CriterionKind, StoredValue};

    /// In-memory card used by the engine tests. Clones share state, like
    /// two handles to the same DOM node.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct TestCard {
        pub record: VideoRecord,
        pub hidden: Rc<Cell<bool>>,
        pub processed: Rc<Cell<bool>>,
        pub writes: Rc<Cell<usize>>,
    }

    impl TestCard {
        pub fn new(record: VideoRecord) -> Self {
            Self {
                record,
                ..Default::default()
            }
        }
    }

    impl VideoElement for TestCard {
        fn is_hidden(&self) -> bool {
            self.hidden.get()
        }

        fn hide(&self) {
            self.hidden.set(true);
            self.writes.set(self.writes.get() + 1);
        }

        fn show(&self) {
            self.hidden.set(false);
            self.writes.set(self.writes.get() + 1);
        }

        fn is_processed(&self) -> bool {
            self.processed.get()
        }

        fn mark_processed(&self) {
            self.processed.set(true);
        }
    }

    pub(crate) fn full_selectors() -> SelectorSet<TestCard> {
        SelectorSet::new()
            .with_title(|c: &TestCard| c.record.title_keyword.clone())
            .with_bvid(|c: &TestCard| c.record.bvid.clone())
            .with_uploader(|c: &TestCard| c.record.uploader.clone())
            .with_duration(|c: &TestCard| c.record.duration.clone())
            .with_dimension(|c: &TestCard| c.record.dimension)
            .with_coin_like_ratio(|c: &TestCard| c.record.coin_like_ratio)
    }

    fn list(values: &[&str]) -> StoredValue {
        StoredValue::List(values.iter().map(|s| s.to_string()).collect())
    }

    fn core_with(configs: &[(CriterionKind, StoredValue)]) -> FilterCore {
        let mut registry = SubFilterRegistry::new();
        for (kind, value) in configs {
            registry.configure(*kind, true, Some(value));
        }
        FilterCore::new(Rc::new(RefCell::new(registry)))
    }

    fn card(uploader: &str, title: &str) -> TestCard {
        TestCard::new(VideoRecord {
            uploader: Some(uploader.into()),
            title_keyword: Some(title.into()),
            ..Default::default()
        })
    }

    #[test]
    fn any_blacklist_hides() {
        let core = core_with(&[
            (CriterionKind::Uploader, list(&["spam"])),
            (CriterionKind::TitleKeyword, list(&["广告"])),
        ]);
        let cards = [card("spam", "ok"), card("fine", "这是广告"), card("fine", "ok")];
        let stats = core.check_all(&cards, true, &full_selectors());

        assert!(cards[0].is_hidden());
        assert!(cards[1].is_hidden());
        assert!(!cards[2].is_hidden());
        assert_eq!(stats, CheckStats { checked: 3, skipped: 0, hidden: 2, shown: 1 });
    }

    #[test]
    fn whitelist_beats_blacklist() {
        let core = core_with(&[
            (CriterionKind::TitleKeyword, list(&["/测评/"])),
            (CriterionKind::UploaderWhitelist, list(&["trusted"])),
            (CriterionKind::TitleKeywordWhitelist, list(&["深度"])),
        ]);
        let cards = [
            card("trusted", "手机测评"),
            card("other", "深度测评"),
            card("other", "手机测评"),
        ];
        core.check_all(&cards, true, &full_selectors());

        assert!(!cards[0].is_hidden());
        assert!(!cards[1].is_hidden());
        assert!(cards[2].is_hidden());
    }

    #[test]
    fn disabled_whitelist_does_not_override() {
        let core = core_with(&[(CriterionKind::Uploader, list(&["a"]))]);
        core.registry()
            .borrow_mut()
            .configure(CriterionKind::UploaderWhitelist, false, Some(&list(&["a"])));
        let cards = [card("a", "t")];
        core.check_all(&cards, true, &full_selectors());
        assert!(cards[0].is_hidden());
    }

    #[test]
    fn missing_fields_are_shown() {
        let core = core_with(&[
            (CriterionKind::Duration, StoredValue::Number(300.0)),
            (CriterionKind::Quality, StoredValue::Number(80.0)),
            (CriterionKind::Dimension, StoredValue::Bool(true)),
        ]);
        let cards = [TestCard::new(VideoRecord {
            duration: Some("10".into()),
            coin_like_ratio: Some(0.0),
            dimension: Some(false),
            ..Default::default()
        })];
        // this page cannot read any of the fields the enabled filters need
        let selectors = SelectorSet::new().with_title(|c: &TestCard| c.record.title_keyword.clone());
        core.check_all(&cards, true, &selectors);
        assert!(!cards[0].is_hidden());
    }

    #[test]
    fn incremental_skips_processed() {
        let core = core_with(&[(CriterionKind::Uploader, list(&["a"]))]);
        let cards = [card("a", "t"), card("b", "t")];
        core.check_all(&cards, false, &full_selectors());

        core.registry()
            .borrow_mut()
            .configure(CriterionKind::Uploader, true, Some(&list(&["b"])));

        let stats = core.check_all(&cards, false, &full_selectors());
        assert_eq!(stats.skipped, 2);
        assert!(cards[0].is_hidden());
        assert!(!cards[1].is_hidden());

        core.check_all(&cards, true, &full_selectors());
        assert!(!cards[0].is_hidden());
        assert!(cards[1].is_hidden());
    }

    #[test]
    fn reapplying_same_verdict_does_not_touch_element() {
        let core = core_with(&[(CriterionKind::Uploader, list(&["a"]))]);
        let cards = [card("a", "t"), card("b", "t")];
        core.check_all(&cards, true, &full_selectors());
        core.check_all(&cards, true, &full_selectors());
        assert_eq!(cards[0].writes.get(), 1);
        assert_eq!(cards[1].writes.get(), 0);
    }

    #[test]
    fn suspended_core_shows_everything() {
        let core = core_with(&[(CriterionKind::Uploader, list(&["a"]))]);
        let cards = [card("a", "t")];
        core.check_all(&cards, true, &full_selectors());
        assert!(cards[0].is_hidden());

        core.set_suspended(true);
        core.check_all(&cards, true, &full_selectors());
        assert!(!cards[0].is_hidden());
    }

    #[test]
    fn extract_reads_only_wanted_fields() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let selectors = SelectorSet::new()
            .with_title(move |c: &TestCard| {
                counter.set(counter.get() + 1);
                c.record.title_keyword.clone()
            })
            .with_uploader(|c: &TestCard| c.record.uploader.clone());

        let record = selectors.extract(&card("u", "t"), RecordFields::UPLOADER);
        assert_eq!(record.uploader.as_deref(), Some("u"));
        assert_eq!(record.title_keyword, None);
        assert_eq!(calls.get(), 0);
    }
}
