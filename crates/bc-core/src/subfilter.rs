//! Per-criterion subfilters and their registry
//!
//! A subfilter is an enable flag, parameters, and one predicate over a
//! [`VideoRecord`]. `matches` returning `true` means "hide" for blacklist
//! kinds and "keep visible" for whitelist kinds. A disabled subfilter, or one
//! whose field is missing from the record, never matches.

use std::collections::BTreeMap;

use crate::extract::parse_duration;
use crate::types::{CriterionKind, RecordFields, StoredValue, VideoRecord};
use crate::wordlist::{MatchMode, WordMatcher};

pub trait SubFilter {
    fn kind(&self) -> CriterionKind;
    fn is_enabled(&self) -> bool;
    fn set_status(&mut self, enabled: bool);
    /// Replace the parameters. Values of the wrong shape are ignored.
    fn set_params(&mut self, value: &StoredValue);
    fn matches(&self, record: &VideoRecord) -> bool;
}

// =============================================================================
// Duration
// =============================================================================

/// Hides videos shorter than `threshold` seconds.
#[derive(Debug, Clone, Default)]
pub struct DurationFilter {
    enabled: bool,
    threshold: u32,
}

impl SubFilter for DurationFilter {
    fn kind(&self) -> CriterionKind {
        CriterionKind::Duration
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_status(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_params(&mut self, value: &StoredValue) {
        if let Some(n) = value.as_number().filter(|n| n.is_finite()) {
            self.threshold = n.max(0.0) as u32;
        }
    }

    fn matches(&self, record: &VideoRecord) -> bool {
        if !self.enabled {
            return false;
        }
        match record.duration.as_deref().and_then(parse_duration) {
            Some(seconds) => seconds < self.threshold,
            None => false,
        }
    }
}

// =============================================================================
// Quality
// =============================================================================

/// Hides videos whose coin/like ratio is below `percent`%.
#[derive(Debug, Clone, Default)]
pub struct QualityFilter {
    enabled: bool,
    percent: f64,
}

impl SubFilter for QualityFilter {
    fn kind(&self) -> CriterionKind {
        CriterionKind::Quality
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_status(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_params(&mut self, value: &StoredValue) {
        if let Some(n) = value.as_number().filter(|n| n.is_finite()) {
            self.percent = n;
        }
    }

    fn matches(&self, record: &VideoRecord) -> bool {
        if !self.enabled {
            return false;
        }
        match record.coin_like_ratio {
            Some(ratio) if ratio.is_finite() && ratio >= 0.0 => ratio < self.percent / 100.0,
            _ => false,
        }
    }
}

// =============================================================================
// Dimension
// =============================================================================

/// Hides portrait videos.
#[derive(Debug, Clone, Default)]
pub struct DimensionFilter {
    enabled: bool,
}

impl SubFilter for DimensionFilter {
    fn kind(&self) -> CriterionKind {
        CriterionKind::Dimension
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_status(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_params(&mut self, _value: &StoredValue) {}

    fn matches(&self, record: &VideoRecord) -> bool {
        self.enabled && record.dimension == Some(false)
    }
}

// =============================================================================
// List-backed filters
// =============================================================================

/// Uploader, BV id and keyword filters, blacklist or whitelist.
#[derive(Debug, Clone)]
pub struct ListFilter {
    kind: CriterionKind,
    enabled: bool,
    matcher: WordMatcher,
}

impl ListFilter {
    pub fn new(kind: CriterionKind) -> Self {
        Self {
            kind,
            enabled: false,
            matcher: WordMatcher::empty(list_mode(kind)),
        }
    }

    fn field<'r>(&self, record: &'r VideoRecord) -> Option<&'r str> {
        let field = self.kind.field();
        if field == RecordFields::UPLOADER {
            record.uploader.as_deref()
        } else if field == RecordFields::TITLE {
            record.title_keyword.as_deref()
        } else if field == RecordFields::BVID {
            record.bvid.as_deref()
        } else {
            None
        }
    }
}

impl SubFilter for ListFilter {
    fn kind(&self) -> CriterionKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_status(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_params(&mut self, value: &StoredValue) {
        if let Some(values) = value.as_list() {
            self.matcher = WordMatcher::new(self.matcher.mode(), values);
        }
    }

    fn matches(&self, record: &VideoRecord) -> bool {
        if !self.enabled {
            return false;
        }
        match self.field(record) {
            Some(value) => self.matcher.is_match(value),
            None => false,
        }
    }
}

/// Match mode of the list behind a list-backed criterion.
pub fn list_mode(kind: CriterionKind) -> MatchMode {
    match kind {
        CriterionKind::UploaderKeyword | CriterionKind::TitleKeyword | CriterionKind::TitleKeywordWhitelist => {
            MatchMode::Pattern
        }
        _ => MatchMode::Literal,
    }
}

// =============================================================================
// Registry
// =============================================================================

/// One subfilter per criterion kind, shared by every page module.
pub struct SubFilterRegistry {
    filters: BTreeMap<CriterionKind, Box<dyn SubFilter>>,
}

impl SubFilterRegistry {
    pub fn new() -> Self {
        let mut filters: BTreeMap<CriterionKind, Box<dyn SubFilter>> = BTreeMap::new();
        for kind in CriterionKind::ALL {
            let filter: Box<dyn SubFilter> = match kind {
                CriterionKind::Duration => Box::new(DurationFilter::default()),
                CriterionKind::Quality => Box::new(QualityFilter::default()),
                CriterionKind::Dimension => Box::new(DimensionFilter::default()),
                _ => Box::new(ListFilter::new(kind)),
            };
            filters.insert(kind, filter);
        }
        Self { filters }
    }

    pub fn get(&self, kind: CriterionKind) -> &dyn SubFilter {
        // every kind is inserted in `new`
        &*self.filters[&kind]
    }

    pub fn get_mut(&mut self, kind: CriterionKind) -> &mut dyn SubFilter {
        self.filters
            .get_mut(&kind)
            .map(|f| &mut **f)
            .unwrap_or_else(|| unreachable!("registry holds every criterion kind"))
    }

    /// Push status and parameters into one subfilter.
    pub fn configure(&mut self, kind: CriterionKind, enabled: bool, params: Option<&StoredValue>) {
        let filter = self.get_mut(kind);
        filter.set_status(enabled);
        if let Some(params) = params {
            filter.set_params(params);
        }
    }

    /// Enabled blacklist subfilters.
    pub fn active_blacklist(&self) -> impl Iterator<Item = &dyn SubFilter> {
        self.filters
            .values()
            .filter(|f| f.is_enabled() && !f.kind().is_whitelist())
            .map(|f| &**f)
    }

    /// Enabled whitelist subfilters.
    pub fn active_whitelist(&self) -> impl Iterator<Item = &dyn SubFilter> {
        self.filters
            .values()
            .filter(|f| f.is_enabled() && f.kind().is_whitelist())
            .map(|f| &**f)
    }

    /// Record fields read by any enabled subfilter.
    pub fn required_fields(&self) -> RecordFields {
        self.filters
            .values()
            .filter(|f| f.is_enabled())
            .fold(RecordFields::empty(), |acc, f| acc | f.kind().field())
    }
}

impl Default for SubFilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[&str]) -> StoredValue {
        StoredValue::List(values.iter().map(|s| s.to_string()).collect())
    }

    fn enabled_registry(kind: CriterionKind, params: StoredValue) -> SubFilterRegistry {
        let mut registry = SubFilterRegistry::new();
        registry.configure(kind, true, Some(&params));
        registry
    }

    #[test]
    fn duration_threshold() {
        let registry = enabled_registry(CriterionKind::Duration, StoredValue::Number(60.0));
        let filter = registry.get(CriterionKind::Duration);

        let short = VideoRecord { duration: Some("00:59".into()), ..Default::default() };
        let exact = VideoRecord { duration: Some("60".into()), ..Default::default() };
        assert!(filter.matches(&short));
        assert!(!filter.matches(&exact));

        let long = VideoRecord { duration: Some("02:05".into()), ..Default::default() };
        assert!(!filter.matches(&long));

        let mut registry = enabled_registry(CriterionKind::Duration, StoredValue::Number(200.0));
        let raw = VideoRecord { duration: Some("125".into()), ..Default::default() };
        assert!(registry.get(CriterionKind::Duration).matches(&raw));
        registry.configure(CriterionKind::Duration, false, None);
        assert!(!registry.get(CriterionKind::Duration).matches(&raw));
    }

    #[test]
    fn duration_unknown_never_matches() {
        let registry = enabled_registry(CriterionKind::Duration, StoredValue::Number(60.0));
        let filter = registry.get(CriterionKind::Duration);
        assert!(!filter.matches(&VideoRecord::default()));
        assert!(!filter.matches(&VideoRecord { duration: Some("直播".into()), ..Default::default() }));
    }

    #[test]
    fn quality_ratio_cutoff() {
        let registry = enabled_registry(CriterionKind::Quality, StoredValue::Number(25.0));
        let filter = registry.get(CriterionKind::Quality);

        assert!(filter.matches(&VideoRecord { coin_like_ratio: Some(0.1), ..Default::default() }));
        assert!(!filter.matches(&VideoRecord { coin_like_ratio: Some(0.3), ..Default::default() }));
        assert!(!filter.matches(&VideoRecord { coin_like_ratio: None, ..Default::default() }));
        assert!(!filter.matches(&VideoRecord { coin_like_ratio: Some(f64::NAN), ..Default::default() }));
        assert!(!filter.matches(&VideoRecord { coin_like_ratio: Some(-1.0), ..Default::default() }));
    }

    #[test]
    fn dimension_hides_portrait_only() {
        let registry = enabled_registry(CriterionKind::Dimension, StoredValue::Bool(true));
        let filter = registry.get(CriterionKind::Dimension);
        assert!(filter.matches(&VideoRecord { dimension: Some(false), ..Default::default() }));
        assert!(!filter.matches(&VideoRecord { dimension: Some(true), ..Default::default() }));
        assert!(!filter.matches(&VideoRecord::default()));
    }

    #[test]
    fn bvid_is_case_sensitive() {
        let registry = enabled_registry(CriterionKind::Bvid, list(&["BV1xx411c7mD"]));
        let filter = registry.get(CriterionKind::Bvid);
        assert!(filter.matches(&VideoRecord { bvid: Some("BV1xx411c7mD".into()), ..Default::default() }));
        assert!(!filter.matches(&VideoRecord { bvid: Some("BV1xx411c7md".into()), ..Default::default() }));
    }

    #[test]
    fn keyword_filters_read_their_own_field() {
        let registry = enabled_registry(CriterionKind::UploaderKeyword, list(&["营销号"]));
        let filter = registry.get(CriterionKind::UploaderKeyword);
        let record = VideoRecord {
            title_keyword: Some("营销号".into()),
            uploader: Some("普通人".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&record));
        assert!(filter.matches(&VideoRecord { uploader: Some("某营销号官方".into()), ..Default::default() }));
    }

    #[test]
    fn disabled_filters_never_match() {
        let mut registry = SubFilterRegistry::new();
        registry.configure(CriterionKind::Uploader, false, Some(&list(&["someone"])));
        let record = VideoRecord { uploader: Some("someone".into()), ..Default::default() };
        assert!(!registry.get(CriterionKind::Uploader).matches(&record));
    }

    #[test]
    fn missing_field_never_matches_for_any_kind() {
        let mut registry = SubFilterRegistry::new();
        for kind in CriterionKind::ALL {
            let params = match kind {
                CriterionKind::Duration => StoredValue::Number(300.0),
                CriterionKind::Quality => StoredValue::Number(80.0),
                CriterionKind::Dimension => StoredValue::Bool(true),
                _ => list(&["/.*/", "a"]),
            };
            registry.configure(kind, true, Some(&params));
        }
        for kind in CriterionKind::ALL {
            assert!(!registry.get(kind).matches(&VideoRecord::default()), "{kind} matched an empty record");
        }
    }

    #[test]
    fn wrong_param_shape_is_ignored() {
        let mut registry = enabled_registry(CriterionKind::Duration, StoredValue::Number(60.0));
        registry.configure(CriterionKind::Duration, true, Some(&list(&["x"])));
        let record = VideoRecord { duration: Some("30".into()), ..Default::default() };
        assert!(registry.get(CriterionKind::Duration).matches(&record));
    }

    #[test]
    fn registry_partitions_active_filters() {
        let mut registry = SubFilterRegistry::new();
        registry.configure(CriterionKind::Duration, true, None);
        registry.configure(CriterionKind::UploaderWhitelist, true, None);
        assert_eq!(registry.active_blacklist().count(), 1);
        assert_eq!(registry.active_whitelist().count(), 1);
        assert_eq!(
            registry.required_fields(),
            RecordFields::DURATION | RecordFields::UPLOADER
        );
    }
}
