//! Core type definitions for BiliCleaner
//!
//! These types are shared by the subfilters, the filter core, the actions
//! and the persisted configuration.

use serde::{Deserialize, Serialize};

// =============================================================================
// Criterion Kinds
// =============================================================================

/// One filtering criterion. Each kind has exactly one subfilter in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CriterionKind {
    /// Minimum duration in seconds
    Duration = 0,
    /// Exact uploader name blacklist
    Uploader = 1,
    /// Uploader name keyword/regex blacklist
    UploaderKeyword = 2,
    /// Title keyword/regex blacklist
    TitleKeyword = 3,
    /// Exact BV id blacklist
    Bvid = 4,
    /// Portrait video filter
    Dimension = 5,
    /// Coin/like ratio cutoff
    Quality = 6,
    /// Exact uploader name whitelist (overrides blacklists)
    UploaderWhitelist = 7,
    /// Title keyword/regex whitelist (overrides blacklists)
    TitleKeywordWhitelist = 8,
}

impl CriterionKind {
    pub const ALL: [CriterionKind; 9] = [
        Self::Duration,
        Self::Uploader,
        Self::UploaderKeyword,
        Self::TitleKeyword,
        Self::Bvid,
        Self::Dimension,
        Self::Quality,
        Self::UploaderWhitelist,
        Self::TitleKeywordWhitelist,
    ];

    /// Name used in storage keys and by the bindings.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Duration => "duration",
            Self::Uploader => "uploader",
            Self::UploaderKeyword => "uploader-keyword",
            Self::TitleKeyword => "title-keyword",
            Self::Bvid => "bvid",
            Self::Dimension => "dimension",
            Self::Quality => "quality",
            Self::UploaderWhitelist => "uploader-whitelist",
            Self::TitleKeywordWhitelist => "title-keyword-whitelist",
        }
    }

    /// Parse the storage/binding name.
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Whitelist kinds never hide; they only rescue blacklisted records.
    pub fn is_whitelist(self) -> bool {
        matches!(self, Self::UploaderWhitelist | Self::TitleKeywordWhitelist)
    }

    /// The record field this criterion reads.
    pub fn field(self) -> RecordFields {
        match self {
            Self::Duration => RecordFields::DURATION,
            Self::Uploader | Self::UploaderKeyword | Self::UploaderWhitelist => RecordFields::UPLOADER,
            Self::TitleKeyword | Self::TitleKeywordWhitelist => RecordFields::TITLE,
            Self::Bvid => RecordFields::BVID,
            Self::Dimension => RecordFields::DIMENSION,
            Self::Quality => RecordFields::COIN_LIKE_RATIO,
        }
    }
}

impl TryFrom<u8> for CriterionKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or(())
    }
}

impl std::fmt::Display for CriterionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Record Fields (bit mask of extractable fields)
// =============================================================================

bitflags::bitflags! {
    /// Fields a page can extract from a video card.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RecordFields: u8 {
        const TITLE = 1 << 0;
        const BVID = 1 << 1;
        const UPLOADER = 1 << 2;
        const DURATION = 1 << 3;
        const DIMENSION = 1 << 4;
        const COIN_LIKE_RATIO = 1 << 5;

        const ALL = 0x3F;
    }
}

// =============================================================================
// Video Record
// =============================================================================

/// Fields scraped from one video card. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    #[serde(default)]
    pub title_keyword: Option<String>,
    #[serde(default)]
    pub bvid: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Raw seconds (`"125"`) or clock text (`"02:05"`)
    #[serde(default)]
    pub duration: Option<String>,
    /// `true` for landscape, `false` for portrait
    #[serde(default)]
    pub dimension: Option<bool>,
    #[serde(default)]
    pub coin_like_ratio: Option<f64>,
}

// =============================================================================
// Verdict
// =============================================================================

/// Final decision for one video card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Show,
    Hide,
}

// =============================================================================
// Stored Values
// =============================================================================

/// A persisted configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl StoredValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<String>> for StoredValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}
