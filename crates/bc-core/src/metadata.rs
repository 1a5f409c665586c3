//! Popular-page API metadata
//!
//! The popular page's cards carry no duration, dimension or stats in their
//! markup. The host clones matching API responses into a single pending slot
//! (newest wins); before a recheck the slot is drained and parsed into a
//! `bvid -> VideoInfo` map that the metadata selectors read from.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Deserialize;

use crate::extract::coin_like_ratio;
use crate::filter::SelectorSet;

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Response has no data.list")]
    MissingList,
}

/// Derived fields for one video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub duration: u32,
    /// `true` for landscape
    pub dimension: bool,
    pub like: u64,
    pub coin: u64,
}

/// One entry of a popular/ranking API list.
#[derive(Debug, Clone, PartialEq)]
pub struct PopularVideo {
    pub bvid: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub info: VideoInfo,
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Option<ApiData>,
}

#[derive(Deserialize)]
struct ApiData {
    list: Option<Vec<ApiVideo>>,
}

#[derive(Deserialize)]
struct ApiVideo {
    #[serde(default)]
    bvid: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<u32>,
    #[serde(default)]
    dimension: Option<ApiDimension>,
    #[serde(default)]
    stat: Option<ApiStat>,
    #[serde(default)]
    owner: Option<ApiOwner>,
}

#[derive(Deserialize)]
struct ApiDimension {
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct ApiStat {
    #[serde(default)]
    like: u64,
    #[serde(default)]
    coin: u64,
}

#[derive(Deserialize)]
struct ApiOwner {
    name: Option<String>,
}

/// Whether a request is one of the list APIs the popular page loads.
pub fn is_tracked_api(url: &str, method: &str) -> bool {
    if !method.eq_ignore_ascii_case("GET") || !url.contains("api.bilibili.com") {
        return false;
    }
    url.contains("web-interface/ranking")
        || url.contains("web-interface/popular/series/one")
        || url.contains("web-interface/popular?ps")
}

/// Parse a list API body. Entries missing a bvid, duration, dimension or stats
/// are skipped.
pub fn parse_popular(body: &str) -> Result<Vec<PopularVideo>, MetadataError> {
    let response: ApiResponse = serde_json::from_str(body)?;
    let list = response
        .data
        .and_then(|data| data.list)
        .ok_or(MetadataError::MissingList)?;

    let videos = list
        .into_iter()
        .filter_map(|v| {
            let bvid = v.bvid.filter(|b| !b.is_empty())?;
            let dimension = v.dimension?;
            let stat = v.stat?;
            Some(PopularVideo {
                bvid,
                title: v.title,
                uploader: v.owner.and_then(|o| o.name),
                info: VideoInfo {
                    duration: v.duration?,
                    dimension: dimension.width > dimension.height,
                    like: stat.like,
                    coin: stat.coin,
                },
            })
        })
        .collect();

    Ok(videos)
}

#[derive(Debug, Default)]
pub struct MetadataCache {
    pending: RefCell<Option<String>>,
    videos: RefCell<HashMap<String, VideoInfo>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a response body for the next parse, replacing any older one.
    pub fn offer(&self, body: String) {
        if self.pending.replace(Some(body)).is_some() {
            log::debug!("metadata: discarding unparsed older response");
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Drain the slot into the map. Returns the number of new videos.
    pub fn parse_pending(&self) -> usize {
        let Some(body) = self.pending.borrow_mut().take() else {
            return 0;
        };

        match parse_popular(&body) {
            Ok(list) => {
                let mut videos = self.videos.borrow_mut();
                let mut inserted = 0;
                for video in list {
                    if !videos.contains_key(&video.bvid) {
                        videos.insert(video.bvid, video.info);
                        inserted += 1;
                    }
                }
                log::debug!("metadata: parsed {inserted} new video(s), {} total", videos.len());
                inserted
            }
            Err(e) => {
                log::error!("Error parsing API response: {e}");
                0
            }
        }
    }

    pub fn get(&self, bvid: &str) -> Option<VideoInfo> {
        self.videos.borrow().get(bvid).copied()
    }

    pub fn len(&self) -> usize {
        self.videos.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.borrow().is_empty()
    }
}

/// Fill the duration, dimension and coin/like selectors from the cache,
/// keyed by the page's bvid selector. Selectors the page already has are kept.
pub fn with_metadata_selectors<E: 'static>(cache: &Rc<MetadataCache>, selectors: SelectorSet<E>) -> SelectorSet<E> {
    let Some(bvid) = selectors.bvid.clone() else {
        return selectors;
    };
    let mut out = selectors;

    if out.duration.is_none() {
        let (cache, bvid) = (cache.clone(), bvid.clone());
        out.duration = Some(Rc::new(move |e: &E| {
            bvid(e).and_then(|id| cache.get(&id)).map(|info| info.duration.to_string())
        }));
    }
    if out.dimension.is_none() {
        let (cache, bvid) = (cache.clone(), bvid.clone());
        out.dimension = Some(Rc::new(move |e: &E| bvid(e).and_then(|id| cache.get(&id)).map(|info| info.dimension)));
    }
    if out.coin_like_ratio.is_none() {
        let cache = cache.clone();
        out.coin_like_ratio = Some(Rc::new(move |e: &E| {
            bvid(e)
                .and_then(|id| cache.get(&id))
                .and_then(|info| coin_like_ratio(info.coin, info.like))
        }));
    }

    out
}
