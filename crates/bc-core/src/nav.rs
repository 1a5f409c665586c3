//! In-page navigation detection
//!
//! The site navigates without reloading, and there is no event for it that
//! every browser fires. Hosts poll the current URL on a fixed interval and ask
//! the watcher whether it moved.

use std::time::Duration;

use crate::page::PageKind;

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Clone)]
pub struct NavigationWatcher {
    last: Option<String>,
}

impl NavigationWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current`. Returns `true` once for each new target.
    pub fn poll(&mut self, current: &str) -> bool {
        if self.last.as_deref() == Some(current) {
            return false;
        }
        log::debug!("navigation: {:?} -> {current}", self.last);
        self.last = Some(current.to_string());
        true
    }

    /// Page kind of the last observed URL.
    pub fn page(&self) -> Option<PageKind> {
        self.last.as_deref().and_then(PageKind::from_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_each_target_once() {
        let mut watcher = NavigationWatcher::new();
        assert!(watcher.poll("https://www.bilibili.com/"));
        assert!(!watcher.poll("https://www.bilibili.com/"));
        assert!(watcher.poll("https://www.bilibili.com/video/BV1xx411c7mD"));
        assert_eq!(watcher.page(), Some(PageKind::Video));
        assert!(watcher.poll("https://www.bilibili.com/"));
    }

    #[test]
    fn unknown_pages_still_count_as_navigation() {
        let mut watcher = NavigationWatcher::new();
        assert!(watcher.poll("https://space.bilibili.com/42"));
        assert_eq!(watcher.page(), None);
        assert!(watcher.poll("https://www.bilibili.com/v/popular/all"));
        assert_eq!(watcher.page(), Some(PageKind::Popular));
    }
}
