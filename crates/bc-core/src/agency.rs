//! Cross-page change notification
//!
//! Every page module holds its own copy of the shared (`global-*`) values.
//! When one page's action changes a criterion, the agency fans the event out
//! to the other pages so they can resync their copies. Listeners apply the
//! event locally and never notify back; events raised while a fan-out is in
//! progress are queued and delivered after it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::page::PageKind;
use crate::types::CriterionKind;

/// What happened to a criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Enable,
    Disable,
    Value(f64),
    Add(String),
    Edit(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgencyEvent {
    /// Page whose action raised the event
    pub source: PageKind,
    pub kind: CriterionKind,
    pub change: Change,
}

pub type Listener = Rc<dyn Fn(&AgencyEvent)>;

#[derive(Default)]
pub struct Agency {
    listeners: RefCell<Vec<(PageKind, Listener)>>,
    queue: RefCell<VecDeque<AgencyEvent>>,
    dispatching: Cell<bool>,
}

impl Agency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `page`'s listener. It receives events from every other page.
    pub fn subscribe(&self, page: PageKind, listener: impl Fn(&AgencyEvent) + 'static) {
        self.listeners.borrow_mut().push((page, Rc::new(listener)));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn notify(&self, source: PageKind, kind: CriterionKind, change: Change) {
        self.queue.borrow_mut().push_back(AgencyEvent { source, kind, change });
        if self.dispatching.replace(true) {
            return;
        }

        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };

            let targets: Vec<Listener> = self
                .listeners
                .borrow()
                .iter()
                .filter(|(page, _)| *page != event.source)
                .map(|(_, listener)| listener.clone())
                .collect();

            log::debug!(
                "agency: {} {:?} from {} -> {} listener(s)",
                event.kind,
                event.change,
                event.source,
                targets.len()
            );
            for listener in targets {
                listener(&event);
            }
        }

        self.dispatching.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(agency: &Agency, page: PageKind) -> Rc<RefCell<Vec<AgencyEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        agency.subscribe(page, move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    #[test]
    fn fans_out_to_other_pages_only() {
        let agency = Agency::new();
        let popular = recorder(&agency, PageKind::Popular);
        let video = recorder(&agency, PageKind::Video);

        agency.notify(PageKind::Popular, CriterionKind::Duration, Change::Value(90.0));

        assert!(popular.borrow().is_empty());
        assert_eq!(
            *video.borrow(),
            vec![AgencyEvent {
                source: PageKind::Popular,
                kind: CriterionKind::Duration,
                change: Change::Value(90.0),
            }]
        );
    }

    #[test]
    fn nested_notify_is_queued_not_recursive() {
        let agency = Rc::new(Agency::new());
        let depth = Rc::new(Cell::new(0usize));
        let max_depth = Rc::new(Cell::new(0usize));
        let order = Rc::new(RefCell::new(Vec::new()));

        let inner = Rc::downgrade(&agency);
        let (d, m, o) = (depth.clone(), max_depth.clone(), order.clone());
        agency.subscribe(PageKind::Video, move |event| {
            d.set(d.get() + 1);
            m.set(m.get().max(d.get()));
            o.borrow_mut().push(event.change.clone());
            if event.change == Change::Enable {
                if let Some(agency) = inner.upgrade() {
                    agency.notify(PageKind::Channel, CriterionKind::Bvid, Change::Disable);
                }
            }
            d.set(d.get() - 1);
        });

        agency.notify(PageKind::Popular, CriterionKind::Bvid, Change::Enable);

        assert_eq!(max_depth.get(), 1);
        assert_eq!(*order.borrow(), vec![Change::Enable, Change::Disable]);
    }

    #[test]
    fn counts_listeners() {
        let agency = Agency::new();
        agency.subscribe(PageKind::Homepage, |_| {});
        agency.subscribe(PageKind::Channel, |_| {});
        assert_eq!(agency.listener_count(), 2);
    }
}
