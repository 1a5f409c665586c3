//! Per-criterion actions
//!
//! An [`Action`] binds one criterion on one page to its persisted status and
//! value, owns the criterion's word list, and keeps the shared subfilter in
//! the registry in sync. Every mutating operation persists first, then
//! configures the subfilter, notifies the agency and requests a full-site
//! recheck from the owning page.

use std::cell::RefCell;
use std::rc::Rc;

use crate::agency::{Agency, AgencyEvent, Change};
use crate::filter::FilterCore;
use crate::page::PageKind;
use crate::storage::{KvStore, KvStoreExt};
use crate::subfilter::{list_mode, SubFilterRegistry};
use crate::types::{CriterionKind, StoredValue};
use crate::wordlist::{WordList, WordListEditor};

/// Recheck request into the owning page; the flag is `full_site`.
pub type Recheck = Rc<dyn Fn(bool)>;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("{op} is not supported by the {kind} action")]
    Unsupported { op: &'static str, kind: CriterionKind },
}

/// Shared engine state handed to every page module.
#[derive(Clone)]
pub struct FilterContext {
    pub store: Rc<dyn KvStore>,
    pub registry: Rc<RefCell<SubFilterRegistry>>,
    pub agency: Rc<Agency>,
    pub core: Rc<FilterCore>,
}

impl FilterContext {
    pub fn new(store: Rc<dyn KvStore>) -> Self {
        let registry = Rc::new(RefCell::new(SubFilterRegistry::new()));
        Self {
            store,
            core: Rc::new(FilterCore::new(registry.clone())),
            registry,
            agency: Rc::new(Agency::new()),
        }
    }
}

// =============================================================================
// Value shapes
// =============================================================================

/// Default and allowed range of a numeric criterion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberSpec {
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

pub fn number_spec(kind: CriterionKind) -> Option<NumberSpec> {
    match kind {
        CriterionKind::Duration => Some(NumberSpec { default: 60.0, min: 0.0, max: 300.0 }),
        CriterionKind::Quality => Some(NumberSpec { default: 25.0, min: 0.0, max: 80.0 }),
        _ => None,
    }
}

fn list_label(kind: CriterionKind) -> Option<&'static str> {
    match kind {
        CriterionKind::Uploader => Some("UP主 黑名单"),
        CriterionKind::UploaderKeyword => Some("UP主昵称关键词 黑名单"),
        CriterionKind::TitleKeyword => Some("标题关键词 黑名单"),
        CriterionKind::Bvid => Some("BV号 黑名单"),
        CriterionKind::UploaderWhitelist => Some("UP主 白名单"),
        CriterionKind::TitleKeywordWhitelist => Some("标题关键词 白名单"),
        _ => None,
    }
}

pub fn status_key(page: PageKind, kind: CriterionKind) -> String {
    format!("{}-{}-filter-status", page.as_str(), kind.as_str())
}

pub fn value_key(kind: CriterionKind) -> String {
    format!("global-{}-filter-value", kind.as_str())
}

// =============================================================================
// Action
// =============================================================================

pub struct Action {
    kind: CriterionKind,
    page: PageKind,
    status_key: String,
    value_key: Option<String>,
    status: bool,
    number: Option<f64>,
    list: Option<WordList>,
    store: Rc<dyn KvStore>,
    registry: Rc<RefCell<SubFilterRegistry>>,
    agency: Rc<Agency>,
    recheck: Recheck,
}

impl Action {
    /// Load status and value from the store and configure the subfilter.
    pub fn new(page: PageKind, kind: CriterionKind, ctx: &FilterContext, recheck: Recheck) -> Self {
        let status_key = status_key(page, kind);
        let status = ctx.store.get_bool(&status_key, false);

        let spec = number_spec(kind);
        let label = list_label(kind);
        let value_key = (spec.is_some() || label.is_some()).then(|| value_key(kind));

        let number = match (spec, &value_key) {
            (Some(spec), Some(key)) => Some(ctx.store.get_number(key, spec.default)),
            _ => None,
        };
        let list = match (label, &value_key) {
            (Some(label), Some(key)) => Some(WordList::load(key, label, list_mode(kind), ctx.store.clone())),
            _ => None,
        };

        let action = Self {
            kind,
            page,
            status_key,
            value_key,
            status,
            number,
            list,
            store: ctx.store.clone(),
            registry: ctx.registry.clone(),
            agency: ctx.agency.clone(),
            recheck,
        };
        action.apply();
        action
    }

    pub fn kind(&self) -> CriterionKind {
        self.kind
    }

    pub fn page(&self) -> PageKind {
        self.page
    }

    pub fn status_key(&self) -> &str {
        &self.status_key
    }

    pub fn value_key(&self) -> Option<&str> {
        self.value_key.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.status
    }

    /// Current value: a number for numeric criteria, the entries for lists.
    pub fn value(&self) -> Option<StoredValue> {
        if let Some(n) = self.number {
            return Some(StoredValue::Number(n));
        }
        self.list.as_ref().map(|l| StoredValue::List(l.entries().to_vec()))
    }

    pub fn list(&self) -> Option<&WordList> {
        self.list.as_ref()
    }

    /// Push this action's status and value into the shared subfilter.
    pub fn apply(&self) {
        let params = self.value();
        self.registry
            .borrow_mut()
            .configure(self.kind, self.status, params.as_ref());
    }

    pub fn enable(&mut self) {
        log::debug!("{} {} action enable", self.page, self.kind);
        self.set_status(true);
        self.finish(Change::Enable);
    }

    pub fn disable(&mut self) {
        log::debug!("{} {} action disable", self.page, self.kind);
        self.set_status(false);
        self.finish(Change::Disable);
    }

    /// Set the numeric parameter, clamped to the criterion's range.
    pub fn change(&mut self, value: f64) -> Result<(), ActionError> {
        let (Some(spec), Some(key)) = (number_spec(self.kind), self.value_key.as_deref()) else {
            return Err(self.unsupported("change"));
        };
        let value = if value.is_finite() {
            value.clamp(spec.min, spec.max)
        } else {
            spec.default
        };
        log::debug!("{} {} action change {value}", self.page, self.kind);

        self.store.put(key, value);
        self.number = Some(value);
        self.finish(Change::Value(value));
        Ok(())
    }

    /// Append one entry to the list.
    pub fn add(&mut self, value: &str) -> Result<(), ActionError> {
        let Some(list) = self.list.as_mut() else {
            return Err(self.unsupported("add"));
        };
        if !list.add_value(value) {
            log::debug!("{} {} action add {value:?}: empty or present", self.page, self.kind);
        }
        self.finish(Change::Add(value.trim().to_string()));
        Ok(())
    }

    /// Replace the list (editor save).
    pub fn edit(&mut self, values: &[String]) -> Result<(), ActionError> {
        let Some(list) = self.list.as_mut() else {
            return Err(self.unsupported("edit"));
        };
        list.edit(values);
        let entries = list.entries().to_vec();
        log::debug!("{} {} action edit, {} entries", self.page, self.kind, entries.len());
        self.finish(Change::Edit(entries));
        Ok(())
    }

    /// Open the list in the external editor.
    pub fn show(&self, editor: &dyn WordListEditor) -> Result<(), ActionError> {
        match &self.list {
            Some(list) => {
                list.show(editor);
                Ok(())
            }
            None => Err(self.unsupported("show")),
        }
    }

    /// Apply a change raised by the same criterion on another page. Only the
    /// shared value is copied; status keys are per page. Nothing is persisted,
    /// notified or rechecked.
    pub fn resync(&mut self, event: &AgencyEvent) {
        if event.kind != self.kind || event.source == self.page {
            return;
        }
        match &event.change {
            Change::Enable | Change::Disable => {}
            Change::Value(n) => {
                if self.number.is_some() {
                    self.number = Some(*n);
                }
            }
            Change::Add(_) | Change::Edit(_) => {
                if let Some(list) = self.list.as_mut() {
                    list.reload();
                }
            }
        }
    }

    fn set_status(&mut self, status: bool) {
        self.status = status;
        self.store.put(&self.status_key, status);
    }

    fn finish(&self, change: Change) {
        self.apply();
        self.agency.notify(self.page, self.kind, change);
        (self.recheck)(true);
    }

    fn unsupported(&self, op: &'static str) -> ActionError {
        ActionError::Unsupported { op, kind: self.kind }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind)
            .field("page", &self.page)
            .field("status", &self.status)
            .field("value", &self.value())
            .finish()
    }
}
