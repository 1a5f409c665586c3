//! WebAssembly bindings for BiliCleaner
//!
//! The userscript glue constructs a [`Cleaner`] with its `GM_getValue` /
//! `GM_setValue` functions, registers one page module per page kind it
//! supports (a card collector plus selector functions), and forwards DOM
//! mutations, fetch responses, URL polls and panel input to it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use bc_core::extract::match_space_link;
use bc_core::storage::namespaced;
use bc_core::{
    is_tracked_api, CriterionKind, EditorRequest, FilterContext, KvStore, MenuEntry, MenuTarget, NavigationWatcher,
    PageError, PageKind, PageModule, SelectorSet, StoredValue, VideoElement, VideoGroup, VideoSource, WordListEditor,
    FILTER_SIGN,
};
use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

// =============================================================================
// Logging
// =============================================================================

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[bili-cleaner] {}: {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            log::Level::Info => web_sys::console::info_1(&line),
            _ => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

/// Route engine logs to the browser console. Safe to call more than once.
#[wasm_bindgen]
pub fn init_logging(verbose: bool) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
}

// =============================================================================
// Value conversion
// =============================================================================

fn to_js(value: &StoredValue) -> JsValue {
    match value {
        StoredValue::Bool(b) => JsValue::from_bool(*b),
        StoredValue::Number(n) => JsValue::from_f64(*n),
        StoredValue::Text(s) => JsValue::from_str(s),
        StoredValue::List(items) => items.iter().map(|s| JsValue::from_str(s)).collect::<Array>().into(),
    }
}

fn from_js(value: &JsValue) -> Option<StoredValue> {
    if let Some(b) = value.as_bool() {
        return Some(StoredValue::Bool(b));
    }
    if let Some(n) = value.as_f64() {
        return Some(StoredValue::Number(n));
    }
    if let Some(s) = value.as_string() {
        return Some(StoredValue::Text(s));
    }
    if Array::is_array(value) {
        let items = Array::from(value).iter().filter_map(|v| v.as_string()).collect();
        return Some(StoredValue::List(items));
    }
    None
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn get(target: &JsValue, key: &str) -> JsValue {
    Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

fn set(target: &Object, key: &str, value: &JsValue) {
    let _ = Reflect::set(target, &JsValue::from_str(key), value);
}

fn parse_page(name: &str) -> Result<PageKind, JsValue> {
    PageKind::from_name(name).ok_or_else(|| js_err(format!("Unknown page '{name}'")))
}

fn parse_criterion(name: &str) -> Result<CriterionKind, JsValue> {
    CriterionKind::from_name(name).ok_or_else(|| js_err(format!("Unknown criterion '{name}'")))
}

// =============================================================================
// Host collaborators
// =============================================================================

/// Store backed by `GM_getValue(key, default)` / `GM_setValue(key, value)`.
struct JsStore {
    get_value: Function,
    set_value: Function,
}

impl KvStore for JsStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        match self.get_value.call2(&JsValue::NULL, &JsValue::from_str(key), &JsValue::UNDEFINED) {
            Ok(value) => from_js(&value),
            Err(e) => {
                log::error!("GM_getValue({key}) failed: {e:?}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: StoredValue) {
        if let Err(e) = self.set_value.call2(&JsValue::NULL, &JsValue::from_str(key), &to_js(&value)) {
            log::error!("GM_setValue({key}) failed: {e:?}");
        }
    }
}

/// A video card node.
#[derive(Clone)]
struct Card(HtmlElement);

impl VideoElement for Card {
    fn is_hidden(&self) -> bool {
        self.0.style().get_property_value("display").is_ok_and(|v| v == "none")
    }

    fn hide(&self) {
        if let Err(e) = self.0.style().set_property_with_priority("display", "none", "important") {
            log::error!("hiding card failed: {e:?}");
        }
    }

    fn show(&self) {
        if let Err(e) = self.0.style().remove_property("display") {
            log::error!("showing card failed: {e:?}");
        }
    }

    fn is_processed(&self) -> bool {
        self.0.has_attribute(FILTER_SIGN)
    }

    fn mark_processed(&self) {
        if let Err(e) = self.0.set_attribute(FILTER_SIGN, "") {
            log::error!("marking card failed: {e:?}");
        }
    }
}

fn cards(array: &JsValue) -> Vec<Card> {
    if !Array::is_array(array) {
        return Vec::new();
    }
    Array::from(array)
        .iter()
        .filter_map(|v| v.dyn_into::<HtmlElement>().ok())
        .map(Card)
        .collect()
}

/// Calls `collect(fullSite)`, which returns `null` when the list container
/// is not in the page yet, an array of cards, or `{ main, nextPlay }`.
struct JsSource {
    collect: Function,
}

impl VideoSource<Card> for JsSource {
    fn collect(&self, full_site: bool) -> Result<Vec<VideoGroup<Card>>, PageError> {
        let value = self
            .collect
            .call1(&JsValue::NULL, &JsValue::from_bool(full_site))
            .map_err(|e| {
                log::error!("collect threw: {e:?}");
                PageError::ContainerNotFound
            })?;
        if value.is_null() || value.is_undefined() {
            return Err(PageError::ContainerNotFound);
        }
        if Array::is_array(&value) {
            return Ok(vec![VideoGroup::main(cards(&value))]);
        }

        let mut groups = vec![VideoGroup::main(cards(&get(&value, "main")))];
        let next = get(&value, "nextPlay");
        if Array::is_array(&next) {
            groups.push(VideoGroup::next_play(cards(&next)));
        }
        Ok(groups)
    }
}

fn selector(selectors: &JsValue, name: &str) -> Option<Function> {
    get(selectors, name).dyn_into::<Function>().ok()
}

fn call(f: &Function, card: &Card) -> JsValue {
    f.call1(&JsValue::NULL, &card.0).unwrap_or(JsValue::NULL)
}

/// Build a selector set from `{ titleKeyword, bvid, uploader, duration,
/// dimension, coinLikeRatio }`; absent keys are fields the page lacks.
fn selector_set(selectors: &JsValue) -> SelectorSet<Card> {
    let mut out = SelectorSet::new();
    if let Some(f) = selector(selectors, "titleKeyword") {
        out = out.with_title(move |c: &Card| call(&f, c).as_string());
    }
    if let Some(f) = selector(selectors, "bvid") {
        out = out.with_bvid(move |c: &Card| call(&f, c).as_string());
    }
    if let Some(f) = selector(selectors, "uploader") {
        out = out.with_uploader(move |c: &Card| call(&f, c).as_string());
    }
    if let Some(f) = selector(selectors, "duration") {
        out = out.with_duration(move |c: &Card| {
            let v = call(&f, c);
            v.as_string().or_else(|| v.as_f64().map(|n| n.to_string()))
        });
    }
    if let Some(f) = selector(selectors, "dimension") {
        out = out.with_dimension(move |c: &Card| call(&f, c).as_bool());
    }
    if let Some(f) = selector(selectors, "coinLikeRatio") {
        out = out.with_coin_like_ratio(move |c: &Card| call(&f, c).as_f64().filter(|n| n.is_finite()));
    }
    out
}

/// Editor callback `show({ key, label, description, entries })`.
struct JsEditor {
    show: Function,
}

impl WordListEditor for JsEditor {
    fn show(&self, request: EditorRequest<'_>) {
        let obj = Object::new();
        set(&obj, "key", &JsValue::from_str(&namespaced(request.key)));
        set(&obj, "label", &JsValue::from_str(request.label));
        set(&obj, "description", &JsValue::from_str(request.description));
        set(&obj, "entries", &to_js(&StoredValue::List(request.entries.to_vec())));
        if let Err(e) = self.show.call1(&JsValue::NULL, &obj) {
            log::error!("editor threw: {e:?}");
        }
    }
}

// =============================================================================
// Cleaner
// =============================================================================

#[wasm_bindgen]
pub struct Cleaner {
    ctx: FilterContext,
    pages: RefCell<BTreeMap<PageKind, Rc<RefCell<PageModule>>>>,
    watcher: RefCell<NavigationWatcher>,
    menu: RefCell<Option<(PageKind, Vec<MenuEntry>)>>,
}

impl Cleaner {
    fn page(&self, name: &str) -> Result<Rc<RefCell<PageModule>>, JsValue> {
        let kind = parse_page(name)?;
        self.pages
            .borrow()
            .get(&kind)
            .cloned()
            .ok_or_else(|| js_err(format!("Page '{name}' is not registered")))
    }

    fn with_page_mut<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut PageModule) -> Result<R, PageError>,
    ) -> Result<R, JsValue> {
        let page = self.page(name)?;
        let mut module = page.try_borrow_mut().map_err(|_| js_err("Page module is busy"))?;
        f(&mut module).map_err(js_err)
    }

    fn with_page<R>(&self, name: &str, f: impl FnOnce(&PageModule) -> R) -> Result<R, JsValue> {
        let page = self.page(name)?;
        let module = page.try_borrow().map_err(|_| js_err("Page module is busy"))?;
        Ok(f(&module))
    }
}

#[wasm_bindgen]
impl Cleaner {
    #[wasm_bindgen(constructor)]
    pub fn new(get_value: Function, set_value: Function) -> Cleaner {
        let store: Rc<dyn KvStore> = Rc::new(JsStore { get_value, set_value });
        Cleaner {
            ctx: FilterContext::new(store),
            pages: RefCell::new(BTreeMap::new()),
            watcher: RefCell::new(NavigationWatcher::new()),
            menu: RefCell::new(None),
        }
    }

    /// Register the module for `page`. Replaces an earlier registration.
    pub fn register_page(&self, page: &str, collect: Function, selectors: JsValue) -> Result<(), JsValue> {
        let kind = parse_page(page)?;
        let source = Rc::new(JsSource { collect });
        let module = PageModule::new(kind, &self.ctx, source, selector_set(&selectors));
        self.pages.borrow_mut().insert(kind, module);
        log::debug!("registered {kind} page module");
        Ok(())
    }

    /// Page kind for a URL, or `undefined` when no module applies.
    pub fn page_for_url(url: &str) -> Option<String> {
        PageKind::from_url(url).map(|p| p.as_str().to_string())
    }

    pub fn enable(&self, page: &str, criterion: &str) -> Result<(), JsValue> {
        let kind = parse_criterion(criterion)?;
        self.with_page_mut(page, |m| m.enable(kind))
    }

    pub fn disable(&self, page: &str, criterion: &str) -> Result<(), JsValue> {
        let kind = parse_criterion(criterion)?;
        self.with_page_mut(page, |m| m.disable(kind))
    }

    pub fn change(&self, page: &str, criterion: &str, value: f64) -> Result<(), JsValue> {
        let kind = parse_criterion(criterion)?;
        self.with_page_mut(page, |m| m.change(kind, value))
    }

    pub fn add(&self, page: &str, criterion: &str, value: &str) -> Result<(), JsValue> {
        let kind = parse_criterion(criterion)?;
        self.with_page_mut(page, |m| m.add(kind, value))
    }

    /// Editor save: replace the list with `values` (array of lines).
    pub fn edit(&self, page: &str, criterion: &str, values: Array) -> Result<(), JsValue> {
        let kind = parse_criterion(criterion)?;
        let values: Vec<String> = values.iter().filter_map(|v| v.as_string()).collect();
        self.with_page_mut(page, |m| m.edit(kind, &values))
    }

    pub fn show_editor(&self, page: &str, criterion: &str, editor: Function) -> Result<(), JsValue> {
        let kind = parse_criterion(criterion)?;
        let editor = JsEditor { show: editor };
        self.with_page(page, |m| m.show_editor(kind, &editor))?.map_err(js_err)
    }

    pub fn set_next_play_exempt(&self, page: &str, exempt: bool) -> Result<(), JsValue> {
        self.with_page(page, |m| m.set_next_play_exempt(exempt))
    }

    pub fn set_ending_exempt(&self, page: &str, exempt: bool) -> Result<(), JsValue> {
        self.with_page(page, |m| m.set_ending_exempt(exempt))
    }

    /// Player `ended` hook. Takes the titles of hidden side-list cards and of
    /// the end-screen items; returns one hide flag per item, or `null` to
    /// leave the end screen alone.
    pub fn ending_verdicts(&self, page: &str, hidden_titles: Array, ending_titles: Array) -> Result<JsValue, JsValue> {
        let titles = |array: &Array| -> Vec<String> { array.iter().filter_map(|v| v.as_string()).collect() };
        let (hidden, ending) = (titles(&hidden_titles), titles(&ending_titles));
        let verdicts = self.with_page(page, |m| m.ending_verdicts(hidden.as_slice(), ending.as_slice()))?;
        Ok(match verdicts {
            Some(verdicts) => verdicts.into_iter().map(JsValue::from_bool).collect::<Array>().into(),
            None => JsValue::NULL,
        })
    }

    pub fn check_video_list(&self, page: &str, full_site: bool) -> Result<(), JsValue> {
        self.with_page(page, |m| m.check_video_list(full_site))
    }

    /// MutationObserver hook.
    pub fn on_mutation(&self, page: &str) -> Result<(), JsValue> {
        self.with_page(page, |m| m.on_mutation())
    }

    /// Offer a cloned fetch response. Returns whether it was kept.
    pub fn offer_api_response(&self, url: &str, method: &str, body: String) -> bool {
        if !is_tracked_api(url, method) {
            return false;
        }
        let pages = self.pages.borrow();
        let cache = pages
            .values()
            .find_map(|p| p.try_borrow().ok().and_then(|m| m.metadata().cloned()));
        match cache {
            Some(cache) => {
                cache.offer(body);
                true
            }
            None => false,
        }
    }

    /// Called every 500 ms with `location.href`. On a change, activates the
    /// new page's module, rechecks it and returns its name.
    pub fn poll_navigation(&self, url: &str) -> Option<String> {
        if !self.watcher.borrow_mut().poll(url) {
            return None;
        }
        let kind = PageKind::from_url(url)?;
        let page = self.pages.borrow().get(&kind).cloned()?;
        let module = page.try_borrow().ok()?;
        module.activate();
        module.check_video_list(true);
        Some(kind.as_str().to_string())
    }

    /// Global on/off switch. Every registered page is rechecked.
    pub fn set_suspended(&self, suspended: bool) {
        self.ctx.core.set_suspended(suspended);
        log::info!("filtering {}", if suspended { "suspended" } else { "resumed" });
        let pages: Vec<_> = self.pages.borrow().values().cloned().collect();
        for page in pages {
            if let Ok(module) = page.try_borrow() {
                module.check_video_list(true);
            }
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.ctx.core.is_suspended()
    }

    /// Labels for a right-click target `{ kind: "uploader", name, spaceLink }`
    /// or `{ kind: "video", bvid }`. Pass the index to `run_menu`.
    pub fn context_menu(&self, page: &str, target: JsValue) -> Result<Array, JsValue> {
        let kind = parse_page(page)?;
        let target = match get(&target, "kind").as_string().as_deref() {
            Some("uploader") => MenuTarget::Uploader {
                name: get(&target, "name").as_string().unwrap_or_default(),
                space_link: get(&target, "spaceLink")
                    .as_string()
                    .and_then(|href| match_space_link(&href).map(str::to_string)),
            },
            Some("video") => MenuTarget::Video {
                bvid: get(&target, "bvid").as_string().unwrap_or_default(),
            },
            _ => return Err(js_err("Menu target kind must be 'uploader' or 'video'")),
        };

        let entries = self.with_page(page, |m| m.context_menu(&target))?;
        let labels: Array = entries.iter().map(|e| JsValue::from_str(&e.label)).collect();
        *self.menu.borrow_mut() = Some((kind, entries));
        Ok(labels)
    }

    /// Run entry `index` of the last menu. Returns text to copy, if any.
    pub fn run_menu(&self, index: usize) -> Result<Option<String>, JsValue> {
        let Some((kind, entries)) = self.menu.borrow_mut().take() else {
            return Err(js_err("No open menu"));
        };
        let entry = entries.get(index).ok_or_else(|| js_err("Menu index out of range"))?;
        self.with_page_mut(kind.as_str(), |m| m.run_menu_command(&entry.command))
    }

    /// `{ [criterion]: { enabled, value } }` for a page.
    pub fn settings(&self, page: &str) -> Result<JsValue, JsValue> {
        let settings = self.with_page(page, |m| m.settings())?;
        let result = Object::new();
        for (name, (enabled, value)) in settings {
            let entry = Object::new();
            set(&entry, "enabled", &JsValue::from_bool(enabled));
            set(&entry, "value", &value.as_ref().map(to_js).unwrap_or(JsValue::NULL));
            set(&result, name, &entry);
        }
        Ok(result.into())
    }
}

/// BV id in a link, for host selectors.
#[wasm_bindgen]
pub fn match_bvid(href: &str) -> Option<String> {
    bc_core::match_bvid(href).map(str::to_string)
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn detached_card() -> Card {
        let document = web_sys::window().and_then(|w| w.document()).unwrap();
        Card(document.create_element("div").unwrap().dyn_into::<HtmlElement>().unwrap())
    }

    #[wasm_bindgen_test]
    fn stored_values_cross_the_boundary() {
        let list = StoredValue::List(vec!["a".into(), "b".into()]);
        assert_eq!(from_js(&to_js(&list)), Some(list));
        assert_eq!(from_js(&JsValue::from_bool(true)), Some(StoredValue::Bool(true)));
        assert_eq!(from_js(&JsValue::NULL), None);
    }

    #[wasm_bindgen_test]
    fn card_display_state_follows_verdicts() {
        let card = detached_card();
        assert!(!card.is_hidden());
        card.hide();
        assert!(card.is_hidden());
        card.show();
        assert!(!card.is_hidden());

        assert!(!card.is_processed());
        card.mark_processed();
        assert!(card.is_processed());
    }

    #[wasm_bindgen_test]
    fn unknown_names_are_errors() {
        assert!(parse_page("space").is_err());
        assert!(parse_criterion("views").is_err());
        assert_eq!(Cleaner::page_for_url("https://www.bilibili.com/v/popular/all").as_deref(), Some("popular"));
    }
}
