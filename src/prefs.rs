use std::sync::Arc;

use anyhow::{Context, Result};

use crate::intent::Selector;
use crate::storage::KeyValue;

pub const KEY_ACTIVE_SELECTOR: &str = "active_selector";
pub const KEY_ACTIVE_PAGE: &str = "active_page";
pub const KEY_ACTIVE_TAB: &str = "active_tab";
pub const KEY_EXTRA_PARAM: &str = "extra_param";
pub const KEY_SELECTED_YEAR: &str = "selected_year";
pub const KEY_SEARCH_PARAMETERS: &str = "search_parameters";
pub const KEY_EXCLUSIONS: &str = "exclusions";
pub const KEY_SCROLL_OFFSET: &str = "scroll_offset";

/// Typed access to the persisted panel state. Owns the canonical key set and
/// the serialization rules; everything else goes through here rather than
/// touching the store directly.
#[derive(Clone)]
pub struct Prefs {
    store: Arc<dyn KeyValue>,
}

impl Prefs {
    pub fn new(store: Arc<dyn KeyValue>) -> Self {
        Self { store }
    }

    pub fn active_selector(&self) -> Result<Option<Selector>> {
        Ok(self
            .store
            .get(KEY_ACTIVE_SELECTOR)?
            .map(|slug| Selector::from_slug(&slug)))
    }

    pub fn set_active_selector(&self, selector: &Selector) -> Result<()> {
        self.store.set(KEY_ACTIVE_SELECTOR, selector.slug())
    }

    pub fn active_page(&self) -> Result<Option<u32>> {
        Ok(self
            .store
            .get(KEY_ACTIVE_PAGE)?
            .and_then(|raw| raw.parse().ok()))
    }

    pub fn set_active_page(&self, page: u32) -> Result<()> {
        self.store.set(KEY_ACTIVE_PAGE, &page.to_string())
    }

    pub fn active_tab(&self) -> Result<Option<String>> {
        self.store.get(KEY_ACTIVE_TAB)
    }

    pub fn set_active_tab(&self, tab: &str) -> Result<()> {
        self.store.set(KEY_ACTIVE_TAB, tab)
    }

    pub fn extra_param(&self) -> Result<Option<String>> {
        self.store.get(KEY_EXTRA_PARAM)
    }

    pub fn set_extra_param(&self, extra: &str) -> Result<()> {
        self.store.set(KEY_EXTRA_PARAM, extra)
    }

    pub fn selected_year(&self) -> Result<Option<i32>> {
        Ok(self
            .store
            .get(KEY_SELECTED_YEAR)?
            .and_then(|raw| raw.parse().ok()))
    }

    pub fn set_selected_year(&self, year: i32) -> Result<()> {
        self.store.set(KEY_SELECTED_YEAR, &year.to_string())
    }

    pub fn search_parameters(&self) -> Result<Option<String>> {
        self.store.get(KEY_SEARCH_PARAMETERS)
    }

    pub fn set_search_parameters(&self, params: &str) -> Result<()> {
        self.store.set(KEY_SEARCH_PARAMETERS, params)
    }

    /// The stored exclusion set. Absent or malformed values decode to an
    /// empty set; a broken persisted value must never surface as an error.
    pub fn exclusions(&self) -> Vec<String> {
        self.store
            .get(KEY_EXCLUSIONS)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn set_exclusions(&self, exclusions: &[String]) -> Result<()> {
        let encoded =
            serde_json::to_string(exclusions).context("prefs: encode exclusion set")?;
        self.store.set(KEY_EXCLUSIONS, &encoded)
    }

    /// Last recorded panel scroll position; unparsable values read as 0.
    pub fn scroll_offset(&self) -> i64 {
        self.store
            .get(KEY_SCROLL_OFFSET)
            .ok()
            .flatten()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    pub fn set_scroll_offset(&self, offset: i64) -> Result<()> {
        self.store.set(KEY_SCROLL_OFFSET, &offset.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn prefs() -> Prefs {
        Prefs::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn exclusions_default_to_empty() {
        let prefs = prefs();
        assert!(prefs.exclusions().is_empty());
    }

    #[test]
    fn malformed_exclusions_decode_to_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_EXCLUSIONS, "{not json").unwrap();
        let prefs = Prefs::new(store);
        assert!(prefs.exclusions().is_empty());
    }

    #[test]
    fn exclusions_round_trip_preserves_order() {
        let prefs = prefs();
        prefs
            .set_exclusions(&["music".into(), "sports".into()])
            .unwrap();
        assert_eq!(prefs.exclusions(), vec!["music", "sports"]);
    }

    #[test]
    fn scroll_offset_defaults_to_zero() {
        let store = Arc::new(MemoryStore::new());
        store.set(KEY_SCROLL_OFFSET, "not a number").unwrap();
        let prefs = Prefs::new(store);
        assert_eq!(prefs.scroll_offset(), 0);
    }

    #[test]
    fn selector_round_trip() {
        let prefs = prefs();
        prefs
            .set_active_selector(&Selector::Category("music".into()))
            .unwrap();
        assert_eq!(
            prefs.active_selector().unwrap(),
            Some(Selector::Category("music".into()))
        );
    }
}
