use anyhow::Result;
use serde::ser::Serializer;
use serde::Serialize;

use crate::prefs::Prefs;

/// Which navigation section the panel is showing. The set is closed; the
/// server addresses everything else by category slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Today,
    Popular,
    Search,
    History,
    Category(String),
}

/// Persisted fields that belong to exactly one selector. Reads and writes
/// for these happen only while that selector is active, so switching away
/// and back restores the prior filter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopedField {
    Year,
    SearchKeys,
    Exclusions,
}

impl Selector {
    pub fn from_slug(slug: &str) -> Self {
        match slug {
            "today" => Selector::Today,
            "popular" => Selector::Popular,
            "search" => Selector::Search,
            "history" => Selector::History,
            other => Selector::Category(other.to_string()),
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            Selector::Today => "today",
            Selector::Popular => "popular",
            Selector::Search => "search",
            Selector::History => "history",
            Selector::Category(slug) => slug,
        }
    }

    pub fn owns(&self, field: ScopedField) -> bool {
        matches!(
            (self, field),
            (Selector::History, ScopedField::Year)
                | (Selector::Search, ScopedField::SearchKeys)
                | (Selector::Popular, ScopedField::Exclusions)
        )
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.slug())
    }
}

/// One user action on the panel, consumed immediately by [`resolve_intent`].
#[derive(Debug, Clone)]
pub struct NavigationIntent {
    pub selector: Selector,
    pub page: u32,
    pub year: Option<i32>,
    pub search_keys: Option<String>,
    pub force_refresh: bool,
    pub tab: Option<String>,
    pub exclusion_toggle: Option<String>,
    pub extra: Option<String>,
}

impl NavigationIntent {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            page: 1,
            year: None,
            search_keys: None,
            force_refresh: false,
            tab: None,
            exclusion_toggle: None,
            extra: None,
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn search_keys<S: Into<String>>(mut self, keys: S) -> Self {
        self.search_keys = Some(keys.into());
        self
    }

    pub fn refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn tab<S: Into<String>>(mut self, tab: S) -> Self {
        self.tab = Some(tab.into());
        self
    }

    pub fn toggle_exclusion<S: Into<String>>(mut self, category: S) -> Self {
        self.exclusion_toggle = Some(category.into());
        self
    }

    pub fn extra<S: Into<String>>(mut self, extra: S) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

/// Fully resolved fetch parameters. The shape is uniform across selectors;
/// fields outside the active selector's scope are sent as null and ignored
/// server-side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelRequest {
    pub selector: Selector,
    pub page: u32,
    pub year: Option<i32>,
    pub search_keys: Option<String>,
    pub force_refresh: bool,
    pub tab: Option<String>,
    pub exclusions: Option<Vec<String>>,
    pub extra: Option<String>,
}

/// Merges an intent with the persisted panel state and writes the resolved
/// state back, so the next intent sees this one's effects.
pub fn resolve_intent(intent: NavigationIntent, prefs: &Prefs) -> Result<PanelRequest> {
    let NavigationIntent {
        selector,
        page,
        year,
        search_keys,
        force_refresh,
        tab,
        exclusion_toggle,
        extra,
    } = intent;

    prefs.set_active_selector(&selector)?;
    prefs.set_active_page(page)?;

    let tab = match tab {
        Some(tab) => {
            prefs.set_active_tab(&tab)?;
            Some(tab)
        }
        None => prefs.active_tab()?,
    };

    let extra = match extra {
        Some(extra) => {
            prefs.set_extra_param(&extra)?;
            Some(extra)
        }
        None => prefs.extra_param()?,
    };

    let year = if selector.owns(ScopedField::Year) {
        match year {
            Some(year) => {
                prefs.set_selected_year(year)?;
                Some(year)
            }
            None => prefs.selected_year()?,
        }
    } else {
        None
    };

    let search_keys = if selector.owns(ScopedField::SearchKeys) {
        match search_keys {
            Some(keys) => {
                prefs.set_search_parameters(&keys)?;
                Some(keys)
            }
            None => prefs.search_parameters()?,
        }
    } else {
        None
    };

    // Toggles aimed at any other selector are dropped without touching the
    // stored set.
    let exclusions = if selector.owns(ScopedField::Exclusions) {
        let mut set = prefs.exclusions();
        if let Some(category) = exclusion_toggle {
            if set.iter().any(|entry| entry == &category) {
                set.retain(|entry| entry != &category);
            } else {
                set.push(category);
            }
            prefs.set_exclusions(&set)?;
        }
        Some(set)
    } else {
        None
    };

    Ok(PanelRequest {
        selector,
        page,
        year,
        search_keys,
        force_refresh,
        tab,
        exclusions,
        extra,
    })
}
