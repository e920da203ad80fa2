use crate::intent::Selector;
use crate::remote::{ExclusionMeta, Pagination, PanelViewModel, TabSet};

pub const EMPTY_LIST_PLACEHOLDER: &str = "<small>nothing here yet</small>";

/// Inline style for in-text references, switched by the viewport detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceStyle {
    /// Full layout: references collapse to an inline asterisk.
    #[default]
    Asterisk,
    /// Compact layout: references render as inline superscripts.
    Superscript,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearOption {
    pub year: i32,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationView {
    pub pages: Vec<u32>,
    pub current: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabEntry {
    /// Selector slug the tab belongs to, carried into the next intent.
    pub selector: String,
    pub name: String,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionEntry {
    pub id: String,
    pub label: String,
    pub description: String,
    pub active: bool,
}

/// The rendering primitives the panel draws through. Every setter replaces
/// the sub-view's previous content wholesale; a `None`/`false` hides it.
pub trait Surface {
    fn set_loading(&mut self, visible: bool);
    fn scroll_to(&mut self, offset: i64);
    fn set_title(&mut self, text: &str);
    fn set_refresh_notice(&mut self, notice: Option<&str>);
    fn set_year_options(&mut self, options: Option<&[YearOption]>);
    fn set_pagination(&mut self, view: Option<&PaginationView>);
    fn set_item_markup(&mut self, rows: &[String]);
    fn set_show_more(&mut self, visible: bool);
    fn set_tabs(&mut self, tabs: Option<&[TabEntry]>);
    fn set_exclusions(&mut self, entries: Option<&[ExclusionEntry]>);
    fn set_compact(&mut self, compact: bool);
    fn set_reference_style(&mut self, style: ReferenceStyle);
}

/// Escapes user-authored text before it is placed into markup. Covers the
/// characters that can open or close markup context, not just the XML four.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '/' => out.push_str("&#x2F;"),
            '`' => out.push_str("&#x60;"),
            '=' => out.push_str("&#x3D;"),
            other => out.push(other),
        }
    }
    out
}

/// Renders one view-model into the panel. Pure function of its arguments,
/// and safe to call again with the same model: every sub-view is replaced,
/// none is appended to.
pub fn render(surface: &mut dyn Surface, model: &PanelViewModel, selector: &Selector) {
    surface.scroll_to(0);
    surface.set_title(&model.display_name);
    render_refresh_notice(surface, model.new_items_count);
    render_year_options(surface, selector, model.year, model.year_range.as_deref());
    render_pagination(surface, &model.page.pagination);
    render_items(surface, model);
    render_show_more(surface, &model.page.pagination);
    render_tabs(surface, selector, model.tabs.as_ref());
    render_exclusions(surface, model.exclusions.as_ref());
}

fn render_refresh_notice(surface: &mut dyn Surface, count: i64) {
    if count > 0 {
        surface.set_refresh_notice(Some(&format!("({count})")));
    } else {
        surface.set_refresh_notice(None);
    }
}

fn render_year_options(
    surface: &mut dyn Surface,
    selector: &Selector,
    current: Option<i32>,
    range: Option<&[i32]>,
) {
    if *selector != Selector::History {
        surface.set_year_options(None);
        return;
    }
    let options: Vec<YearOption> = range
        .unwrap_or_default()
        .iter()
        .map(|&year| YearOption {
            year,
            selected: Some(year) == current,
        })
        .collect();
    surface.set_year_options(Some(&options));
}

fn render_pagination(surface: &mut dyn Surface, pagination: &Pagination) {
    // The first page arrives as part of the full page load; the chooser only
    // appears once the reader has moved past it.
    let paginated = pagination.has_more || pagination.current_page > 1;
    if !paginated || pagination.current_page == 1 {
        surface.set_pagination(None);
        return;
    }
    surface.set_pagination(Some(&PaginationView {
        pages: pagination.page_range.clone(),
        current: pagination.current_page,
        total: pagination.total_pages,
    }));
}

fn render_items(surface: &mut dyn Surface, model: &PanelViewModel) {
    if model.page.items.is_empty() {
        surface.set_item_markup(&[EMPTY_LIST_PLACEHOLDER.to_string()]);
        return;
    }
    let fragment = model.query_string_fragment.as_deref().unwrap_or("");
    let rows: Vec<String> = model
        .page
        .items
        .iter()
        .map(|item| {
            let badge = if item.count > 0 {
                item.count.to_string()
            } else {
                String::new()
            };
            format!(
                "<li><a href=\"{prefix}{id}/{fragment}\">{title}<small>{badge}</small></a></li>",
                prefix = model.path_prefix,
                id = item.id,
                title = escape(&item.title),
            )
        })
        .collect();
    surface.set_item_markup(&rows);
}

fn render_show_more(surface: &mut dyn Surface, pagination: &Pagination) {
    surface.set_show_more(pagination.current_page == 1 && pagination.has_more);
}

fn render_tabs(surface: &mut dyn Surface, selector: &Selector, tabs: Option<&TabSet>) {
    let Some(tabs) = tabs else {
        surface.set_tabs(None);
        return;
    };
    let entries: Vec<TabEntry> = tabs
        .available
        .iter()
        .map(|tab| TabEntry {
            selector: selector.slug().to_string(),
            name: tab.name.clone(),
            label: tab.display_name.clone(),
            active: tab.name == tabs.current,
        })
        .collect();
    surface.set_tabs(Some(&entries));
}

fn render_exclusions(surface: &mut dyn Surface, exclusions: Option<&ExclusionMeta>) {
    let Some(exclusions) = exclusions else {
        surface.set_exclusions(None);
        return;
    };
    let entries: Vec<ExclusionEntry> = exclusions
        .available
        .iter()
        .map(|category| ExclusionEntry {
            id: category.id.clone(),
            label: category.name.clone(),
            description: category.description.clone(),
            active: exclusions.active.iter().any(|id| id == &category.id),
        })
        .collect();
    surface.set_exclusions(Some(&entries));
}

/// Records every primitive call; the comparison target for idempotence and
/// failure-isolation tests, and the state the terminal shell draws from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemorySurface {
    pub loading: bool,
    pub scroll: i64,
    pub title: String,
    pub refresh_notice: Option<String>,
    pub year_options: Option<Vec<YearOption>>,
    pub pagination: Option<PaginationView>,
    pub items: Vec<String>,
    pub show_more: bool,
    pub tabs: Option<Vec<TabEntry>>,
    pub exclusions: Option<Vec<ExclusionEntry>>,
    pub compact: bool,
    pub reference_style: ReferenceStyle,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for MemorySurface {
    fn set_loading(&mut self, visible: bool) {
        self.loading = visible;
    }

    fn scroll_to(&mut self, offset: i64) {
        self.scroll = offset;
    }

    fn set_title(&mut self, text: &str) {
        self.title = text.to_string();
    }

    fn set_refresh_notice(&mut self, notice: Option<&str>) {
        self.refresh_notice = notice.map(str::to_string);
    }

    fn set_year_options(&mut self, options: Option<&[YearOption]>) {
        self.year_options = options.map(<[YearOption]>::to_vec);
    }

    fn set_pagination(&mut self, view: Option<&PaginationView>) {
        self.pagination = view.cloned();
    }

    fn set_item_markup(&mut self, rows: &[String]) {
        self.items = rows.to_vec();
    }

    fn set_show_more(&mut self, visible: bool) {
        self.show_more = visible;
    }

    fn set_tabs(&mut self, tabs: Option<&[TabEntry]>) {
        self.tabs = tabs.map(<[TabEntry]>::to_vec);
    }

    fn set_exclusions(&mut self, entries: Option<&[ExclusionEntry]>) {
        self.exclusions = entries.map(<[ExclusionEntry]>::to_vec);
    }

    fn set_compact(&mut self, compact: bool) {
        self.compact = compact;
    }

    fn set_reference_style(&mut self, style: ReferenceStyle) {
        self.reference_style = style;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{ItemPage, ItemSummary, TabMeta};

    fn model() -> PanelViewModel {
        PanelViewModel {
            display_name: "popular".into(),
            new_items_count: 0,
            year: None,
            year_range: None,
            path_prefix: "/threads/".into(),
            query_string_fragment: None,
            page: ItemPage {
                items: vec![
                    ItemSummary {
                        id: "first".into(),
                        title: "first thread".into(),
                        count: 7,
                    },
                    ItemSummary {
                        id: "second".into(),
                        title: "second thread".into(),
                        count: 0,
                    },
                ],
                pagination: Pagination {
                    has_more: true,
                    page_range: vec![1, 2, 3],
                    total_pages: 3,
                    current_page: 1,
                },
            },
            tabs: None,
            exclusions: None,
        }
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(
            escape(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;&#x2F;script&gt;"
        );
        assert_eq!(escape("a & b = `c`"), "a &amp; b &#x3D; &#x60;c&#x60;");
    }

    #[test]
    fn titles_render_escaped() {
        let mut model = model();
        model.page.items[0].title = "<script>boom</script>".into();
        let mut surface = MemorySurface::new();
        render(&mut surface, &model, &Selector::Popular);
        assert!(surface.items[0].contains("&lt;script&gt;boom&lt;&#x2F;script&gt;"));
        assert!(!surface.items[0].contains("<script>"));
    }

    #[test]
    fn rendering_twice_is_idempotent() {
        let model = model();
        let mut surface = MemorySurface::new();
        render(&mut surface, &model, &Selector::Popular);
        let first = surface.clone();
        render(&mut surface, &model, &Selector::Popular);
        assert_eq!(surface, first);
    }

    #[test]
    fn zero_count_omits_badge() {
        let mut surface = MemorySurface::new();
        render(&mut surface, &model(), &Selector::Popular);
        assert!(surface.items[0].contains("<small>7</small>"));
        assert!(surface.items[1].contains("<small></small>"));
    }

    #[test]
    fn empty_page_renders_placeholder() {
        let mut model = model();
        model.page.items.clear();
        let mut surface = MemorySurface::new();
        render(&mut surface, &model, &Selector::Popular);
        assert_eq!(surface.items, vec![EMPTY_LIST_PLACEHOLDER.to_string()]);
    }

    #[test]
    fn pagination_hidden_on_first_page() {
        let mut surface = MemorySurface::new();
        render(&mut surface, &model(), &Selector::Popular);
        assert!(surface.pagination.is_none());
        assert!(surface.show_more);
    }

    #[test]
    fn pagination_visible_past_first_page() {
        let mut model = model();
        model.page.pagination.current_page = 2;
        let mut surface = MemorySurface::new();
        render(&mut surface, &model, &Selector::Popular);
        let view = surface.pagination.expect("pagination shown");
        assert_eq!(view.current, 2);
        assert_eq!(view.total, 3);
        assert!(!surface.show_more);
    }

    #[test]
    fn show_more_hidden_without_further_pages() {
        let mut model = model();
        model.page.pagination.has_more = false;
        let mut surface = MemorySurface::new();
        render(&mut surface, &model, &Selector::Popular);
        assert!(!surface.show_more);
    }

    #[test]
    fn year_options_only_for_history() {
        let mut model = model();
        model.year = Some(2019);
        model.year_range = Some(vec![2018, 2019]);

        let mut surface = MemorySurface::new();
        render(&mut surface, &model, &Selector::Popular);
        assert!(surface.year_options.is_none());

        render(&mut surface, &model, &Selector::History);
        let options = surface.year_options.expect("year selector shown");
        assert_eq!(
            options,
            vec![
                YearOption {
                    year: 2018,
                    selected: false
                },
                YearOption {
                    year: 2019,
                    selected: true
                },
            ]
        );
    }

    #[test]
    fn tabs_mark_current_and_carry_selector() {
        let mut model = model();
        model.tabs = Some(TabSet {
            current: "following".into(),
            available: vec![
                TabMeta {
                    name: "all".into(),
                    display_name: "all".into(),
                },
                TabMeta {
                    name: "following".into(),
                    display_name: "following".into(),
                },
            ],
        });
        let mut surface = MemorySurface::new();
        render(&mut surface, &model, &Selector::Popular);
        let tabs = surface.tabs.expect("tab strip shown");
        assert_eq!(tabs.len(), 2);
        assert!(!tabs[0].active);
        assert!(tabs[1].active);
        assert_eq!(tabs[0].selector, "popular");
    }

    #[test]
    fn exclusions_mark_active_entries() {
        let mut model = model();
        model.exclusions = Some(ExclusionMeta {
            active: vec!["music".into()],
            available: vec![
                crate::remote::ExclusionCategory {
                    id: "music".into(),
                    name: "music".into(),
                    description: String::new(),
                },
                crate::remote::ExclusionCategory {
                    id: "sports".into(),
                    name: "sports".into(),
                    description: String::new(),
                },
            ],
        });
        let mut surface = MemorySurface::new();
        render(&mut surface, &model, &Selector::Popular);
        let entries = surface.exclusions.expect("exclusion toggler shown");
        assert!(entries[0].active);
        assert!(!entries[1].active);
    }

    #[test]
    fn refresh_notice_gated_on_count() {
        let mut model = model();
        let mut surface = MemorySurface::new();
        render(&mut surface, &model, &Selector::Popular);
        assert!(surface.refresh_notice.is_none());

        model.new_items_count = 4;
        render(&mut surface, &model, &Selector::Popular);
        assert_eq!(surface.refresh_notice.as_deref(), Some("(4)"));
    }

    #[test]
    fn render_resets_scroll() {
        let mut surface = MemorySurface::new();
        surface.scroll = 140;
        render(&mut surface, &model(), &Selector::Popular);
        assert_eq!(surface.scroll, 0);
    }
}
